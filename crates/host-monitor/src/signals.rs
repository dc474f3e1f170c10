//! OS signal handling.

use std::backtrace::Backtrace;

use tokio::task::JoinHandle;

use crate::stop::StopSignal;

/// Binds SIGINT and SIGTERM to `stop`, and SIGUSR1 to a stack dump in the log.
///
/// The listener ends once the stop signal is set by any source.
#[cfg(unix)]
pub fn spawn_signal_listener(stop: StopSignal) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::signal;
    use tokio::signal::unix::SignalKind;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    stop.set();
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    stop.set();
                }
                _ = sigusr1.recv() => {
                    // Only the listener's own stack can be captured here. Other
                    // tasks keep running and are not part of the dump.
                    tracing::info!("Received SIGUSR1, current stack:\n{}", Backtrace::force_capture());
                }
                _ = stop.stopped() => break,
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_listener(stop: StopSignal) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl+C: {e}");
                    return;
                }
                tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                stop.set();
            }
            _ = stop.stopped() => {}
        }
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::Command;
    use std::time::Duration;

    use super::*;

    fn raise(signal: &str) {
        let status = Command::new("kill")
            .arg(format!("-{signal}"))
            .arg(std::process::id().to_string())
            .status()
            .expect("should run kill");
        assert!(status.success(), "kill -{signal} failed");
    }

    #[test_log::test(tokio::test)]
    async fn usr1_keeps_running_and_term_stops() {
        let stop = StopSignal::new();
        let handle = spawn_signal_listener(stop.clone()).expect("should bind signals");

        raise("USR1");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!stop.is_set(), "SIGUSR1 must not stop the agent");
        assert!(!handle.is_finished());

        raise("TERM");
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("listener should exit after SIGTERM")
            .expect("listener should not panic");
        assert!(stop.is_set());
    }

    #[test_log::test(tokio::test)]
    async fn listener_exits_once_stopped_elsewhere() {
        let stop = StopSignal::new();
        let handle = spawn_signal_listener(stop.clone()).expect("should bind signals");

        stop.set();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should exit")
            .expect("listener should not panic");
    }
}

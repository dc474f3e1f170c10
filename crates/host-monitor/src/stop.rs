//! Cooperative stop signal shared by every long-running loop.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Result of [`StopSignal::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The signal was set before or during the wait.
    Stopped,
    /// The timeout elapsed without the signal being set.
    TimedOut,
}

impl WaitOutcome {
    pub fn is_stopped(self) -> bool {
        self == WaitOutcome::Stopped
    }
}

/// Process-wide stop flag.
///
/// Cloning is cheap and every clone observes the same flag. The flag moves
/// from unset to set exactly once.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    set: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every waiter.
    ///
    /// Returns `true` for the call that performed the transition.
    pub fn set(&self) -> bool {
        let first = self
            .set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.token.cancel();
        if first {
            tracing::debug!("Stop signal set");
        }
        first
    }

    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire) || self.token.is_cancelled()
    }

    /// Waits until the signal is set or `timeout` elapses, whichever comes
    /// first. Never blocks past `timeout`.
    pub async fn wait(&self, timeout: Duration) -> WaitOutcome {
        if self.is_set() {
            return WaitOutcome::Stopped;
        }
        tokio::select! {
            _ = self.token.cancelled() => WaitOutcome::Stopped,
            _ = tokio::time::sleep(timeout) => {
                if self.is_set() {
                    WaitOutcome::Stopped
                } else {
                    WaitOutcome::TimedOut
                }
            }
        }
    }

    /// Resolves once the signal is set.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }

    /// Token view for APIs that take a [`CancellationToken`].
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn wait_times_out_when_unset() {
        let stop = StopSignal::new();
        let started = Instant::now();

        let outcome = stop.wait(Duration::from_millis(20)).await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!stop.is_set());
    }

    #[test(tokio::test)]
    async fn wait_returns_immediately_when_already_set() {
        let stop = StopSignal::new();
        stop.set();

        let outcome = tokio::time::timeout(Duration::from_secs(1), stop.wait(Duration::from_secs(60)))
            .await
            .expect("wait must not block once set");

        assert!(outcome.is_stopped());
    }

    #[test(tokio::test)]
    async fn set_wakes_a_pending_waiter() {
        let stop = StopSignal::new();
        let waiter = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.wait(Duration::from_secs(60)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.set();

        let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake promptly")
            .expect("waiter task should not panic");
        assert_eq!(outcome, WaitOutcome::Stopped);
    }

    #[test]
    fn set_transitions_exactly_once() {
        let stop = StopSignal::new();
        let clone = stop.clone();

        assert!(stop.set(), "first set performs the transition");
        assert!(!clone.set(), "second set is a no-op");
        assert!(clone.is_set());
        assert!(stop.token().is_cancelled());
    }
}

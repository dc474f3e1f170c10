use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::services::ApplicationServices;
use crate::collector::MetricsCollector;
use crate::emitter::Emitter;
use crate::event::CollectionEvent;
use crate::signals::spawn_signal_listener;
use crate::stop::StopSignal;
use crate::timers::run_timer;
use crate::timers::GroupTimer;

/// Upper bound for tasks to finish after the stop signal.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Task level knobs taken from the agent arguments.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub event_queue_capacity: usize,
    pub event_poll_interval: Duration,
    pub bind_signals: bool,
}

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    stop: StopSignal,
}

impl Tasks {
    pub fn new(stop: StopSignal) -> Self {
        Self {
            tasks: Vec::new(),
            stop,
        }
    }

    /// Start all background tasks
    pub fn spawn_all_tasks(
        &mut self,
        services: ApplicationServices,
        settings: &TaskSettings,
    ) -> Result<()> {
        let (event_sender, event_receiver) =
            mpsc::channel::<CollectionEvent>(settings.event_queue_capacity.max(1));

        let collector_task = self.spawn_collector_task(
            services.collector,
            event_receiver,
            settings.event_poll_interval,
        );
        self.tasks.push(collector_task);

        let emitter_task = self.spawn_emitter_task(services.emitter);
        self.tasks.push(emitter_task);

        for timer in services.timers {
            let timer_task = self.spawn_timer_task(timer, event_sender.clone());
            self.tasks.push(timer_task);
        }
        // the collector sees the queue close once every timer is gone
        drop(event_sender);

        if settings.bind_signals {
            let signal_task = spawn_signal_listener(self.stop.clone())
                .context("failed to bind signal handlers")?;
            self.tasks.push(signal_task);
        }

        Ok(())
    }

    /// Wait for the stop signal or for any task to end on its own.
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        let ended = tokio::select! {
            _ = self.stop.stopped() => None,
            (result, index, _) = futures::future::select_all(self.tasks.iter_mut()) => {
                Some((result, index))
            }
        };

        let mut failure = None;
        if let Some((result, index)) = ended {
            self.tasks.swap_remove(index);
            match result {
                Err(e) => {
                    tracing::error!("Task completed with error: {e}");
                    failure = Some(e);
                }
                Ok(()) if !self.stop.is_set() => tracing::warn!("Task completed unexpectedly"),
                Ok(()) => {}
            }
        }

        tracing::info!("Shutting down, cancelling all tasks");
        self.stop.set();
        self.wait_for_tasks_with_timeout(SHUTDOWN_TIMEOUT).await;

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }

    fn spawn_collector_task(
        &self,
        collector: MetricsCollector,
        events: mpsc::Receiver<CollectionEvent>,
        poll_interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting metrics collector task");
            collector.run(events, poll_interval).await;
            tracing::info!("Metrics collector task completed");
        })
    }

    fn spawn_emitter_task(&self, emitter: Arc<Emitter>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting emitter task");
            emitter.run().await;
            tracing::info!("Emitter task completed");
        })
    }

    fn spawn_timer_task(
        &self,
        timer: GroupTimer,
        events: mpsc::Sender<CollectionEvent>,
    ) -> JoinHandle<()> {
        let stop = self.stop.clone();
        tokio::spawn(run_timer(timer, events, stop))
    }
}

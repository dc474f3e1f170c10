use anyhow::Result;

use crate::app::services::ApplicationServices;
use crate::app::tasks::Tasks;
use crate::app::tasks::TaskSettings;
use crate::stop::StopSignal;

/// Application core structure with explicit dependencies
pub struct Application {
    services: ApplicationServices,
    settings: TaskSettings,
}

impl Application {
    pub fn new(services: ApplicationServices, settings: TaskSettings) -> Self {
        Self { services, settings }
    }

    pub fn services(&self) -> &ApplicationServices {
        &self.services
    }

    /// Stop signal shared by every task.
    pub fn stop_signal(&self) -> StopSignal {
        self.services.stop.clone()
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(self) -> Result<()> {
        tracing::info!("Starting all application tasks...");

        let mut tasks = Tasks::new(self.services.stop.clone());
        let metric_map = self.services.metric_map.clone();

        if let Err(e) = tasks.spawn_all_tasks(self.services, &self.settings) {
            tracing::error!("Failed to spawn application tasks: {}", e);
            return Err(e);
        }

        if let Err(e) = tasks.wait_for_completion().await {
            tracing::error!("Error during task execution: {}", e);
            return Err(e);
        }

        let pending = metric_map.point_count();
        if pending > 0 {
            tracing::warn!(points = pending, "Exiting with undelivered metrics");
        }
        tracing::info!("Application run completed");
        Ok(())
    }
}

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler};

use crate::config::DispatchConfig;
use crate::error::{AppError, AppResult};
use crate::services::Dispatcher;

/// Runs [`Dispatcher::tick`] on the configured cron expression.
pub struct DispatchScheduler {
    scheduler: Arc<Mutex<TokioCronScheduler>>,
    dispatcher: Dispatcher,
    cron: String,
}

impl DispatchScheduler {
    pub async fn new(dispatcher: Dispatcher, config: &DispatchConfig) -> AppResult<Self> {
        let scheduler = TokioCronScheduler::new()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            dispatcher,
            cron: config.cron.clone(),
        })
    }

    /// Registers the dispatch job and starts the scheduler.
    pub async fn start(&self) -> AppResult<()> {
        let dispatcher = self.dispatcher.clone();
        let job = Job::new_async(self.cron.as_str(), move |_uuid, _lock| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move {
                if let Err(e) = dispatcher.tick().await {
                    tracing::error!(error = %e, "Dispatch tick failed");
                }
            })
        })
        .map_err(|e| AppError::BadRequest {
            message: format!("Invalid cron expression: {}", e),
        })?;

        let scheduler = self.scheduler.lock().await;
        scheduler.add(job).await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;
        scheduler.start().await.map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;

        tracing::info!(cron = %self.cron, "Dispatch scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    pub async fn stop(&self) -> AppResult<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;
        tracing::info!("Dispatch scheduler stopped");
        Ok(())
    }
}

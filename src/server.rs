//! HTTP server lifecycle: pool, migrations, dispatch scheduler, graceful
//! shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

use crate::api::routes::create_router;
use crate::config::{Environment, settings::Settings};
use crate::db::{establish_async_connection_pool, run_migrations};
use crate::jobs::DispatchScheduler;
use crate::services::LogTransport;
use crate::state::AppState;

pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = self.settings;
        tracing::info!(
            app_name = %settings.application.name,
            app_version = %settings.application.version,
            environment = %Environment::from_env(),
            "Application starting"
        );
        tracing::info!(
            host = %settings.server.host,
            port = settings.server.port,
            request_timeout = settings.server.request_timeout,
            max_connections = settings.database.max_connections,
            cache_enabled = settings.cache.enabled,
            dispatch_enabled = settings.dispatch.enabled,
            "Configuration loaded"
        );

        settings.jwt.validate().map_err(|e| {
            tracing::error!(error = %e, "JWT configuration validation failed");
            anyhow::anyhow!("JWT configuration validation failed: {}", e)
        })?;

        if settings.database.auto_migrate {
            let applied = run_migrations(&settings.database.url).await?;
            tracing::info!(count = applied.len(), "Migrations applied");
        }

        let pool = establish_async_connection_pool(&settings.database).await?;
        tracing::info!("Database connection pool initialized");

        let state = AppState::new(pool, &settings, Arc::new(LogTransport));

        let scheduler = if settings.dispatch.enabled {
            let scheduler =
                DispatchScheduler::new(state.services.dispatcher.clone(), &settings.dispatch)
                    .await?;
            scheduler.start().await?;
            state.set_dispatch_running(true);
            Some(scheduler)
        } else {
            tracing::info!("Dispatch scheduler disabled");
            None
        };

        let router = create_router(state.clone(), &settings.server);

        let address = settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;
        tracing::info!(address = %address, "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        state.services.dispatcher.shutdown();
        if let Some(scheduler) = scheduler {
            state.set_dispatch_running(false);
            if let Err(e) = scheduler.stop().await {
                tracing::warn!(error = %e, "Dispatch scheduler did not stop cleanly");
            }
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

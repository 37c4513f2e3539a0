// Main entry point for the video generation API server

use std::sync::Arc;

use anyhow::{Context, Result};
use api_core::server::{build_app, AppState};
use api_core::kernel::generator::MockVideoGenerator;
use api_core::kernel::store::RedisStore;
use api_core::kernel::worker::{JobWorker, WorkerConfig};
use api_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(env = %config.env, "Starting Dream Machine Platform API");

    // Connect to the shared store. Unreachable Redis is not fatal: the
    // limiter, queues and counters run on the in-process fallback instead.
    let redis = match RedisStore::connect(&config.redis_url).await {
        Ok(store) => {
            tracing::info!(url = %config.redis_url, "Connected to Redis");
            Some(Arc::new(store))
        }
        Err(error) => {
            tracing::warn!(error = %error, "Redis unavailable, using in-process store");
            None
        }
    };

    // Build the service graph and router
    let state = AppState::new(config.clone(), redis);
    let app = build_app(state.clone());

    // Start the background worker
    if config.worker_enabled {
        let worker = JobWorker::with_config(
            state.storage.clone(),
            state.scheduler.clone(),
            Arc::new(MockVideoGenerator::new()),
            WorkerConfig::from_seconds(config.worker_poll_interval),
        );
        tokio::spawn(async move {
            if let Err(error) = worker.run().await {
                tracing::error!(error = %error, "Job worker exited with error");
            }
        });
        tracing::info!("Job worker started");
    } else {
        tracing::info!("Worker disabled by configuration");
    }

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);
    tracing::info!("Dashboard: ws://localhost:{}/ws/dashboard", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

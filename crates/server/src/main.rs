use std::time::Duration;

use anyhow::Result;
use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_server::bootstrap_with_config;
use tokio_util::sync::CancellationToken;

fn init_logging(config: &AppConfig) {
    use leadflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap_with_config(config).await?;
    let shutdown = CancellationToken::new();

    let scheduler = app.scheduler(shutdown.child_token())?.map(|scheduler| {
        tokio::spawn(async move {
            scheduler.run().await;
        })
    });

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "leadflow-server listening"
    );

    let signal = shutdown.clone();
    axum::serve(listener, app.router())
        .with_graceful_shutdown(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(
                    event_name = "system.server.signal_error",
                    error = %error,
                    "failed to listen for shutdown signal"
                );
            }
            signal.cancel();
        })
        .await?;

    tracing::info!(event_name = "system.server.stopping", "leadflow-server stopping");
    shutdown.cancel();
    if let Some(handle) = scheduler {
        let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!(
                event_name = "system.server.scheduler_timeout",
                "auto-transfer run still in progress at shutdown"
            );
        }
    }

    app.db_pool.close().await;
    Ok(())
}

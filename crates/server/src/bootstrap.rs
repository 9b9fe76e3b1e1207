use std::sync::Arc;

use axum::Router;
use leadflow_core::config::{AppConfig, ConfigError, LoadOptions};
use leadflow_core::errors::ApplicationError;
use leadflow_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{self, AppState};
use crate::health::{self, HealthState};
use crate::scheduler::{AutoTransferScheduler, DailySchedule, SystemClock};
use crate::services::{Repositories, Services};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub services: Services,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let services = Services::new(Repositories::sql(db_pool.clone()), &config);
    Ok(Application { config, db_pool, services })
}

impl Application {
    /// API routes plus the unauthenticated `/health` probe.
    pub fn router(&self) -> Router {
        api::router(AppState::new(self.services.clone())).merge(health::router(
            HealthState::new(self.db_pool.clone(), self.config.scheduler.enabled),
        ))
    }

    /// `None` when the scheduler is switched off in config.
    pub fn scheduler(
        &self,
        shutdown: CancellationToken,
    ) -> Result<Option<AutoTransferScheduler>, ApplicationError> {
        if !self.config.scheduler.enabled {
            info!(event_name = "system.bootstrap.scheduler_disabled", "auto-transfer disabled");
            return Ok(None);
        }

        let schedule = DailySchedule::from_config(&self.config.scheduler)?;
        Ok(Some(AutoTransferScheduler::new(
            schedule,
            Arc::new(SystemClock),
            self.services.auto_transfer.clone(),
            shutdown,
        )))
    }
}

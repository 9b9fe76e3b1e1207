use chrono::Utc;
use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_server::{bootstrap_with_config, services::TransferRunReport, BootstrapError};

use crate::commands::{runtime, CommandResult};

/// One auto-transfer pass against the configured database, outside the daily schedule.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "transfer",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "transfer",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let app = bootstrap_with_config(config).await?;
        let report = app.services.auto_transfer.run_once(Utc::now()).await;
        app.db_pool.close().await;
        Ok::<TransferRunReport, BootstrapError>(report)
    });

    match result {
        Ok(report @ TransferRunReport::Completed { transferred, failed, .. }) => {
            CommandResult::success_with_report(
                "transfer",
                format!("auto-transfer pass finished: {transferred} transferred, {failed} failed"),
                &report,
            )
        }
        Ok(TransferRunReport::Aborted { reason }) => {
            CommandResult::failure("transfer", "auto_transfer_aborted", reason, 6)
        }
        Err(BootstrapError::Config(error)) => {
            CommandResult::failure("transfer", "config_validation", error.to_string(), 2)
        }
        Err(error @ BootstrapError::DatabaseConnect(_)) => {
            CommandResult::failure("transfer", "db_connectivity", error.to_string(), 4)
        }
        Err(error @ BootstrapError::Migration(_)) => {
            CommandResult::failure("transfer", "migration", error.to_string(), 5)
        }
    }
}

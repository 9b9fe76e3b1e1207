use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_core::domain::auto_transfer::{AutoTransferPolicy, AUTO_TRANSFER_CONFIG_TYPE};
use leadflow_db::repositories::{SqlSystemConfigRepository, SystemConfigRepository};
use leadflow_db::{connect_with_settings, DbPool};
use serde::Serialize;

use crate::commands::runtime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DATABASE_CHECKS: [&str; 3] =
    ["database_connectivity", "lifecycle_schema", "auto_transfer_policy"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_scheduler(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Fail,
                error.to_string(),
            ));
            checks.extend(DATABASE_CHECKS.into_iter().map(|name| {
                DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                )
            }));
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if checks.iter().any(|check| check.status == CheckStatus::Warn) {
        (CheckStatus::Warn, "doctor: ready, with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_scheduler(config: &AppConfig) -> DoctorCheck {
    if !config.scheduler.enabled {
        return DoctorCheck::new(
            "scheduler",
            CheckStatus::Warn,
            "scheduler.enabled is false; neglected leads will not be transferred",
        );
    }
    match config.scheduler.offset() {
        Some(offset) => DoctorCheck::new(
            "scheduler",
            CheckStatus::Pass,
            format!("daily run at {} {offset}", config.scheduler.run_at),
        ),
        None => DoctorCheck::new(
            "scheduler",
            CheckStatus::Fail,
            "scheduler.utc_offset_minutes is out of range",
        ),
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            )];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![DoctorCheck::new(
                    "database_connectivity",
                    CheckStatus::Fail,
                    format!("failed to connect to database: {error}"),
                )];
            }
        };

        let mut checks = vec![DoctorCheck::new(
            "database_connectivity",
            CheckStatus::Pass,
            format!("connected using `{}`", config.database.url),
        )];
        let schema = check_schema(&pool).await;
        let schema_ready = schema.status == CheckStatus::Pass;
        checks.push(schema);
        if schema_ready {
            checks.push(check_policy(&pool).await);
        } else {
            checks.push(DoctorCheck::new(
                "auto_transfer_policy",
                CheckStatus::Skipped,
                "skipped because the lifecycle schema is missing",
            ));
        }

        pool.close().await;
        checks
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    let result = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
         AND name IN ('customer', 'customer_assignment_history', \
         'customer_progress_history', 'system_config', 'operator_token')",
    )
    .fetch_one(pool)
    .await;

    match result {
        Ok(5) => {
            DoctorCheck::new("lifecycle_schema", CheckStatus::Pass, "lifecycle tables present")
        }
        Ok(found) => DoctorCheck::new(
            "lifecycle_schema",
            CheckStatus::Fail,
            format!("{found}/5 lifecycle tables present; run `leadflow migrate`"),
        ),
        Err(error) => DoctorCheck::new(
            "lifecycle_schema",
            CheckStatus::Fail,
            format!("schema inspection failed: {error}"),
        ),
    }
}

async fn check_policy(pool: &DbPool) -> DoctorCheck {
    let repository = SqlSystemConfigRepository::new(pool.clone());
    match repository.find_enabled(AUTO_TRANSFER_CONFIG_TYPE).await {
        Ok(Some(config)) => match AutoTransferPolicy::from_value(&config.config_value) {
            Ok(policy) => DoctorCheck::new(
                "auto_transfer_policy",
                CheckStatus::Pass,
                format!(
                    "leads idle for {} day(s) go to {} ({})",
                    policy.days_without_progress,
                    policy.target_sales_name,
                    policy.target_sales_id
                ),
            ),
            Err(error) => {
                DoctorCheck::new("auto_transfer_policy", CheckStatus::Fail, error.to_string())
            }
        },
        Ok(None) => DoctorCheck::new(
            "auto_transfer_policy",
            CheckStatus::Warn,
            format!("no enabled `{AUTO_TRANSFER_CONFIG_TYPE}` config; scheduled runs will abort"),
        ),
        Err(error) => DoctorCheck::new(
            "auto_transfer_policy",
            CheckStatus::Fail,
            format!("could not read policy: {error}"),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

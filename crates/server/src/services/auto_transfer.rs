use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use leadflow_core::domain::auto_transfer::{AutoTransferPolicy, AUTO_TRANSFER_CONFIG_TYPE};
use leadflow_core::domain::customer::CustomerProgress;
use leadflow_core::domain::operator::Operator;
use leadflow_core::errors::ApplicationError;
use leadflow_core::lifecycle::{transfer_decision, TransferDecision};

use super::{AssignmentService, Repositories};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferRunReport {
    Completed { scanned: usize, transferred: usize, skipped: usize, failed: usize },
    Aborted { reason: String },
}

/// One pass of the neglected-lead sweep. The policy is read fresh on every run.
#[derive(Clone)]
pub struct AutoTransferJob {
    repos: Repositories,
    assignments: AssignmentService,
    system_operator: Operator,
}

impl AutoTransferJob {
    pub fn new(
        repos: Repositories,
        assignments: AssignmentService,
        system_operator: Operator,
    ) -> Self {
        Self { repos, assignments, system_operator }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> TransferRunReport {
        let policy = match self.load_policy().await {
            Ok(policy) => policy,
            Err(reason) => {
                warn!(
                    event_name = "scheduler.auto_transfer.aborted",
                    operator_id = %self.system_operator.id,
                    reason = %reason,
                    "auto-transfer run aborted"
                );
                return TransferRunReport::Aborted { reason };
            }
        };

        let candidates =
            match self.repos.customers.list_by_progress(CustomerProgress::InitialContact).await {
                Ok(candidates) => candidates,
                Err(error) => {
                    let reason = format!("could not scan initial-contact customers: {error}");
                    warn!(
                        event_name = "scheduler.auto_transfer.aborted",
                        operator_id = %self.system_operator.id,
                        reason = %reason,
                        "auto-transfer run aborted"
                    );
                    return TransferRunReport::Aborted { reason };
                }
            };

        let scanned = candidates.len();
        let (mut transferred, mut skipped, mut failed) = (0, 0, 0);

        for customer in candidates {
            let elapsed_days = match transfer_decision(&customer, &policy, now) {
                TransferDecision::Transfer { elapsed_days } => elapsed_days,
                decision => {
                    debug!(
                        event_name = "scheduler.auto_transfer.skipped",
                        customer_id = %customer.id,
                        decision = ?decision,
                        "customer not due for transfer"
                    );
                    skipped += 1;
                    continue;
                }
            };

            let result = self
                .assignments
                .assign(&customer.id.0, &policy.target_sales_id, "", &self.system_operator, now)
                .await;
            match result {
                Ok(_) => {
                    info!(
                        event_name = "scheduler.auto_transfer.transferred",
                        customer_id = %customer.id,
                        operator_id = %self.system_operator.id,
                        from_sales_id = customer.related_sales_id(),
                        to_sales_id = %policy.target_sales_id,
                        elapsed_days,
                        "neglected customer transferred"
                    );
                    transferred += 1;
                }
                Err(ApplicationError::PostCommit { step, message }) => {
                    warn!(
                        event_name = "scheduler.auto_transfer.partial",
                        customer_id = %customer.id,
                        operator_id = %self.system_operator.id,
                        step,
                        error = %message,
                        "customer transferred but a post-commit step failed"
                    );
                    transferred += 1;
                }
                Err(error) => {
                    warn!(
                        event_name = "scheduler.auto_transfer.failed",
                        customer_id = %customer.id,
                        operator_id = %self.system_operator.id,
                        status = error.status_code(),
                        error = %error,
                        "customer transfer failed; will retry next run"
                    );
                    failed += 1;
                }
            }
        }

        info!(
            event_name = "scheduler.auto_transfer.completed",
            operator_id = %self.system_operator.id,
            scanned,
            transferred,
            skipped,
            failed,
            "auto-transfer run completed"
        );
        TransferRunReport::Completed { scanned, transferred, skipped, failed }
    }

    async fn load_policy(&self) -> Result<AutoTransferPolicy, String> {
        let config = self
            .repos
            .system_configs
            .find_enabled(AUTO_TRANSFER_CONFIG_TYPE)
            .await
            .map_err(|error| format!("could not load auto-transfer config: {error}"))?
            .ok_or_else(|| format!("no enabled `{AUTO_TRANSFER_CONFIG_TYPE}` config"))?;

        AutoTransferPolicy::from_value(&config.config_value).map_err(|error| error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use leadflow_core::domain::auto_transfer::{
        AutoTransferPolicy, SystemConfig, AUTO_TRANSFER_CONFIG_KEY, AUTO_TRANSFER_CONFIG_TYPE,
    };
    use leadflow_core::domain::customer::{CustomerProgress, PartyRef};
    use leadflow_core::domain::history::AssignmentHistoryFilter;
    use leadflow_core::domain::operator::Operator;

    use super::{AutoTransferJob, TransferRunReport};
    use crate::services::test_support::{customer, new_id, seed_sales};
    use crate::services::{AssignmentService, AuditHistoryLogger, Repositories};

    fn job(repos: &Repositories) -> AutoTransferJob {
        let audit = AuditHistoryLogger::new(
            repos.assignment_history.clone(),
            repos.progress_history.clone(),
        );
        AutoTransferJob::new(
            repos.clone(),
            AssignmentService::new(repos.clone(), audit),
            Operator::system("system", "admin"),
        )
    }

    async fn store_policy(repos: &Repositories, value: serde_json::Value) {
        repos
            .system_configs
            .save(SystemConfig {
                id: new_id(),
                config_type: AUTO_TRANSFER_CONFIG_TYPE.to_string(),
                config_key: AUTO_TRANSFER_CONFIG_KEY.to_string(),
                config_value: value,
                is_enabled: true,
                updated_at: Utc::now(),
            })
            .await
            .expect("save policy");
    }

    #[tokio::test]
    async fn overdue_initial_contact_leads_move_to_the_fallback_owner() {
        let repos = Repositories::in_memory();
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 18, 0, 0).single().expect("timestamp");
        let nina = seed_sales(&repos, "nina").await;
        let sid = seed_sales(&repos, "sid").await;
        store_policy(
            &repos,
            AutoTransferPolicy {
                target_sales_id: nina.id.clone(),
                target_sales_name: "nina".to_string(),
                days_without_progress: 30,
            }
            .to_value(),
        )
        .await;

        let mut overdue = customer("Overdue Co", now - Duration::days(31));
        overdue.related_sales = Some(sid.party());
        let mut fresh = customer("Fresh Co", now - Duration::days(3));
        fresh.related_sales = Some(sid.party());
        let mut owned = customer("Owned Co", now - Duration::days(60));
        owned.related_sales = Some(nina.party());
        let mut advanced = customer("Advanced Co", now - Duration::days(90));
        advanced.progress = CustomerProgress::Normal;
        for record in [&overdue, &fresh, &owned, &advanced] {
            repos.customers.insert(record.clone()).await.expect("insert");
        }

        let report = job(&repos).run_once(now).await;

        assert_eq!(
            report,
            TransferRunReport::Completed { scanned: 3, transferred: 1, skipped: 2, failed: 0 }
        );
        let moved = repos.customers.find_by_id(&overdue.id).await.expect("find").expect("lead");
        assert_eq!(moved.related_sales, Some(PartyRef::new(nina.id.clone(), "nina")));
        assert_eq!(moved.initial_contact_at, Some(now));

        let history = repos
            .assignment_history
            .list(&AssignmentHistoryFilter::default())
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].operator, PartyRef::new("system", "admin"));
        assert_eq!(history[0].from_sales, Some(sid.party()));
    }

    #[tokio::test]
    async fn missing_or_malformed_policy_aborts_the_run() {
        let repos = Repositories::in_memory();
        repos.customers.insert(customer("Acme Foods", Utc::now())).await.expect("insert");

        let missing = job(&repos).run_once(Utc::now()).await;
        assert!(matches!(missing, TransferRunReport::Aborted { .. }));

        store_policy(&repos, json!({ "targetSalesId": new_id(), "daysWithoutProgress": 30 }))
            .await;
        let malformed = job(&repos).run_once(Utc::now()).await;
        assert!(matches!(
            malformed,
            TransferRunReport::Aborted { ref reason } if reason.contains("targetSalesName")
        ));
    }

    #[tokio::test]
    async fn per_customer_failures_do_not_stop_the_scan() {
        let repos = Repositories::in_memory();
        let now = Utc::now();
        store_policy(
            &repos,
            json!({
                "targetSalesId": new_id(),
                "targetSalesName": "ghost",
                "daysWithoutProgress": 1
            }),
        )
        .await;
        for name in ["One", "Two"] {
            repos
                .customers
                .insert(customer(name, now - Duration::days(5)))
                .await
                .expect("insert");
        }

        let report = job(&repos).run_once(now).await;

        assert_eq!(
            report,
            TransferRunReport::Completed { scanned: 2, transferred: 0, skipped: 0, failed: 2 }
        );
    }
}

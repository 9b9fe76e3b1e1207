use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use leadflow_core::domain::customer::{CustomerId, CustomerProgress, PartyRef, ProgressVocabulary};
use leadflow_core::domain::history::NewProgressHistory;
use leadflow_core::domain::operator::Operator;
use leadflow_core::errors::ApplicationError;
use leadflow_core::lifecycle::{
    plan_progress_change, supersedes_namesakes, PostCommitReport, PostCommitStep,
    ProgressChange, StepOutcome,
};

use super::{persistence, AuditHistoryLogger, Repositories};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressChangeOutcome {
    pub customer_id: String,
    pub from_progress: CustomerProgress,
    pub to_progress: CustomerProgress,
    pub changed: bool,
    pub report: PostCommitReport,
}

#[derive(Clone)]
pub struct ProgressService {
    repos: Repositories,
    audit: AuditHistoryLogger,
    vocabulary: ProgressVocabulary,
}

impl ProgressService {
    pub fn new(
        repos: Repositories,
        audit: AuditHistoryLogger,
        vocabulary: ProgressVocabulary,
    ) -> Self {
        Self { repos, audit, vocabulary }
    }

    pub fn vocabulary(&self) -> &ProgressVocabulary {
        &self.vocabulary
    }

    /// Operator-driven progress change. `progress` may be a canonical code or
    /// a configured label. Asking for the current value succeeds without a write.
    ///
    /// Advancing to `NORMAL` disables `INITIAL_CONTACT` namesakes afterwards; a
    /// failure there is returned as [`ApplicationError::PostCommit`] with the
    /// change already committed.
    pub async fn change_progress(
        &self,
        customer_id: &str,
        progress: &str,
        remark: &str,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> Result<ProgressChangeOutcome, ApplicationError> {
        if !operator.can_change_progress() {
            return Err(ApplicationError::Forbidden(
                "operator is not allowed to change customer progress".to_string(),
            ));
        }

        let customer_id = CustomerId::parse(customer_id)?;
        let target = self.vocabulary.resolve(progress)?;

        let customer = self
            .repos
            .customers
            .find_by_id(&customer_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("customer", customer_id.as_str()))?;

        let (from, to) = match plan_progress_change(&customer, target)? {
            ProgressChange::Unchanged(current) => {
                return Ok(ProgressChangeOutcome {
                    customer_id: customer_id.0,
                    from_progress: current,
                    to_progress: current,
                    changed: false,
                    report: PostCommitReport::default(),
                });
            }
            ProgressChange::Changed { from, to } => (from, to),
        };

        let matched = self
            .repos
            .customers
            .update_progress(&customer_id, to, now)
            .await
            .map_err(persistence)?;
        if !matched {
            return Err(ApplicationError::not_found("customer", customer_id.as_str()));
        }

        info!(
            event_name = "lifecycle.progress.changed",
            customer_id = %customer_id,
            operator_id = %operator.id,
            from_progress = from.as_str(),
            to_progress = to.as_str(),
            "customer progress changed"
        );

        let entry = NewProgressHistory {
            customer_id: customer_id.0.clone(),
            customer_name: customer.name.clone(),
            from_progress: from,
            to_progress: to,
            operator: PartyRef::new(operator.id.clone(), operator.name.clone()),
            remark: remark.trim().to_string(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        let mut report = PostCommitReport::default();
        report.record(
            PostCommitStep::ProgressHistory,
            self.audit.record_progress(Some(entry), now).await,
        );

        let namesakes = if supersedes_namesakes(to) {
            match self.repos.customers.disable_namesakes(&customer.name, &customer_id, now).await
            {
                Ok(affected) => {
                    if affected > 0 {
                        info!(
                            event_name = "lifecycle.progress.namesakes_disabled",
                            customer_id = %customer_id,
                            operator_id = %operator.id,
                            affected,
                            "namesake customers disabled"
                        );
                    }
                    StepOutcome::Applied { affected }
                }
                Err(error) => {
                    warn!(
                        event_name = "lifecycle.progress.namesakes_failed",
                        customer_id = %customer_id,
                        operator_id = %operator.id,
                        error = %error,
                        "namesake disable failed after progress change committed"
                    );
                    StepOutcome::Failed { message: error.to_string() }
                }
            }
        } else {
            StepOutcome::Skipped
        };
        report.record(PostCommitStep::DisableNamesakes, namesakes);

        if let Some((step, message)) = report.surfaced_failure() {
            error!(
                event_name = "lifecycle.progress.partial",
                customer_id = %customer_id,
                operator_id = %operator.id,
                step = step.as_str(),
                error = message,
                "progress change committed but a post-commit step failed"
            );
            return Err(ApplicationError::PostCommit {
                step: step.as_str(),
                message: message.to_string(),
            });
        }

        Ok(ProgressChangeOutcome {
            customer_id: customer_id.0,
            from_progress: from,
            to_progress: to,
            changed: true,
            report,
        })
    }
}

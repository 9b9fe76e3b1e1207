//! Append-only assignment and progress ledgers.
//!
//! Lifecycle services call the `record_*` methods after their primary write.
//! Those never fail the caller; a rejected or failed append comes back as a
//! [`StepOutcome::Failed`] and is logged here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use leadflow_core::domain::history::{
    AssignmentHistory, AssignmentHistoryFilter, NewAssignmentHistory, NewProgressHistory,
    ProgressHistory, ProgressHistoryFilter,
};
use leadflow_core::errors::ApplicationError;
use leadflow_core::lifecycle::StepOutcome;
use leadflow_db::repositories::{AssignmentHistoryRepository, ProgressHistoryRepository};

use super::persistence;

#[derive(Clone)]
pub struct AuditHistoryLogger {
    assignments: Arc<dyn AssignmentHistoryRepository>,
    progress: Arc<dyn ProgressHistoryRepository>,
}

impl AuditHistoryLogger {
    pub fn new(
        assignments: Arc<dyn AssignmentHistoryRepository>,
        progress: Arc<dyn ProgressHistoryRepository>,
    ) -> Self {
        Self { assignments, progress }
    }

    pub async fn append_assignment(
        &self,
        entry: NewAssignmentHistory,
        now: DateTime<Utc>,
    ) -> Result<AssignmentHistory, ApplicationError> {
        entry.validate()?;
        let entry = entry.finish(now);

        if let Err(error) = self.assignments.append(entry.clone()).await {
            warn!(
                event_name = "audit.assignment.append_failed",
                customer_id = %entry.customer_id,
                operator_id = %entry.operator.id,
                operation = entry.operation.as_str(),
                error = %error,
                "assignment history append failed"
            );
            return Err(persistence(error));
        }

        info!(
            event_name = "audit.assignment.appended",
            customer_id = %entry.customer_id,
            operator_id = %entry.operator.id,
            operation = entry.operation.as_str(),
            history_id = %entry.id.0,
            "assignment history appended"
        );
        Ok(entry)
    }

    pub async fn append_progress(
        &self,
        entry: NewProgressHistory,
        now: DateTime<Utc>,
    ) -> Result<ProgressHistory, ApplicationError> {
        entry.validate()?;
        let entry = entry.finish(now);

        if let Err(error) = self.progress.append(entry.clone()).await {
            warn!(
                event_name = "audit.progress.append_failed",
                customer_id = %entry.customer_id,
                operator_id = %entry.operator.id,
                from_progress = entry.from_progress.as_str(),
                to_progress = entry.to_progress.as_str(),
                error = %error,
                "progress history append failed"
            );
            return Err(persistence(error));
        }

        info!(
            event_name = "audit.progress.appended",
            customer_id = %entry.customer_id,
            operator_id = %entry.operator.id,
            from_progress = entry.from_progress.as_str(),
            to_progress = entry.to_progress.as_str(),
            history_id = %entry.id.0,
            "progress history appended"
        );
        Ok(entry)
    }

    pub async fn record_assignment(
        &self,
        entry: Option<NewAssignmentHistory>,
        now: DateTime<Utc>,
    ) -> StepOutcome {
        let Some(entry) = entry else {
            return StepOutcome::Skipped;
        };
        match self.append_assignment(entry, now).await {
            Ok(_) => StepOutcome::Applied { affected: 1 },
            Err(error) => StepOutcome::Failed { message: error.to_string() },
        }
    }

    pub async fn record_progress(
        &self,
        entry: Option<NewProgressHistory>,
        now: DateTime<Utc>,
    ) -> StepOutcome {
        let Some(entry) = entry else {
            return StepOutcome::Skipped;
        };
        match self.append_progress(entry, now).await {
            Ok(_) => StepOutcome::Applied { affected: 1 },
            Err(error) => StepOutcome::Failed { message: error.to_string() },
        }
    }

    pub async fn list_assignments(
        &self,
        filter: &AssignmentHistoryFilter,
    ) -> Result<Vec<AssignmentHistory>, ApplicationError> {
        self.assignments.list(filter).await.map_err(persistence)
    }

    pub async fn list_progress(
        &self,
        filter: &ProgressHistoryFilter,
    ) -> Result<Vec<ProgressHistory>, ApplicationError> {
        self.progress.list(filter).await.map_err(persistence)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use leadflow_core::domain::customer::{CustomerProgress, PartyRef};
    use leadflow_core::domain::history::{
        AssignmentHistory, AssignmentHistoryFilter, AssignmentOperation, NewAssignmentHistory,
        NewProgressHistory, ProgressHistory, ProgressHistoryFilter,
    };
    use leadflow_core::errors::{ApplicationError, DomainError};
    use leadflow_core::lifecycle::StepOutcome;
    use leadflow_db::repositories::{
        AssignmentHistoryRepository, InMemoryAssignmentHistoryRepository,
        InMemoryProgressHistoryRepository, RepositoryError,
    };

    use super::AuditHistoryLogger;

    struct FailingAssignmentHistory;

    #[async_trait::async_trait]
    impl AssignmentHistoryRepository for FailingAssignmentHistory {
        async fn append(&self, _entry: AssignmentHistory) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("history store offline".to_string()))
        }

        async fn list(
            &self,
            _filter: &AssignmentHistoryFilter,
        ) -> Result<Vec<AssignmentHistory>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    fn logger() -> AuditHistoryLogger {
        AuditHistoryLogger::new(
            Arc::new(InMemoryAssignmentHistoryRepository::default()),
            Arc::new(InMemoryProgressHistoryRepository::default()),
        )
    }

    fn assignment_entry() -> NewAssignmentHistory {
        NewAssignmentHistory {
            customer_id: "c-1".to_string(),
            customer_name: "Acme Foods".to_string(),
            from_sales: None,
            from_agent: None,
            to_sales: Some(PartyRef::new("s-1", "Sam")),
            to_agent: None,
            operator: PartyRef::new("u-1", "Root"),
            operation: AssignmentOperation::Assign,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn append_defaults_timestamps_to_now() {
        let logger = logger();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).single().expect("timestamp");

        let stored = logger.append_assignment(assignment_entry(), now).await.expect("append");

        assert_eq!(stored.created_at, now);
        assert_eq!(stored.updated_at, now);
        let listed =
            logger.list_assignments(&AssignmentHistoryFilter::default()).await.expect("list");
        assert_eq!(listed, vec![stored]);
    }

    #[tokio::test]
    async fn missing_required_fields_fail_before_any_write() {
        let logger = logger();
        let mut entry = NewProgressHistory {
            customer_id: "c-1".to_string(),
            customer_name: "Acme Foods".to_string(),
            from_progress: CustomerProgress::InitialContact,
            to_progress: CustomerProgress::Normal,
            operator: PartyRef::new("u-1", "Root"),
            remark: String::new(),
            created_at: None,
            updated_at: None,
        };
        entry.operator.name.clear();

        let error = logger.append_progress(entry, Utc::now()).await.expect_err("invalid");

        assert!(matches!(error, ApplicationError::Domain(DomainError::MissingField(_))));
        let listed: Vec<ProgressHistory> =
            logger.list_progress(&ProgressHistoryFilter::default()).await.expect("list");
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn record_reports_store_failures_without_propagating() {
        let logger = AuditHistoryLogger::new(
            Arc::new(FailingAssignmentHistory),
            Arc::new(InMemoryProgressHistoryRepository::default()),
        );

        let outcome = logger.record_assignment(Some(assignment_entry()), Utc::now()).await;
        assert!(matches!(
            outcome,
            StepOutcome::Failed { ref message } if message.contains("offline")
        ));
        assert_eq!(logger.record_assignment(None, Utc::now()).await, StepOutcome::Skipped);
    }
}

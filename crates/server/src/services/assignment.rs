//! Assign and claim. The scheduler funnels through here too, so this is the
//! single code path for ownership changes outside the public pool.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use leadflow_core::domain::customer::{parse_object_id, CustomerId, CustomerProgress, PartyRef};
use leadflow_core::domain::history::AssignmentOperation;
use leadflow_core::domain::operator::Operator;
use leadflow_core::errors::ApplicationError;
use leadflow_core::lifecycle::{
    plan_assignment, PostCommitReport, PostCommitStep, ProgressChange, StepOutcome,
};

use super::{persistence, AuditHistoryLogger, Repositories};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOutcome {
    pub customer_id: String,
    pub customer_name: String,
    pub operation: AssignmentOperation,
    pub sales: PartyRef,
    pub agent: Option<PartyRef>,
    pub from_progress: CustomerProgress,
    pub to_progress: CustomerProgress,
    pub history_recorded: bool,
    pub report: PostCommitReport,
}

#[derive(Clone)]
pub struct AssignmentService {
    repos: Repositories,
    audit: AuditHistoryLogger,
}

impl AssignmentService {
    pub fn new(repos: Repositories, audit: AuditHistoryLogger) -> Self {
        Self { repos, audit }
    }

    /// Sets the sales owner (and optionally the agent) of a customer.
    ///
    /// Once the customer row is written the assignment stands. Audit appends
    /// that fail are only logged; a failed namesake disable is returned as
    /// [`ApplicationError::PostCommit`] with the assignment already committed.
    pub async fn assign(
        &self,
        customer_id: &str,
        sales_id: &str,
        agent_id: &str,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> Result<AssignmentOutcome, ApplicationError> {
        if !operator.can_assign() {
            return Err(ApplicationError::Forbidden(
                "operator is not allowed to assign customers".to_string(),
            ));
        }

        let customer_id = CustomerId::parse(customer_id)?;
        let sales_id = parse_object_id("sales id", sales_id)?;
        let agent_id = match agent_id.trim() {
            "" => None,
            raw => Some(parse_object_id("agent id", raw)?),
        };

        let customer = self
            .repos
            .customers
            .find_by_id(&customer_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("customer", customer_id.as_str()))?;

        let sales = self
            .repos
            .directory
            .find_user(&sales_id)
            .await
            .map_err(persistence)?
            .filter(|user| user.is_factory_sales())
            .ok_or_else(|| ApplicationError::not_found("sales user", sales_id.as_str()))?;

        let agent = match agent_id {
            Some(agent_id) => Some(
                self.repos
                    .directory
                    .find_agent(&agent_id)
                    .await
                    .map_err(persistence)?
                    .ok_or_else(|| ApplicationError::not_found("agent", agent_id.as_str()))?,
            ),
            None => None,
        };

        let has_work_items = self
            .repos
            .work_items
            .has_visible_work_items(customer_id.as_str())
            .await
            .map_err(persistence)?;

        let plan = plan_assignment(
            &customer,
            sales.party(),
            agent.as_ref().map(|agent| agent.party()),
            has_work_items,
            operator,
            now,
        );

        let matched = self
            .repos
            .customers
            .apply_assignment(&customer_id, &plan.update)
            .await
            .map_err(persistence)?;
        if !matched {
            return Err(ApplicationError::not_found("customer", customer_id.as_str()));
        }

        info!(
            event_name = "lifecycle.assignment.committed",
            customer_id = %customer_id,
            operator_id = %operator.id,
            operation = plan.operation.as_str(),
            sales_id = %plan.update.sales.id,
            agent_id = plan.update.agent.as_ref().map(|agent| agent.id.as_str()).unwrap_or(""),
            progress = plan.update.progress.as_str(),
            owner_changed = plan.owner_changed(),
            "customer assignment committed"
        );

        let mut report = PostCommitReport::default();
        let history_recorded = plan.history.is_some();
        report.record(
            PostCommitStep::AssignmentHistory,
            self.audit.record_assignment(plan.history.clone(), now).await,
        );
        report.record(
            PostCommitStep::ProgressHistory,
            self.audit.record_progress(plan.progress_history.clone(), now).await,
        );

        let namesakes = if plan.disable_namesakes {
            match self.repos.customers.disable_namesakes(&customer.name, &customer_id, now).await
            {
                Ok(affected) => {
                    if affected > 0 {
                        info!(
                            event_name = "lifecycle.assignment.namesakes_disabled",
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
                        event_name = "lifecycle.assignment.namesakes_failed",
                        customer_id = %customer_id,
                        operator_id = %operator.id,
                        error = %error,
                        "namesake disable failed after assignment committed"
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
                event_name = "lifecycle.assignment.partial",
                customer_id = %customer_id,
                operator_id = %operator.id,
                step = step.as_str(),
                error = message,
                "assignment committed but a post-commit step failed"
            );
            return Err(ApplicationError::PostCommit {
                step: step.as_str(),
                message: message.to_string(),
            });
        }

        let (from_progress, to_progress) = match plan.progress {
            ProgressChange::Unchanged(progress) => (progress, progress),
            ProgressChange::Changed { from, to } => (from, to),
        };

        Ok(AssignmentOutcome {
            customer_id: customer_id.0,
            customer_name: customer.name,
            operation: plan.operation,
            sales: plan.update.sales,
            agent: plan.update.agent,
            from_progress,
            to_progress,
            history_recorded,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use leadflow_core::domain::customer::{
        Customer, CustomerId, CustomerProgress, PartyRef, PublicPoolFilter,
    };
    use leadflow_core::domain::history::{
        AssignmentHistoryFilter, AssignmentOperation, ProgressHistoryFilter,
    };
    use leadflow_core::domain::operator::{Operator, Role};
    use leadflow_core::errors::{ApplicationError, DomainError};
    use leadflow_core::lifecycle::{
        AssignmentUpdate, PoolEntryUpdate, PoolExitUpdate, PostCommitStep, StepOutcome,
    };
    use leadflow_db::repositories::{
        CustomerRepository, InMemoryCustomerRepository, RepositoryError,
    };

    use super::AssignmentService;
    use crate::services::test_support::{
        customer, new_id, seed_agent, seed_sales, seed_work_item,
    };
    use crate::services::{AuditHistoryLogger, Repositories};

    fn service(repos: &Repositories) -> AssignmentService {
        AssignmentService::new(
            repos.clone(),
            AuditHistoryLogger::new(
                repos.assignment_history.clone(),
                repos.progress_history.clone(),
            ),
        )
    }

    fn admin() -> Operator {
        Operator::new(new_id(), "Root", Role::SuperAdmin)
    }

    async fn stored(repos: &Repositories, id: &CustomerId) -> Customer {
        repos.customers.find_by_id(id).await.expect("find").expect("customer exists")
    }

    #[tokio::test]
    async fn assigning_a_fresh_lead_records_assign_history_in_initial_contact() {
        let repos = Repositories::in_memory();
        let lead = customer("Acme Foods", Utc::now());
        repos.customers.insert(lead.clone()).await.expect("insert");
        let sam = seed_sales(&repos, "sam").await;

        let outcome = service(&repos)
            .assign(&lead.id.0, &sam.id, "", &admin(), Utc::now())
            .await
            .expect("assign");

        assert_eq!(outcome.operation, AssignmentOperation::Assign);
        assert_eq!(outcome.to_progress, CustomerProgress::InitialContact);
        assert!(outcome.history_recorded);

        let history = repos
            .assignment_history
            .list(&AssignmentHistoryFilter::default())
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_sales, None);
        assert_eq!(history[0].to_sales, Some(PartyRef::new(sam.id.clone(), "sam")));
        assert_eq!(history[0].operation.as_str(), "分配");

        let after = stored(&repos, &lead.id).await;
        assert_eq!(after.related_sales_id(), sam.id);
        assert!(!after.is_in_public_pool);
    }

    #[tokio::test]
    async fn reassigning_to_the_same_owners_appends_no_history() {
        let repos = Repositories::in_memory();
        let lead = customer("Acme Foods", Utc::now());
        repos.customers.insert(lead.clone()).await.expect("insert");
        let sam = seed_sales(&repos, "sam").await;
        let service = service(&repos);

        service.assign(&lead.id.0, &sam.id, "", &admin(), Utc::now()).await.expect("first");
        let second =
            service.assign(&lead.id.0, &sam.id, "", &admin(), Utc::now()).await.expect("second");

        assert!(!second.history_recorded);
        assert_eq!(
            second.report.outcome(PostCommitStep::AssignmentHistory),
            Some(&StepOutcome::Skipped)
        );
        let history = repos
            .assignment_history
            .list(&AssignmentHistoryFilter::default())
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn operator_assigning_to_themself_is_a_claim() {
        let repos = Repositories::in_memory();
        let lead = customer("Acme Foods", Utc::now());
        repos.customers.insert(lead.clone()).await.expect("insert");
        let sam = seed_sales(&repos, "sam").await;
        let agency = seed_agent(&repos, "Agency").await;

        let sales_claim = service(&repos)
            .assign(
                &lead.id.0,
                &sam.id,
                "",
                &Operator::new(sam.id.clone(), "sam", Role::FactorySales),
                Utc::now(),
            )
            .await
            .expect("sales claim");
        assert_eq!(sales_claim.operation, AssignmentOperation::Claim);

        let agent_claim = service(&repos)
            .assign(
                &lead.id.0,
                &sam.id,
                &agency.id,
                &Operator::new(agency.id.clone(), "Agency", Role::Agent),
                Utc::now(),
            )
            .await
            .expect("agent claim");
        assert_eq!(agent_claim.operation, AssignmentOperation::Claim);
        assert_eq!(agent_claim.agent, Some(PartyRef::new(agency.id.clone(), "Agency")));
    }

    #[tokio::test]
    async fn work_items_promote_to_normal_and_disable_initial_contact_namesakes() {
        let repos = Repositories::in_memory();
        let lead = customer("Acme Foods", Utc::now());
        let sibling = customer("Acme Foods", Utc::now());
        let mut advanced_sibling = customer("Acme Foods", Utc::now());
        advanced_sibling.progress = CustomerProgress::SampleEvaluation;
        let stranger = customer("Other Co", Utc::now());
        for record in [&lead, &sibling, &advanced_sibling, &stranger] {
            repos.customers.insert(record.clone()).await.expect("insert");
        }
        seed_work_item(&repos, &lead.id).await;
        let sue = seed_sales(&repos, "sue").await;

        let outcome = service(&repos)
            .assign(&lead.id.0, &sue.id, "", &admin(), Utc::now())
            .await
            .expect("assign");

        assert_eq!(outcome.to_progress, CustomerProgress::Normal);
        assert_eq!(
            outcome.report.outcome(PostCommitStep::DisableNamesakes),
            Some(&StepOutcome::Applied { affected: 1 })
        );
        assert_eq!(stored(&repos, &lead.id).await.progress, CustomerProgress::Normal);
        assert_eq!(stored(&repos, &sibling.id).await.progress, CustomerProgress::Disabled);
        assert_eq!(
            stored(&repos, &advanced_sibling.id).await.progress,
            CustomerProgress::SampleEvaluation
        );
        assert_eq!(stored(&repos, &stranger.id).await.progress, CustomerProgress::InitialContact);

        let progress_history = repos
            .progress_history
            .list(&ProgressHistoryFilter::default())
            .await
            .expect("progress history");
        assert_eq!(progress_history.len(), 1);
        assert_eq!(progress_history[0].customer_id, lead.id.0);
        assert_eq!(progress_history[0].to_progress, CustomerProgress::Normal);
    }

    #[tokio::test]
    async fn malformed_and_missing_references_are_rejected_before_writing() {
        let repos = Repositories::in_memory();
        let lead = customer("Acme Foods", Utc::now());
        repos.customers.insert(lead.clone()).await.expect("insert");
        let sam = seed_sales(&repos, "sam").await;
        let service = service(&repos);

        let malformed = service.assign("not-a-uuid", &sam.id, "", &admin(), Utc::now()).await;
        assert!(matches!(
            malformed,
            Err(ApplicationError::Domain(DomainError::InvalidIdentifier { .. }))
        ));

        let missing_customer = service.assign(&new_id(), &sam.id, "", &admin(), Utc::now()).await;
        assert_eq!(missing_customer.map(|_| ()).map_err(|e| e.status_code()), Err(404));

        let missing_sales = service.assign(&lead.id.0, &new_id(), "", &admin(), Utc::now()).await;
        assert_eq!(missing_sales.map(|_| ()).map_err(|e| e.status_code()), Err(404));

        let missing_agent =
            service.assign(&lead.id.0, &sam.id, &new_id(), &admin(), Utc::now()).await;
        assert_eq!(missing_agent.map(|_| ()).map_err(|e| e.status_code()), Err(404));

        let unchanged = stored(&repos, &lead.id).await;
        assert_eq!(unchanged.related_sales, None);
    }

    #[tokio::test]
    async fn inventory_managers_cannot_assign() {
        let repos = Repositories::in_memory();
        let lead = customer("Acme Foods", Utc::now());
        repos.customers.insert(lead.clone()).await.expect("insert");
        let sam = seed_sales(&repos, "sam").await;
        let operator = Operator::new(new_id(), "Ivy", Role::InventoryManager);

        let result = service(&repos).assign(&lead.id.0, &sam.id, "", &operator, Utc::now()).await;

        assert!(matches!(result, Err(ApplicationError::Forbidden(_))));
    }

    #[tokio::test]
    async fn failed_namesake_disable_surfaces_after_the_assignment_commits() {
        let mut repos = Repositories::in_memory();
        repos.customers = std::sync::Arc::new(NamesakeFailure::default());
        let lead = customer("Acme Foods", Utc::now());
        repos.customers.insert(lead.clone()).await.expect("insert");
        seed_work_item(&repos, &lead.id).await;
        let sue = seed_sales(&repos, "sue").await;

        let result = service(&repos).assign(&lead.id.0, &sue.id, "", &admin(), Utc::now()).await;

        assert!(matches!(
            result,
            Err(ApplicationError::PostCommit { step: "disable_namesakes", .. })
        ));
        let committed = stored(&repos, &lead.id).await;
        assert_eq!(committed.related_sales_id(), sue.id);
        assert_eq!(committed.progress, CustomerProgress::Normal);
        let history = repos
            .assignment_history
            .list(&AssignmentHistoryFilter::default())
            .await
            .expect("history");
        assert_eq!(history.len(), 1);
    }

    #[derive(Default)]
    struct NamesakeFailure {
        inner: InMemoryCustomerRepository,
    }

    #[async_trait::async_trait]
    impl CustomerRepository for NamesakeFailure {
        async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn insert(&self, customer: Customer) -> Result<(), RepositoryError> {
            self.inner.insert(customer).await
        }

        async fn list_by_progress(
            &self,
            progress: CustomerProgress,
        ) -> Result<Vec<Customer>, RepositoryError> {
            self.inner.list_by_progress(progress).await
        }

        async fn list_public_pool(
            &self,
            filter: &PublicPoolFilter,
        ) -> Result<Vec<Customer>, RepositoryError> {
            self.inner.list_public_pool(filter).await
        }

        async fn apply_assignment(
            &self,
            id: &CustomerId,
            update: &AssignmentUpdate,
        ) -> Result<bool, RepositoryError> {
            self.inner.apply_assignment(id, update).await
        }

        async fn update_progress(
            &self,
            id: &CustomerId,
            progress: CustomerProgress,
            at: DateTime<Utc>,
        ) -> Result<bool, RepositoryError> {
            self.inner.update_progress(id, progress, at).await
        }

        async fn disable_namesakes(
            &self,
            _name: &str,
            _except: &CustomerId,
            _at: DateTime<Utc>,
        ) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Decode("write conflict".to_string()))
        }

        async fn move_to_public_pool(
            &self,
            id: &CustomerId,
            update: &PoolEntryUpdate,
        ) -> Result<bool, RepositoryError> {
            self.inner.move_to_public_pool(id, update).await
        }

        async fn assign_from_public_pool(
            &self,
            id: &CustomerId,
            update: &PoolExitUpdate,
        ) -> Result<bool, RepositoryError> {
            self.inner.assign_from_public_pool(id, update).await
        }
    }
}

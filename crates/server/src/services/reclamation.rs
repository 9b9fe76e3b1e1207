//! Public pool entry and redistribution.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use leadflow_core::domain::customer::{
    parse_object_id, Customer, CustomerId, OwnerRef, PartyRef, PublicPoolFilter,
};
use leadflow_core::domain::directory::AssignableTargets;
use leadflow_core::domain::operator::Operator;
use leadflow_core::errors::{ApplicationError, DomainError};
use leadflow_core::lifecycle::{
    plan_pool_entry, plan_pool_exit, PoolTarget, PoolTargetType, PostCommitReport,
    PostCommitStep, StepOutcome,
};

use super::{persistence, AuditHistoryLogger, Repositories};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntryOutcome {
    pub customer_id: String,
    pub previous_owner: Option<OwnerRef>,
    pub report: PostCommitReport,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolExitOutcome {
    pub customer_id: String,
    pub target_type: &'static str,
    pub target: PartyRef,
    pub report: PostCommitReport,
}

#[derive(Clone)]
pub struct ReclamationService {
    repos: Repositories,
    audit: AuditHistoryLogger,
    clear_contact_on_entry: bool,
}

impl ReclamationService {
    pub fn new(
        repos: Repositories,
        audit: AuditHistoryLogger,
        clear_contact_on_entry: bool,
    ) -> Self {
        Self { repos, audit, clear_contact_on_entry }
    }

    pub async fn move_to_public_pool(
        &self,
        customer_id: &str,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> Result<PoolEntryOutcome, ApplicationError> {
        let customer_id = CustomerId::parse(customer_id)?;
        let customer = self.find_customer(&customer_id).await?;

        let plan = plan_pool_entry(&customer, operator, self.clear_contact_on_entry, now)?;

        let matched = self
            .repos
            .customers
            .move_to_public_pool(&customer_id, &plan.update)
            .await
            .map_err(persistence)?;
        if !matched {
            return Err(DomainError::AlreadyInPublicPool.into());
        }

        info!(
            event_name = "lifecycle.pool.entered",
            customer_id = %customer_id,
            operator_id = %operator.id,
            previous_owner_id = plan
                .update
                .previous_owner
                .as_ref()
                .map(|owner| owner.id.as_str())
                .unwrap_or(""),
            contact_cleared = plan.update.clear_contact,
            "customer moved to public pool"
        );

        let mut report = PostCommitReport::default();
        report.record(
            PostCommitStep::AssignmentHistory,
            self.audit.record_assignment(Some(plan.history), now).await,
        );
        report.record(
            PostCommitStep::ProgressHistory,
            self.audit.record_progress(plan.progress_history, now).await,
        );

        let cascade = self.repos.work_items.hide_all_for_customer(customer_id.as_str(), now).await;
        let hidden = match cascade {
            Ok(affected) => StepOutcome::Applied { affected },
            Err(error) => {
                warn!(
                    event_name = "lifecycle.pool.hide_work_items_failed",
                    customer_id = %customer_id,
                    operator_id = %operator.id,
                    error = %error,
                    "work item visibility cascade failed"
                );
                StepOutcome::Failed { message: error.to_string() }
            }
        };
        report.record(PostCommitStep::HideWorkItems, hidden);

        Ok(PoolEntryOutcome {
            customer_id: customer_id.0,
            previous_owner: plan.update.previous_owner,
            report,
        })
    }

    pub async fn assign_from_public_pool(
        &self,
        customer_id: &str,
        target_type: &str,
        target_id: &str,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> Result<PoolExitOutcome, ApplicationError> {
        if !operator.can_assign_from_pool() {
            return Err(ApplicationError::Forbidden(
                "operator cannot assign public pool customers".to_string(),
            ));
        }

        let customer_id = CustomerId::parse(customer_id)?;
        let target_type = PoolTargetType::parse(target_type)?;
        let target_id = parse_object_id("target id", target_id)?;

        let customer = self.find_customer(&customer_id).await?;
        if !customer.is_in_public_pool {
            return Err(DomainError::NotInPublicPool.into());
        }

        let target = self.resolve_target(target_type, &target_id).await?;
        let plan = plan_pool_exit(&customer, target, operator, now)?;

        let matched = self
            .repos
            .customers
            .assign_from_public_pool(&customer_id, &plan.update)
            .await
            .map_err(persistence)?;
        if !matched {
            return Err(DomainError::NotInPublicPool.into());
        }

        let target = match &plan.update.target {
            PoolTarget::Sales(party) | PoolTarget::Agent(party) => party.clone(),
        };
        info!(
            event_name = "lifecycle.pool.redistributed",
            customer_id = %customer_id,
            operator_id = %operator.id,
            target_type = target_type.as_str(),
            target_id = %target.id,
            "public pool customer redistributed"
        );

        let mut report = PostCommitReport::default();
        report.record(
            PostCommitStep::AssignmentHistory,
            self.audit.record_assignment(Some(plan.history), now).await,
        );
        report.record(
            PostCommitStep::ProgressHistory,
            self.audit.record_progress(Some(plan.progress_history), now).await,
        );

        Ok(PoolExitOutcome {
            customer_id: customer_id.0,
            target_type: target_type.as_str(),
            target,
            report,
        })
    }

    pub async fn list_public_pool(
        &self,
        filter: &PublicPoolFilter,
    ) -> Result<Vec<Customer>, ApplicationError> {
        self.repos.customers.list_public_pool(filter).await.map_err(persistence)
    }

    pub async fn assignable_targets(
        &self,
        operator: &Operator,
    ) -> Result<AssignableTargets, ApplicationError> {
        if !operator.can_assign_from_pool() {
            return Err(ApplicationError::Forbidden(
                "operator cannot assign public pool customers".to_string(),
            ));
        }
        self.repos.directory.list_assignable().await.map_err(persistence)
    }

    async fn find_customer(&self, id: &CustomerId) -> Result<Customer, ApplicationError> {
        self.repos
            .customers
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("customer", id.as_str()))
    }

    async fn resolve_target(
        &self,
        target_type: PoolTargetType,
        target_id: &str,
    ) -> Result<PoolTarget, ApplicationError> {
        match target_type {
            PoolTargetType::FactorySales => {
                let user = self
                    .repos
                    .directory
                    .find_user(target_id)
                    .await
                    .map_err(persistence)?
                    .filter(|user| user.is_factory_sales())
                    .ok_or_else(|| ApplicationError::not_found("sales user", target_id))?;
                if !user.is_assignable() {
                    return Err(DomainError::InvalidPoolTarget(format!(
                        "sales user `{target_id}` is not approved"
                    ))
                    .into());
                }
                Ok(PoolTarget::Sales(user.party()))
            }
            PoolTargetType::Agent => {
                let agent = self
                    .repos
                    .directory
                    .find_agent(target_id)
                    .await
                    .map_err(persistence)?
                    .ok_or_else(|| ApplicationError::not_found("agent", target_id))?;
                if !agent.is_assignable() {
                    return Err(DomainError::InvalidPoolTarget(format!(
                        "agent `{target_id}` is not approved"
                    ))
                    .into());
                }
                Ok(PoolTarget::Agent(agent.party()))
            }
        }
    }
}

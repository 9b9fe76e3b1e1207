use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use leadflow_core::domain::auto_transfer::{
    AutoTransferPolicy, SystemConfig, AUTO_TRANSFER_CONFIG_KEY, AUTO_TRANSFER_CONFIG_TYPE,
};
use leadflow_core::domain::operator::Operator;
use leadflow_core::errors::ApplicationError;

use super::{persistence, Repositories};

/// Reads and replaces the stored `customer_auto_transfer` document.
#[derive(Clone)]
pub struct AutoTransferPolicyService {
    repos: Repositories,
}

impl AutoTransferPolicyService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn current(&self, operator: &Operator) -> Result<SystemConfig, ApplicationError> {
        require_policy_admin(operator)?;
        self.repos
            .system_configs
            .find_enabled(AUTO_TRANSFER_CONFIG_TYPE)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("system config", AUTO_TRANSFER_CONFIG_TYPE))
    }

    /// Validates `value` and stores the normalized policy as the enabled entry.
    pub async fn replace(
        &self,
        value: &Value,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> Result<SystemConfig, ApplicationError> {
        require_policy_admin(operator)?;
        let policy = AutoTransferPolicy::from_value(value)?;

        let config = SystemConfig {
            id: Uuid::new_v4().to_string(),
            config_type: AUTO_TRANSFER_CONFIG_TYPE.to_string(),
            config_key: AUTO_TRANSFER_CONFIG_KEY.to_string(),
            config_value: policy.to_value(),
            is_enabled: true,
            updated_at: now,
        };
        self.repos.system_configs.save(config.clone()).await.map_err(persistence)?;

        info!(
            event_name = "config.auto_transfer.updated",
            operator_id = %operator.id,
            target_sales_id = %policy.target_sales_id,
            days_without_progress = policy.days_without_progress,
            "auto-transfer policy replaced"
        );
        Ok(config)
    }
}

fn require_policy_admin(operator: &Operator) -> Result<(), ApplicationError> {
    if operator.can_manage_policies() {
        Ok(())
    } else {
        Err(ApplicationError::Forbidden(
            "only super admins can manage the auto-transfer policy".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use leadflow_core::domain::operator::{Operator, Role};
    use leadflow_core::errors::{ApplicationError, DomainError};

    use super::AutoTransferPolicyService;
    use crate::services::Repositories;

    #[tokio::test]
    async fn replace_normalizes_aliases_and_current_reads_it_back() {
        let service = AutoTransferPolicyService::new(Repositories::in_memory());
        let admin = Operator::new("admin-1", "Ada", Role::SuperAdmin);

        assert!(matches!(
            service.current(&admin).await,
            Err(ApplicationError::NotFound { .. })
        ));

        service
            .replace(
                &json!({
                    "targetOwnerId": "s-9",
                    "targetOwnerName": "Nina",
                    "daysWithoutProgress": 14.0
                }),
                &admin,
                Utc::now(),
            )
            .await
            .expect("replace");

        let stored = service.current(&admin).await.expect("current");
        assert!(stored.is_enabled);
        assert_eq!(
            stored.config_value,
            json!({ "targetSalesId": "s-9", "targetSalesName": "Nina", "daysWithoutProgress": 14 })
        );
    }

    #[tokio::test]
    async fn non_admins_and_invalid_policies_are_rejected() {
        let service = AutoTransferPolicyService::new(Repositories::in_memory());
        let sales = Operator::new("s-1", "Sam", Role::FactorySales);
        let admin = Operator::new("admin-1", "Ada", Role::SuperAdmin);

        assert!(matches!(service.current(&sales).await, Err(ApplicationError::Forbidden(_))));
        assert!(matches!(
            service
                .replace(&json!({ "targetSalesId": "s-9" }), &admin, Utc::now())
                .await,
            Err(ApplicationError::Domain(DomainError::InvalidTransferPolicy(_)))
        ));
    }
}

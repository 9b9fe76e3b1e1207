use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::errors::DomainError;

pub const AUTO_TRANSFER_CONFIG_TYPE: &str = "customer_auto_transfer";
pub const AUTO_TRANSFER_CONFIG_KEY: &str = "default";

/// Fallback owner and SLA read from the config store at the start of every run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoTransferPolicy {
    pub target_sales_id: String,
    pub target_sales_name: String,
    pub days_without_progress: u32,
}

impl AutoTransferPolicy {
    /// Parses the stored `configValue` document. The target id is also accepted
    /// under `targetOwnerId`/`targetOwnerName`, and the day count may have been
    /// written as an integer or a float.
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let object = value.as_object().ok_or_else(|| {
            DomainError::InvalidTransferPolicy("configValue must be an object".to_string())
        })?;

        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| object.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .find(|value| !value.is_empty())
                .map(str::to_string)
        };

        let target_sales_id = text(&["targetSalesId", "targetOwnerId"]).ok_or_else(|| {
            DomainError::InvalidTransferPolicy("targetSalesId is required".to_string())
        })?;
        let target_sales_name = text(&["targetSalesName", "targetOwnerName"]).ok_or_else(|| {
            DomainError::InvalidTransferPolicy("targetSalesName is required".to_string())
        })?;

        let days = object.get("daysWithoutProgress").ok_or_else(|| {
            DomainError::InvalidTransferPolicy("daysWithoutProgress is required".to_string())
        })?;
        let days = days
            .as_i64()
            .or_else(|| days.as_f64().map(|value| value.trunc() as i64))
            .ok_or_else(|| {
                DomainError::InvalidTransferPolicy(
                    "daysWithoutProgress must be a number".to_string(),
                )
            })?;
        if days <= 0 {
            return Err(DomainError::InvalidTransferPolicy(
                "daysWithoutProgress must be greater than zero".to_string(),
            ));
        }
        let days_without_progress = u32::try_from(days).map_err(|_| {
            DomainError::InvalidTransferPolicy("daysWithoutProgress is too large".to_string())
        })?;

        Ok(Self { target_sales_id, target_sales_name, days_without_progress })
    }

    pub fn to_value(&self) -> Value {
        json!({
            "targetSalesId": self.target_sales_id,
            "targetSalesName": self.target_sales_name,
            "daysWithoutProgress": self.days_without_progress,
        })
    }
}

/// Generic key/value configuration document.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemConfig {
    pub id: String,
    pub config_type: String,
    pub config_key: String,
    pub config_value: Value,
    pub is_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::AutoTransferPolicy;
    use crate::errors::DomainError;

    #[test]
    fn parses_integer_and_float_day_counts() {
        let from_int = AutoTransferPolicy::from_value(&json!({
            "targetSalesId": "s-9",
            "targetSalesName": "Nina",
            "daysWithoutProgress": 30
        }))
        .expect("integer days");
        let from_float = AutoTransferPolicy::from_value(&json!({
            "targetSalesId": "s-9",
            "targetSalesName": "Nina",
            "daysWithoutProgress": 30.0
        }))
        .expect("float days");

        assert_eq!(from_int.days_without_progress, 30);
        assert_eq!(from_int, from_float);
    }

    #[test]
    fn accepts_owner_aliases() {
        let policy = AutoTransferPolicy::from_value(&json!({
            "targetOwnerId": "s-9",
            "targetOwnerName": "Nina",
            "daysWithoutProgress": 7
        }))
        .expect("aliases");

        assert_eq!(policy.target_sales_id, "s-9");
        assert_eq!(policy.target_sales_name, "Nina");
    }

    #[test]
    fn rejects_missing_target_and_non_positive_days() {
        let missing = AutoTransferPolicy::from_value(&json!({
            "targetSalesName": "Nina",
            "daysWithoutProgress": 7
        }));
        assert!(matches!(
            missing,
            Err(DomainError::InvalidTransferPolicy(ref message))
                if message.contains("targetSalesId")
        ));

        let zero = AutoTransferPolicy::from_value(&json!({
            "targetSalesId": "s-9",
            "targetSalesName": "Nina",
            "daysWithoutProgress": 0
        }));
        assert!(zero.is_err());

        let text = AutoTransferPolicy::from_value(&json!({
            "targetSalesId": "s-9",
            "targetSalesName": "Nina",
            "daysWithoutProgress": "30"
        }));
        assert!(text.is_err());
    }

    #[test]
    fn round_trips_through_the_stored_document() {
        let policy = AutoTransferPolicy {
            target_sales_id: "s-9".to_string(),
            target_sales_name: "Nina".to_string(),
            days_without_progress: 14,
        };

        assert_eq!(AutoTransferPolicy::from_value(&policy.to_value()), Ok(policy));
    }
}

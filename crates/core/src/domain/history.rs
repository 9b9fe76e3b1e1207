//! Append-only ledger records for ownership and progress transitions.
//!
//! `New*` values are what callers hand to the logger; the logger validates them,
//! fills in identifiers and timestamps, and persists the finished record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::{CustomerProgress, PartyRef};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentOperation {
    #[serde(rename = "分配")]
    Assign,
    #[serde(rename = "认领")]
    Claim,
    #[serde(rename = "移入公海池")]
    MoveToPublicPool,
}

impl AssignmentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assign => "分配",
            Self::Claim => "认领",
            Self::MoveToPublicPool => "移入公海池",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "分配" | "assign" => Some(Self::Assign),
            "认领" | "claim" => Some(Self::Claim),
            "移入公海池" | "move_to_public_pool" => Some(Self::MoveToPublicPool),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryId(pub String);

impl HistoryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentHistory {
    pub id: HistoryId,
    pub customer_id: String,
    pub customer_name: String,
    pub from_sales: Option<PartyRef>,
    pub from_agent: Option<PartyRef>,
    pub to_sales: Option<PartyRef>,
    pub to_agent: Option<PartyRef>,
    pub operator: PartyRef,
    pub operation: AssignmentOperation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAssignmentHistory {
    pub customer_id: String,
    pub customer_name: String,
    pub from_sales: Option<PartyRef>,
    pub from_agent: Option<PartyRef>,
    pub to_sales: Option<PartyRef>,
    pub to_agent: Option<PartyRef>,
    pub operator: PartyRef,
    pub operation: AssignmentOperation,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewAssignmentHistory {
    pub fn validate(&self) -> Result<(), DomainError> {
        require("customerId", &self.customer_id)?;
        require("customerName", &self.customer_name)?;
        require("operatorId", &self.operator.id)?;
        require("operatorName", &self.operator.name)
    }

    pub fn finish(self, now: DateTime<Utc>) -> AssignmentHistory {
        let created_at = self.created_at.unwrap_or(now);
        AssignmentHistory {
            id: HistoryId::generate(),
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            from_sales: self.from_sales,
            from_agent: self.from_agent,
            to_sales: self.to_sales,
            to_agent: self.to_agent,
            operator: self.operator,
            operation: self.operation,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressHistory {
    pub id: HistoryId,
    pub customer_id: String,
    pub customer_name: String,
    pub from_progress: CustomerProgress,
    pub to_progress: CustomerProgress,
    pub operator: PartyRef,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProgressHistory {
    pub customer_id: String,
    pub customer_name: String,
    pub from_progress: CustomerProgress,
    pub to_progress: CustomerProgress,
    pub operator: PartyRef,
    pub remark: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NewProgressHistory {
    pub fn validate(&self) -> Result<(), DomainError> {
        require("customerId", &self.customer_id)?;
        require("customerName", &self.customer_name)?;
        require("operatorId", &self.operator.id)?;
        require("operatorName", &self.operator.name)
    }

    pub fn finish(self, now: DateTime<Utc>) -> ProgressHistory {
        let created_at = self.created_at.unwrap_or(now);
        ProgressHistory {
            id: HistoryId::generate(),
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            from_progress: self.from_progress,
            to_progress: self.to_progress,
            operator: self.operator,
            remark: self.remark,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssignmentHistoryFilter {
    pub customer_id: Option<String>,
    pub operation: Option<AssignmentOperation>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl AssignmentHistoryFilter {
    pub fn matches(&self, entry: &AssignmentHistory) -> bool {
        self.customer_id.as_deref().map_or(true, |id| entry.customer_id == id)
            && self.operation.map_or(true, |operation| entry.operation == operation)
            && within(entry.created_at, self.start, self.end)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressHistoryFilter {
    pub customer_id: Option<String>,
    /// Matches either side of the transition.
    pub progress: Option<CustomerProgress>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ProgressHistoryFilter {
    pub fn matches(&self, entry: &ProgressHistory) -> bool {
        self.customer_id.as_deref().map_or(true, |id| entry.customer_id == id)
            && self.progress.map_or(true, |progress| {
                entry.from_progress == progress || entry.to_progress == progress
            })
            && within(entry.created_at, self.start, self.end)
    }
}

fn within(at: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.map_or(true, |start| at >= start) && end.map_or(true, |end| at <= end)
}

fn require(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::MissingField(field));
    }
    Ok(())
}

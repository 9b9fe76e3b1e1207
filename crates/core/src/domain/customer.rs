use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::operator::Role;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        parse_object_id("customer id", raw).map(Self)
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a UUID-shaped identifier, rejecting anything malformed before a lookup happens.
pub fn parse_object_id(field: &'static str, raw: &str) -> Result<String, DomainError> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| DomainError::InvalidIdentifier { field, value: raw.to_string() })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerProgress {
    InitialContact,
    Normal,
    PublicPool,
    Disabled,
    SampleEvaluation,
}

impl CustomerProgress {
    pub const ALL: [Self; 5] = [
        Self::InitialContact,
        Self::Normal,
        Self::PublicPool,
        Self::Disabled,
        Self::SampleEvaluation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialContact => "INITIAL_CONTACT",
            Self::Normal => "NORMAL",
            Self::PublicPool => "PUBLIC_POOL",
            Self::Disabled => "DISABLED",
            Self::SampleEvaluation => "SAMPLE_EVALUATION",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INITIAL_CONTACT" => Some(Self::InitialContact),
            "NORMAL" => Some(Self::Normal),
            "PUBLIC_POOL" => Some(Self::PublicPool),
            "DISABLED" => Some(Self::Disabled),
            "SAMPLE_EVALUATION" => Some(Self::SampleEvaluation),
            _ => None,
        }
    }
}

impl std::fmt::Display for CustomerProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display labels for each progress state. Labels double as accepted input aliases,
/// so deployments that speak a different vocabulary keep working without touching
/// stored values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressVocabulary {
    pub initial_contact: String,
    pub normal: String,
    pub public_pool: String,
    pub disabled: String,
    pub sample_evaluation: String,
}

impl Default for ProgressVocabulary {
    fn default() -> Self {
        Self {
            initial_contact: "初步接触".to_string(),
            normal: "正常推进".to_string(),
            public_pool: "进入公海".to_string(),
            disabled: "禁用".to_string(),
            sample_evaluation: "样板评估".to_string(),
        }
    }
}

impl ProgressVocabulary {
    pub fn label(&self, progress: CustomerProgress) -> &str {
        match progress {
            CustomerProgress::InitialContact => &self.initial_contact,
            CustomerProgress::Normal => &self.normal,
            CustomerProgress::PublicPool => &self.public_pool,
            CustomerProgress::Disabled => &self.disabled,
            CustomerProgress::SampleEvaluation => &self.sample_evaluation,
        }
    }

    /// Accepts either a canonical code or a configured label.
    pub fn resolve(&self, input: &str) -> Result<CustomerProgress, DomainError> {
        let trimmed = input.trim();
        if let Some(progress) = CustomerProgress::parse(trimmed) {
            return Ok(progress);
        }

        CustomerProgress::ALL
            .into_iter()
            .find(|progress| self.label(*progress) == trimmed)
            .ok_or_else(|| DomainError::UnknownProgress(input.to_string()))
    }

    pub fn labels(&self) -> [(CustomerProgress, &str); 5] {
        CustomerProgress::ALL.map(|progress| (progress, self.label(progress)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: String,
    pub name: String,
}

impl PartyRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub id: String,
    pub name: String,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub nature: String,
    pub importance: String,
    pub application_field: String,
    pub address: String,
    pub contact_person: String,
    pub contact_phone: String,
    pub progress: CustomerProgress,
    /// Creator of the record. Never rewritten by lifecycle operations.
    pub owner: Option<OwnerRef>,
    pub related_sales: Option<PartyRef>,
    pub related_agent: Option<PartyRef>,
    pub is_in_public_pool: bool,
    pub previous_owner: Option<OwnerRef>,
    pub initial_contact_at: Option<DateTime<Utc>>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn related_sales_id(&self) -> &str {
        self.related_sales.as_ref().map(|sales| sales.id.as_str()).unwrap_or("")
    }

    pub fn related_agent_id(&self) -> &str {
        self.related_agent.as_ref().map(|agent| agent.id.as_str()).unwrap_or("")
    }

    pub fn owner_id(&self) -> &str {
        self.owner.as_ref().map(|owner| owner.id.as_str()).unwrap_or("")
    }

    /// Pooled customers never carry a sales or agent owner.
    pub fn pool_invariant_holds(&self) -> bool {
        !self.is_in_public_pool || (self.related_sales.is_none() && self.related_agent.is_none())
    }

    /// Reference point for the neglect SLA.
    pub fn sla_reference_time(&self) -> DateTime<Utc> {
        self.initial_contact_at.unwrap_or(self.created_at)
    }

    /// When the customer entered the pool, as far as the record can tell.
    pub fn entered_pool_at(&self) -> DateTime<Utc> {
        self.last_update_time.unwrap_or(self.updated_at)
    }
}

/// Listing filter for pooled customers. Text filters match case-insensitively
/// as substrings; `nature` and `importance` match exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublicPoolFilter {
    pub keyword: Option<String>,
    pub nature: Option<String>,
    pub importance: Option<String>,
    pub application_field: Option<String>,
}

impl PublicPoolFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        customer.is_in_public_pool
            && customer.progress == CustomerProgress::PublicPool
            && contains(&customer.name, self.keyword.as_deref())
            && contains(&customer.application_field, self.application_field.as_deref())
            && self.nature.as_deref().map_or(true, |nature| customer.nature == nature)
            && self.importance.as_deref().map_or(true, |level| customer.importance == level)
    }
}

fn contains(haystack: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
}

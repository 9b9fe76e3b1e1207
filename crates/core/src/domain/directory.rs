use serde::{Deserialize, Serialize};

use crate::domain::customer::PartyRef;
use crate::domain::operator::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesUser {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub status: AccountStatus,
}

impl SalesUser {
    pub fn is_factory_sales(&self) -> bool {
        self.role == Role::FactorySales
    }

    pub fn is_assignable(&self) -> bool {
        self.is_factory_sales() && self.status == AccountStatus::Approved
    }

    pub fn party(&self) -> PartyRef {
        PartyRef::new(self.id.clone(), self.username.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAccount {
    pub id: String,
    pub company_name: String,
    pub contact_person: String,
    pub status: AccountStatus,
}

impl AgentAccount {
    pub fn is_assignable(&self) -> bool {
        self.status == AccountStatus::Approved
    }

    pub fn party(&self) -> PartyRef {
        PartyRef::new(self.id.clone(), self.company_name.clone())
    }
}

/// Approved owners a pooled customer can be handed to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignableTargets {
    pub sales_users: Vec<SalesUser>,
    pub agents: Vec<AgentAccount>,
}

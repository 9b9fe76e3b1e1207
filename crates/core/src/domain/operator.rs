use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::customer::Customer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    FactorySales,
    Agent,
    InventoryManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::FactorySales => "FACTORY_SALES",
            Self::Agent => "AGENT",
            Self::InventoryManager => "INVENTORY_MANAGER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Some(Self::SuperAdmin),
            "FACTORY_SALES" => Some(Self::FactorySales),
            "AGENT" => Some(Self::Agent),
            "INVENTORY_MANAGER" => Some(Self::InventoryManager),
            _ => None,
        }
    }
}

/// The authenticated identity performing a lifecycle operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Operator {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), name: name.into(), role }
    }

    /// Synthetic super-admin identity used by unattended jobs.
    pub fn system(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::SuperAdmin)
    }

    pub fn can_assign(&self) -> bool {
        matches!(self.role, Role::SuperAdmin | Role::FactorySales | Role::Agent)
    }

    pub fn can_change_progress(&self) -> bool {
        matches!(self.role, Role::SuperAdmin | Role::FactorySales | Role::Agent)
    }

    pub fn can_assign_from_pool(&self) -> bool {
        matches!(self.role, Role::SuperAdmin | Role::FactorySales | Role::Agent)
    }

    pub fn can_manage_policies(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Super admins reclaim anything. Sales reps reclaim what they created or own,
    /// agents likewise through the agent slot.
    pub fn can_reclaim(&self, customer: &Customer) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::FactorySales => {
                self.is(customer.owner_id()) || self.is(customer.related_sales_id())
            }
            Role::Agent => self.is(customer.owner_id()) || self.is(customer.related_agent_id()),
            Role::InventoryManager => false,
        }
    }

    /// True when the operator is handing the customer to themself.
    pub fn claims(&self, sales_id: &str, agent_id: &str) -> bool {
        match self.role {
            Role::FactorySales => self.is(sales_id),
            Role::Agent => self.is(agent_id),
            Role::SuperAdmin | Role::InventoryManager => false,
        }
    }

    fn is(&self, id: &str) -> bool {
        !id.is_empty() && self.id == id
    }
}

/// Hex-encoded SHA-256 digest under which bearer tokens are stored.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{token_digest, Operator, Role};
    use crate::domain::customer::{Customer, CustomerId, CustomerProgress, OwnerRef, PartyRef};

    fn customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: CustomerId::generate(),
            name: "Acme".to_string(),
            nature: String::new(),
            importance: String::new(),
            application_field: String::new(),
            address: String::new(),
            contact_person: String::new(),
            contact_phone: String::new(),
            progress: CustomerProgress::InitialContact,
            owner: Some(OwnerRef {
                id: "creator".to_string(),
                name: "Creator".to_string(),
                role: Role::FactorySales,
            }),
            related_sales: Some(PartyRef::new("sales-1", "Sam")),
            related_agent: Some(PartyRef::new("agent-1", "Agency")),
            is_in_public_pool: false,
            previous_owner: None,
            initial_contact_at: None,
            last_update_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn reclaim_rules_follow_role_and_ownership() {
        let customer = customer();

        assert!(Operator::new("anyone", "Root", Role::SuperAdmin).can_reclaim(&customer));
        assert!(Operator::new("sales-1", "Sam", Role::FactorySales).can_reclaim(&customer));
        assert!(Operator::new("creator", "Creator", Role::FactorySales).can_reclaim(&customer));
        assert!(Operator::new("agent-1", "Agency", Role::Agent).can_reclaim(&customer));
        assert!(!Operator::new("sales-2", "Other", Role::FactorySales).can_reclaim(&customer));
        assert!(!Operator::new("sales-1", "Sam", Role::Agent).can_reclaim(&customer));
        assert!(!Operator::new("sales-1", "Inv", Role::InventoryManager).can_reclaim(&customer));
    }

    #[test]
    fn claim_requires_matching_role_and_identity() {
        let sales = Operator::new("s-1", "Sam", Role::FactorySales);
        let agent = Operator::new("a-1", "Agency", Role::Agent);
        let admin = Operator::new("s-1", "Root", Role::SuperAdmin);

        assert!(sales.claims("s-1", ""));
        assert!(!sales.claims("s-2", "s-1"));
        assert!(agent.claims("s-9", "a-1"));
        assert!(!agent.claims("a-1", ""));
        assert!(!admin.claims("s-1", ""));
    }

    #[test]
    fn inventory_managers_hold_no_lifecycle_capabilities() {
        let operator = Operator::new("i-1", "Ivy", Role::InventoryManager);

        assert!(!operator.can_assign());
        assert!(!operator.can_change_progress());
        assert!(!operator.can_assign_from_pool());
        assert!(!operator.can_manage_policies());
    }

    #[test]
    fn token_digest_is_stable_hex() {
        let digest = token_digest("secret-token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest(" secret-token "));
        assert_ne!(digest, token_digest("other-token"));
    }
}

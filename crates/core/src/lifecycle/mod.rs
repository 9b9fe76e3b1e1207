pub mod assignment;
pub mod post_commit;
pub mod progress;
pub mod reclamation;
pub mod transfer;

pub use assignment::{plan_assignment, AssignmentPlan, AssignmentUpdate};
pub use post_commit::{FailurePolicy, PostCommitReport, PostCommitStep, StepOutcome};
pub use progress::{
    plan_progress_change, progress_after_assignment, supersedes_namesakes, ProgressChange,
};
pub use reclamation::{
    plan_pool_entry, plan_pool_exit, PoolEntryPlan, PoolEntryUpdate, PoolExitPlan,
    PoolExitUpdate, PoolTarget, PoolTargetType,
};
pub use transfer::{elapsed_days, transfer_decision, TransferDecision};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::domain::customer::{Customer, CustomerId, CustomerProgress, OwnerRef, PartyRef};
    use crate::domain::operator::Role;

    pub fn customer(progress: CustomerProgress) -> Customer {
        let now = Utc::now();
        Customer {
            id: CustomerId::generate(),
            name: "Acme Foods".to_string(),
            nature: "manufacturer".to_string(),
            importance: "A".to_string(),
            application_field: "packaging".to_string(),
            address: "1 Harbor Rd".to_string(),
            contact_person: "Lee".to_string(),
            contact_phone: "555-0100".to_string(),
            progress,
            owner: Some(OwnerRef {
                id: "creator".to_string(),
                name: "Creator".to_string(),
                role: Role::FactorySales,
            }),
            related_sales: Some(PartyRef::new("s-1", "Sam")),
            related_agent: None,
            is_in_public_pool: false,
            previous_owner: None,
            initial_contact_at: Some(now),
            last_update_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pooled() -> Customer {
        let mut customer = customer(CustomerProgress::PublicPool);
        customer.related_sales = None;
        customer.is_in_public_pool = true;
        customer
    }
}

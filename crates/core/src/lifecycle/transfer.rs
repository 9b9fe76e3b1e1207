use chrono::{DateTime, Utc};

use crate::domain::auto_transfer::AutoTransferPolicy;
use crate::domain::customer::{Customer, CustomerProgress};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferDecision {
    Transfer { elapsed_days: i64 },
    NotInitialContact,
    NotDue { elapsed_days: i64 },
    AlreadyOwnedByTarget,
}

/// Whole days elapsed, counted in 24-hour blocks.
pub fn elapsed_days(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_hours() / 24
}

pub fn transfer_decision(
    customer: &Customer,
    policy: &AutoTransferPolicy,
    now: DateTime<Utc>,
) -> TransferDecision {
    if customer.progress != CustomerProgress::InitialContact {
        return TransferDecision::NotInitialContact;
    }

    let elapsed_days = elapsed_days(customer.sla_reference_time(), now);
    if elapsed_days < i64::from(policy.days_without_progress) {
        return TransferDecision::NotDue { elapsed_days };
    }

    if customer.related_agent.is_none() && customer.related_sales_id() == policy.target_sales_id {
        return TransferDecision::AlreadyOwnedByTarget;
    }

    TransferDecision::Transfer { elapsed_days }
}

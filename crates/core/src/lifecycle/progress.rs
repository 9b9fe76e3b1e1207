//! Progress state machine.
//!
//! ```text
//! INITIAL_CONTACT <--assign--> NORMAL  (decided by visible work items)
//!        |                       |
//!        +-----> PUBLIC_POOL <---+      entry: reclamation only
//!                     |
//!                     +--> SAMPLE_EVALUATION   exit: redistribution only
//! ```
//!
//! `DISABLED` is reached through namesake propagation or an explicit change.

use crate::domain::customer::{Customer, CustomerProgress};
use crate::errors::DomainError;

/// Progress a customer lands in after an assignment.
pub fn progress_after_assignment(has_visible_work_items: bool) -> CustomerProgress {
    if has_visible_work_items {
        CustomerProgress::Normal
    } else {
        CustomerProgress::InitialContact
    }
}

/// Whether moving a customer into `progress` requires superseding its namesakes.
pub fn supersedes_namesakes(progress: CustomerProgress) -> bool {
    progress == CustomerProgress::Normal
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressChange {
    Unchanged(CustomerProgress),
    Changed { from: CustomerProgress, to: CustomerProgress },
}

impl ProgressChange {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    pub fn before(&self) -> CustomerProgress {
        match self {
            Self::Unchanged(progress) => *progress,
            Self::Changed { from, .. } => *from,
        }
    }

    pub fn after(&self) -> CustomerProgress {
        match self {
            Self::Unchanged(progress) => *progress,
            Self::Changed { to, .. } => *to,
        }
    }
}

/// Plans an operator-driven progress change.
///
/// Pool membership has its own entry and exit operations, so a pooled customer
/// cannot be moved here and `PUBLIC_POOL` is never a valid explicit target. A
/// request for the current value is a no-op.
pub fn plan_progress_change(
    customer: &Customer,
    target: CustomerProgress,
) -> Result<ProgressChange, DomainError> {
    if customer.progress == target {
        return Ok(ProgressChange::Unchanged(target));
    }

    if customer.is_in_public_pool || target == CustomerProgress::PublicPool {
        return Err(DomainError::ProtectedProgress {
            from: customer.progress.as_str().to_string(),
            to: target.as_str().to_string(),
        });
    }

    Ok(ProgressChange::Changed { from: customer.progress, to: target })
}

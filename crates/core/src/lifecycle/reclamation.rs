//! Public pool entry and exit planning.

use chrono::{DateTime, Utc};

use crate::domain::customer::{Customer, CustomerProgress, OwnerRef, PartyRef};
use crate::domain::history::{AssignmentOperation, NewAssignmentHistory, NewProgressHistory};
use crate::domain::operator::{Operator, Role};
use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolEntryUpdate {
    pub previous_owner: Option<OwnerRef>,
    pub clear_contact: bool,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolEntryPlan {
    pub update: PoolEntryUpdate,
    pub history: NewAssignmentHistory,
    pub progress_history: Option<NewProgressHistory>,
}

/// Breadcrumb left on pool entry: the current sales owner, else the current
/// agent, else the creator.
pub fn pool_breadcrumb(customer: &Customer) -> Option<OwnerRef> {
    if let Some(sales) = &customer.related_sales {
        return Some(OwnerRef {
            id: sales.id.clone(),
            name: sales.name.clone(),
            role: Role::FactorySales,
        });
    }
    if let Some(agent) = &customer.related_agent {
        return Some(OwnerRef {
            id: agent.id.clone(),
            name: agent.name.clone(),
            role: Role::Agent,
        });
    }
    customer.owner.clone()
}

pub fn plan_pool_entry(
    customer: &Customer,
    operator: &Operator,
    clear_contact: bool,
    now: DateTime<Utc>,
) -> Result<PoolEntryPlan, ApplicationError> {
    if !operator.can_reclaim(customer) {
        return Err(ApplicationError::Forbidden(
            "only the creator, the current owner, or a super admin can release this customer"
                .to_string(),
        ));
    }
    if customer.is_in_public_pool {
        return Err(DomainError::AlreadyInPublicPool.into());
    }

    let operator_ref = PartyRef::new(operator.id.clone(), operator.name.clone());

    let history = NewAssignmentHistory {
        customer_id: customer.id.0.clone(),
        customer_name: customer.name.clone(),
        from_sales: customer.related_sales.clone(),
        from_agent: customer.related_agent.clone(),
        to_sales: None,
        to_agent: None,
        operator: operator_ref.clone(),
        operation: AssignmentOperation::MoveToPublicPool,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let progress_history = (customer.progress != CustomerProgress::PublicPool).then(|| {
        NewProgressHistory {
            customer_id: customer.id.0.clone(),
            customer_name: customer.name.clone(),
            from_progress: customer.progress,
            to_progress: CustomerProgress::PublicPool,
            operator: operator_ref,
            remark: AssignmentOperation::MoveToPublicPool.as_str().to_string(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    });

    Ok(PoolEntryPlan {
        update: PoolEntryUpdate {
            previous_owner: pool_breadcrumb(customer),
            clear_contact,
            at: now,
        },
        history,
        progress_history,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolTargetType {
    FactorySales,
    Agent,
}

impl PoolTargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FactorySales => "FACTORY_SALES",
            Self::Agent => "AGENT",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FACTORY_SALES" => Ok(Self::FactorySales),
            "AGENT" => Ok(Self::Agent),
            _ => Err(DomainError::InvalidPoolTarget(value.to_string())),
        }
    }
}

/// Owner slot filled on redistribution. The other slot is cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolTarget {
    Sales(PartyRef),
    Agent(PartyRef),
}

impl PoolTarget {
    pub fn sales(&self) -> Option<&PartyRef> {
        match self {
            Self::Sales(sales) => Some(sales),
            Self::Agent(_) => None,
        }
    }

    pub fn agent(&self) -> Option<&PartyRef> {
        match self {
            Self::Agent(agent) => Some(agent),
            Self::Sales(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolExitUpdate {
    pub target: PoolTarget,
    pub progress: CustomerProgress,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolExitPlan {
    pub update: PoolExitUpdate,
    pub history: NewAssignmentHistory,
    pub progress_history: NewProgressHistory,
}

pub fn plan_pool_exit(
    customer: &Customer,
    target: PoolTarget,
    operator: &Operator,
    now: DateTime<Utc>,
) -> Result<PoolExitPlan, ApplicationError> {
    if !operator.can_assign_from_pool() {
        return Err(ApplicationError::Forbidden(
            "operator cannot assign public pool customers".to_string(),
        ));
    }
    if !customer.is_in_public_pool {
        return Err(DomainError::NotInPublicPool.into());
    }

    let operator_ref = PartyRef::new(operator.id.clone(), operator.name.clone());

    let history = NewAssignmentHistory {
        customer_id: customer.id.0.clone(),
        customer_name: customer.name.clone(),
        from_sales: None,
        from_agent: None,
        to_sales: target.sales().cloned(),
        to_agent: target.agent().cloned(),
        operator: operator_ref.clone(),
        operation: AssignmentOperation::Assign,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let progress_history = NewProgressHistory {
        customer_id: customer.id.0.clone(),
        customer_name: customer.name.clone(),
        from_progress: customer.progress,
        to_progress: CustomerProgress::SampleEvaluation,
        operator: operator_ref,
        remark: AssignmentOperation::Assign.as_str().to_string(),
        created_at: Some(now),
        updated_at: Some(now),
    };

    Ok(PoolExitPlan {
        update: PoolExitUpdate { target, progress: CustomerProgress::SampleEvaluation, at: now },
        history,
        progress_history,
    })
}

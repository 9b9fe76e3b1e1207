use chrono::{DateTime, Utc};

use crate::domain::customer::{Customer, CustomerProgress, PartyRef};
use crate::domain::history::{AssignmentOperation, NewAssignmentHistory, NewProgressHistory};
use crate::domain::operator::Operator;
use crate::lifecycle::progress::{progress_after_assignment, supersedes_namesakes, ProgressChange};

/// Single-record write produced by an assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentUpdate {
    pub sales: PartyRef,
    pub agent: Option<PartyRef>,
    pub progress: CustomerProgress,
    /// Set when the assignment lands in `INITIAL_CONTACT`, restarting the neglect SLA.
    pub initial_contact_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub update: AssignmentUpdate,
    pub progress: ProgressChange,
    pub operation: AssignmentOperation,
    pub disable_namesakes: bool,
    /// Present only when the sales or agent identity actually changes.
    pub history: Option<NewAssignmentHistory>,
    pub progress_history: Option<NewProgressHistory>,
}

impl AssignmentPlan {
    pub fn owner_changed(&self) -> bool {
        self.history.is_some()
    }
}

/// Decides everything an assignment writes, given already-resolved owners.
pub fn plan_assignment(
    customer: &Customer,
    sales: PartyRef,
    agent: Option<PartyRef>,
    has_visible_work_items: bool,
    operator: &Operator,
    now: DateTime<Utc>,
) -> AssignmentPlan {
    let agent_id = agent.as_ref().map(|agent| agent.id.as_str()).unwrap_or("");
    let operation = if operator.claims(&sales.id, agent_id) {
        AssignmentOperation::Claim
    } else {
        AssignmentOperation::Assign
    };

    let owner_changed =
        customer.related_sales_id() != sales.id || customer.related_agent_id() != agent_id;

    let target = progress_after_assignment(has_visible_work_items);
    let progress = if customer.progress == target {
        ProgressChange::Unchanged(target)
    } else {
        ProgressChange::Changed { from: customer.progress, to: target }
    };

    let operator_ref = PartyRef::new(operator.id.clone(), operator.name.clone());

    let history = owner_changed.then(|| NewAssignmentHistory {
        customer_id: customer.id.0.clone(),
        customer_name: customer.name.clone(),
        from_sales: customer.related_sales.clone(),
        from_agent: customer.related_agent.clone(),
        to_sales: Some(sales.clone()),
        to_agent: agent.clone(),
        operator: operator_ref.clone(),
        operation,
        created_at: Some(now),
        updated_at: Some(now),
    });

    let progress_history = progress.is_changed().then(|| NewProgressHistory {
        customer_id: customer.id.0.clone(),
        customer_name: customer.name.clone(),
        from_progress: progress.before(),
        to_progress: progress.after(),
        operator: operator_ref,
        remark: operation.as_str().to_string(),
        created_at: Some(now),
        updated_at: Some(now),
    });

    AssignmentPlan {
        update: AssignmentUpdate {
            sales,
            agent,
            progress: target,
            initial_contact_at: (target == CustomerProgress::InitialContact).then_some(now),
            at: now,
        },
        progress,
        operation,
        disable_namesakes: supersedes_namesakes(target),
        history,
        progress_history,
    }
}

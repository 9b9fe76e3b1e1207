use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project linked to a customer. Only visibility matters to the lifecycle:
/// visible items promote an assignment to `NORMAL`, and pool entry hides them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub web_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use leadflow_core::domain::auto_transfer::SystemConfig;
use leadflow_core::domain::customer::{Customer, CustomerId, CustomerProgress, PublicPoolFilter};
use leadflow_core::domain::directory::{AgentAccount, AssignableTargets, SalesUser};
use leadflow_core::domain::history::{
    AssignmentHistory, AssignmentHistoryFilter, ProgressHistory, ProgressHistoryFilter,
};
use leadflow_core::domain::operator::Operator;
use leadflow_core::domain::work_item::WorkItem;
use leadflow_core::lifecycle::{AssignmentUpdate, PoolEntryUpdate, PoolExitUpdate};

pub mod customer;
pub mod directory;
pub mod history;
pub mod memory;
pub mod operator_token;
pub mod system_config;
pub mod work_item;

pub use customer::SqlCustomerRepository;
pub use directory::SqlDirectoryRepository;
pub use history::{SqlAssignmentHistoryRepository, SqlProgressHistoryRepository};
pub use memory::{
    InMemoryAssignmentHistoryRepository, InMemoryCustomerRepository, InMemoryDirectoryRepository,
    InMemoryOperatorTokenRepository, InMemoryProgressHistoryRepository,
    InMemorySystemConfigRepository, InMemoryWorkItemRepository,
};
pub use operator_token::SqlOperatorTokenRepository;
pub use system_config::SqlSystemConfigRepository;
pub use work_item::SqlWorkItemRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Customer record store. Every mutation is a single-row conditional update
/// and reports whether a row matched.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;

    async fn insert(&self, customer: Customer) -> Result<(), RepositoryError>;

    async fn list_by_progress(
        &self,
        progress: CustomerProgress,
    ) -> Result<Vec<Customer>, RepositoryError>;

    async fn list_public_pool(
        &self,
        filter: &PublicPoolFilter,
    ) -> Result<Vec<Customer>, RepositoryError>;

    async fn apply_assignment(
        &self,
        id: &CustomerId,
        update: &AssignmentUpdate,
    ) -> Result<bool, RepositoryError>;

    /// Entering `INITIAL_CONTACT` also restamps `initial_contact_at`, restarting
    /// the neglect SLA.
    async fn update_progress(
        &self,
        id: &CustomerId,
        progress: CustomerProgress,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Moves every other `INITIAL_CONTACT` customer named `name` to `DISABLED`.
    async fn disable_namesakes(
        &self,
        name: &str,
        except: &CustomerId,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    /// Matches only customers that are not pooled yet.
    async fn move_to_public_pool(
        &self,
        id: &CustomerId,
        update: &PoolEntryUpdate,
    ) -> Result<bool, RepositoryError>;

    /// Matches only customers that are currently pooled.
    async fn assign_from_public_pool(
        &self,
        id: &CustomerId,
        update: &PoolExitUpdate,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait AssignmentHistoryRepository: Send + Sync {
    async fn append(&self, entry: AssignmentHistory) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list(
        &self,
        filter: &AssignmentHistoryFilter,
    ) -> Result<Vec<AssignmentHistory>, RepositoryError>;
}

#[async_trait]
pub trait ProgressHistoryRepository: Send + Sync {
    async fn append(&self, entry: ProgressHistory) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list(
        &self,
        filter: &ProgressHistoryFilter,
    ) -> Result<Vec<ProgressHistory>, RepositoryError>;
}

#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<SalesUser>, RepositoryError>;
    async fn find_agent(&self, id: &str) -> Result<Option<AgentAccount>, RepositoryError>;
    async fn list_assignable(&self) -> Result<AssignableTargets, RepositoryError>;
    async fn save_user(&self, user: SalesUser) -> Result<(), RepositoryError>;
    async fn save_agent(&self, agent: AgentAccount) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    async fn has_visible_work_items(&self, customer_id: &str) -> Result<bool, RepositoryError>;

    /// Hides every visible work item of the customer, returning how many changed.
    async fn hide_all_for_customer(
        &self,
        customer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    async fn save(&self, item: WorkItem) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SystemConfigRepository: Send + Sync {
    /// Most recently updated enabled entry of the given type.
    async fn find_enabled(
        &self,
        config_type: &str,
    ) -> Result<Option<SystemConfig>, RepositoryError>;

    /// Upserts on `(config_type, config_key)`.
    async fn save(&self, config: SystemConfig) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OperatorTokenRepository: Send + Sync {
    async fn find_operator(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Operator>, RepositoryError>;

    async fn save(
        &self,
        token_hash: &str,
        operator: Operator,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;
}

/// Fixed-width UTC text so lexical order matches chronological order.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        })
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|value| parse_timestamp(column, value)).transpose()
}

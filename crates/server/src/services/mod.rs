//! Lifecycle services. Every ownership or progress mutation goes through one of
//! these, whether it comes from an HTTP handler, the CLI, or the scheduler.

use std::sync::Arc;

use leadflow_core::config::AppConfig;
use leadflow_core::domain::operator::Operator;
use leadflow_core::errors::ApplicationError;
use leadflow_db::repositories::{
    AssignmentHistoryRepository, CustomerRepository, DirectoryRepository,
    InMemoryAssignmentHistoryRepository, InMemoryCustomerRepository, InMemoryDirectoryRepository,
    InMemoryOperatorTokenRepository, InMemoryProgressHistoryRepository,
    InMemorySystemConfigRepository, InMemoryWorkItemRepository, OperatorTokenRepository,
    ProgressHistoryRepository, RepositoryError, SqlAssignmentHistoryRepository,
    SqlCustomerRepository, SqlDirectoryRepository, SqlOperatorTokenRepository,
    SqlProgressHistoryRepository, SqlSystemConfigRepository, SqlWorkItemRepository,
    SystemConfigRepository, WorkItemRepository,
};
use leadflow_db::DbPool;
use tracing::error;

pub mod assignment;
pub mod audit;
pub mod auto_transfer;
pub mod policy;
pub mod progress;
pub mod reclamation;

pub use assignment::{AssignmentOutcome, AssignmentService};
pub use audit::AuditHistoryLogger;
pub use auto_transfer::{AutoTransferJob, TransferRunReport};
pub use policy::AutoTransferPolicyService;
pub use progress::{ProgressChangeOutcome, ProgressService};
pub use reclamation::{PoolEntryOutcome, PoolExitOutcome, ReclamationService};

/// Store handles shared by every service. Built once at startup.
#[derive(Clone)]
pub struct Repositories {
    pub customers: Arc<dyn CustomerRepository>,
    pub assignment_history: Arc<dyn AssignmentHistoryRepository>,
    pub progress_history: Arc<dyn ProgressHistoryRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub work_items: Arc<dyn WorkItemRepository>,
    pub system_configs: Arc<dyn SystemConfigRepository>,
    pub operator_tokens: Arc<dyn OperatorTokenRepository>,
}

impl Repositories {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            customers: Arc::new(SqlCustomerRepository::new(pool.clone())),
            assignment_history: Arc::new(SqlAssignmentHistoryRepository::new(pool.clone())),
            progress_history: Arc::new(SqlProgressHistoryRepository::new(pool.clone())),
            directory: Arc::new(SqlDirectoryRepository::new(pool.clone())),
            work_items: Arc::new(SqlWorkItemRepository::new(pool.clone())),
            system_configs: Arc::new(SqlSystemConfigRepository::new(pool.clone())),
            operator_tokens: Arc::new(SqlOperatorTokenRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            customers: Arc::new(InMemoryCustomerRepository::default()),
            assignment_history: Arc::new(InMemoryAssignmentHistoryRepository::default()),
            progress_history: Arc::new(InMemoryProgressHistoryRepository::default()),
            directory: Arc::new(InMemoryDirectoryRepository::default()),
            work_items: Arc::new(InMemoryWorkItemRepository::default()),
            system_configs: Arc::new(InMemorySystemConfigRepository::default()),
            operator_tokens: Arc::new(InMemoryOperatorTokenRepository::default()),
        }
    }
}

/// Every service wired against one set of repositories.
#[derive(Clone)]
pub struct Services {
    pub repos: Repositories,
    pub audit: AuditHistoryLogger,
    pub assignments: AssignmentService,
    pub progress: ProgressService,
    pub reclamation: ReclamationService,
    pub policies: AutoTransferPolicyService,
    pub auto_transfer: AutoTransferJob,
}

impl Services {
    pub fn new(repos: Repositories, config: &AppConfig) -> Self {
        let audit = AuditHistoryLogger::new(
            repos.assignment_history.clone(),
            repos.progress_history.clone(),
        );
        let assignments = AssignmentService::new(repos.clone(), audit.clone());
        let progress =
            ProgressService::new(repos.clone(), audit.clone(), config.progress_labels.clone());
        let reclamation = ReclamationService::new(
            repos.clone(),
            audit.clone(),
            config.public_pool.clear_contact_on_entry,
        );
        let policies = AutoTransferPolicyService::new(repos.clone());
        let auto_transfer = AutoTransferJob::new(
            repos.clone(),
            assignments.clone(),
            Operator::system(
                config.scheduler.system_operator_id.clone(),
                config.scheduler.system_operator_name.clone(),
            ),
        );

        Self { repos, audit, assignments, progress, reclamation, policies, auto_transfer }
    }
}

pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    error!(event_name = "lifecycle.persistence.error", error = %error, "repository call failed");
    ApplicationError::Persistence(error.to_string())
}

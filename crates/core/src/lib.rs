pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;

pub use domain::auto_transfer::{AutoTransferPolicy, SystemConfig, AUTO_TRANSFER_CONFIG_TYPE};
pub use domain::customer::{
    Customer, CustomerId, CustomerProgress, OwnerRef, PartyRef, ProgressVocabulary,
    PublicPoolFilter,
};
pub use domain::directory::{AccountStatus, AgentAccount, AssignableTargets, SalesUser};
pub use domain::history::{
    AssignmentHistory, AssignmentHistoryFilter, AssignmentOperation, NewAssignmentHistory,
    NewProgressHistory, ProgressHistory, ProgressHistoryFilter,
};
pub use domain::operator::{Operator, Role};
pub use domain::work_item::WorkItem;
pub use errors::{ApplicationError, DomainError, InterfaceError};

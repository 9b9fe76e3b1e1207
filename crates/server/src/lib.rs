//! Lead lifecycle server: services, HTTP surface, and the auto-transfer scheduler.

pub mod api;
pub mod bootstrap;
pub mod health;
pub mod scheduler;
pub mod services;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};

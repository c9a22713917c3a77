//! Unit of work module
//!
//! Atomic execution of repository calls. An [`Executor`] is passed explicitly
//! through service and repository calls. Inside
//! [`TransactionManager::run_atomic`] it carries the open transaction, so
//! nested calls join it instead of opening a second one.

mod backend;
mod error;
mod executor;
mod manager;

pub use backend::Backend;
pub use error::TransactionError;
pub use executor::{AfterCommit, Executor, Resolved, UnitOfWork};
pub(crate) use executor::spawn_hooks;
pub use manager::TransactionManager;

//! atm_bank Library
//!
//! Accounts, transfers and machine cash operations over a unit-of-work core.
//! Re-exports modules for the server binary and integration testing.

pub mod api;
pub mod broker;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod repository;
pub mod service;
pub mod transaction;

pub use config::Config;
pub use domain::{Account, Amount, AmountError, DomainError, NotificationEvent, OperationContext};
pub use error::{AppError, AppResult, ErrorResponse};
pub use service::{ServiceError, Services};
pub use transaction::{Backend, Executor, TransactionError, TransactionManager};

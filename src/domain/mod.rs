//! Domain module
//!
//! Core domain types and business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod events;

pub use account::{Account, Machine, User, MAX_ACCOUNTS_PER_USER};
pub use amount::{Amount, AmountError};
pub use context::OperationContext;
pub use error::DomainError;
pub use events::{MachineOperation, NotificationEvent};

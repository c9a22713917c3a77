//! Notification Events
//!
//! Facts emitted to the task queue after a balance mutation has committed.
//! Consumers (mailers, statements) live outside this service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue receiving cash-out notifications
pub const CASHOUT_QUEUE: &str = "queue:cashout";

/// Queue receiving deposit notifications
pub const DEPOSIT_QUEUE: &str = "queue:deposit";

/// Queue receiving transfer notifications
pub const TRANSFER_QUEUE: &str = "queue:transfer";

/// Payload for machine-initiated operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineOperation {
    pub machine_id: Uuid,
    pub email: String,
    pub account_id: Uuid,
    pub amount: i64,
    pub new_balance: i64,
}

/// Events emitted after a committed balance mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationEvent {
    /// Cash was withdrawn at a machine
    CashOut(MachineOperation),

    /// Cash was deposited at a machine
    Deposit(MachineOperation),

    /// Money moved between two accounts of the same user
    Transfer {
        email: String,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: i64,
        from_balance: i64,
        to_balance: i64,
    },
}

impl NotificationEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::CashOut(_) => "CashOut",
            NotificationEvent::Deposit(_) => "Deposit",
            NotificationEvent::Transfer { .. } => "Transfer",
        }
    }

    /// Queue this event is delivered to
    pub fn queue(&self) -> &'static str {
        match self {
            NotificationEvent::CashOut(_) => CASHOUT_QUEUE,
            NotificationEvent::Deposit(_) => DEPOSIT_QUEUE,
            NotificationEvent::Transfer { .. } => TRANSFER_QUEUE,
        }
    }

    /// Amount moved by the operation
    pub fn amount(&self) -> i64 {
        match self {
            NotificationEvent::CashOut(op) | NotificationEvent::Deposit(op) => op.amount,
            NotificationEvent::Transfer { amount, .. } => *amount,
        }
    }
}

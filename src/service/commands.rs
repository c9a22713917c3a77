//! Command definitions
//!
//! Commands carry the caller's intent into the balance-mutation services.
//! Amounts are raw integers here and validated by the service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Move money between two accounts of the same user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    /// Requesting user; must own both accounts
    pub user_id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    /// Amount in smallest currency units
    pub amount: i64,
}

impl TransferCommand {
    pub fn new(user_id: Uuid, from_account_id: Uuid, to_account_id: Uuid, amount: i64) -> Self {
        Self {
            user_id,
            from_account_id,
            to_account_id,
            amount,
        }
    }
}

/// Cash-out or deposit at a machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineCommand {
    pub machine_id: Uuid,
    /// Requesting user; must own the account
    pub user_id: Uuid,
    pub account_id: Uuid,
    /// Amount in smallest currency units
    pub amount: i64,
}

impl MachineCommand {
    pub fn new(machine_id: Uuid, user_id: Uuid, account_id: Uuid, amount: i64) -> Self {
        Self {
            machine_id,
            user_id,
            account_id,
            amount,
        }
    }
}

/// Result of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: i64,
    pub from_balance: i64,
    pub to_balance: i64,
}

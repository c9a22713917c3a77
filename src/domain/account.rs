//! Account, user and machine records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, DomainError};

/// Maximum number of accounts a single user may hold
pub const MAX_ACCOUNTS_PER_USER: i64 = 3;

/// Account row
///
/// `balance` is in the smallest currency unit and never negative once
/// committed. It changes only through the balance-mutation services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Balance after withdrawing `amount`
    ///
    /// Rejects the debit if the balance would go negative.
    pub fn debit(&self, amount: Amount) -> Result<i64, DomainError> {
        if !amount.is_covered_by(self.balance) {
            return Err(DomainError::insufficient_funds(amount.value(), self.balance));
        }
        Ok(self.balance - amount.value())
    }

    /// Balance after adding `amount`
    pub fn credit(&self, amount: Amount) -> Result<i64, DomainError> {
        self.balance
            .checked_add(amount.value())
            .ok_or(DomainError::BalanceOverflow(self.id))
    }
}

/// User record (owned by the auth side; read-only here)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub email: String,
    pub verified: bool,
}

/// Cash machine record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Machine {
    pub id: Uuid,
    pub place: String,
}

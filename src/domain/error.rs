//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::AmountError;

/// Business-rule failures
///
/// Every variant is a stable, caller-visible kind. None of them is retried.
/// Ownership mismatches are reported as `AccountNotFound` so callers cannot
/// probe for accounts belonging to other users.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Balance does not cover a debit
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    /// Zero or negative amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Credit would overflow the balance column
    #[error("Balance overflow on account {0}")]
    BalanceOverflow(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// Missing, or owned by someone else
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Machine not found: {0}")]
    MachineNotFound(Uuid),

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    #[error("Too many accounts: limit is {limit}")]
    TooManyAccounts { limit: i64 },

    #[error("Email not verified")]
    EmailNotVerified,
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: i64, available: i64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }
}

impl From<AmountError> for DomainError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::NotPositive(value) => DomainError::InvalidAmount(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(9999, 70);

        assert!(err.to_string().contains("9999"));
        assert!(err.to_string().contains("70"));
    }

    #[test]
    fn test_from_amount_error() {
        let err: DomainError = AmountError::NotPositive(-5).into();
        assert_eq!(err, DomainError::InvalidAmount(-5));
    }
}

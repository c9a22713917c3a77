//! Unit of work errors

use uuid::Uuid;

/// Transaction-infrastructure failures
///
/// Callers see all of these as one opaque internal error. The variants stay
/// distinct so logs can tell "nothing happened" from "outcome unknown".
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The transaction could not be opened; no statement ran
    #[error("Could not start transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// Commit failed; the writes may or may not be durable
    #[error("Could not commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// No connection could be checked out for a direct statement
    #[error("Could not acquire connection: {0}")]
    Acquire(#[source] sqlx::Error),

    /// A joined executor outlived the closure it was handed to
    #[error("Unit of work {0} is still shared after its closure returned")]
    StillShared(Uuid),
}

impl TransactionError {
    /// Commit failures leave the effect of the unit of work unknown
    pub fn is_outcome_uncertain(&self) -> bool {
        matches!(self, TransactionError::Commit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_commit_is_uncertain() {
        assert!(TransactionError::Commit(sqlx::Error::PoolClosed).is_outcome_uncertain());
        assert!(!TransactionError::Begin(sqlx::Error::PoolClosed).is_outcome_uncertain());
        assert!(!TransactionError::Acquire(sqlx::Error::PoolTimedOut).is_outcome_uncertain());
        assert!(!TransactionError::StillShared(Uuid::nil()).is_outcome_uncertain());
    }

    #[test]
    fn test_error_display() {
        let err = TransactionError::Begin(sqlx::Error::PoolClosed);
        assert!(err.to_string().starts_with("Could not start transaction"));

        let err = TransactionError::Commit(sqlx::Error::PoolClosed);
        assert!(err.to_string().starts_with("Could not commit transaction"));
    }
}

//! Repositories
//!
//! Data access for accounts, users and machines. Every method takes an
//! [`Executor`] and resolves it per statement, so the same repository call
//! works both on its own and inside a caller's unit of work.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Account, DomainError, Machine, User};
use crate::transaction::{Backend, Executor, TransactionError};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryDb, MemoryRepository};
pub use postgres::{PgAccountRepository, PgMachineRepository, PgUserRepository};

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Machine not found: {0}")]
    MachineNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl RepositoryError {
    /// Not-found kinds as their domain equivalent
    pub fn as_domain(&self) -> Option<DomainError> {
        match self {
            RepositoryError::AccountNotFound(id) => Some(DomainError::AccountNotFound(*id)),
            RepositoryError::UserNotFound(id) => Some(DomainError::UserNotFound(*id)),
            RepositoryError::MachineNotFound(id) => Some(DomainError::MachineNotFound(*id)),
            RepositoryError::Database(_) | RepositoryError::Transaction(_) => None,
        }
    }
}

#[async_trait]
pub trait AccountRepository<B: Backend>: Send + Sync {
    /// Insert a new zero-balance account for `user_id`
    async fn create(&self, exec: &Executor<B>, user_id: Uuid) -> Result<Account, RepositoryError>;

    async fn get(&self, exec: &Executor<B>, id: Uuid) -> Result<Account, RepositoryError>;

    /// Read the account and hold its row lock until the unit of work ends
    async fn get_for_update(&self, exec: &Executor<B>, id: Uuid)
        -> Result<Account, RepositoryError>;

    async fn list_by_user(
        &self,
        exec: &Executor<B>,
        user_id: Uuid,
    ) -> Result<Vec<Account>, RepositoryError>;

    async fn count_by_user(&self, exec: &Executor<B>, user_id: Uuid)
        -> Result<i64, RepositoryError>;

    /// Overwrite the stored balance
    async fn update_balance(
        &self,
        exec: &Executor<B>,
        id: Uuid,
        balance: i64,
    ) -> Result<Account, RepositoryError>;

    async fn delete(&self, exec: &Executor<B>, id: Uuid) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UserRepository<B: Backend>: Send + Sync {
    async fn get(&self, exec: &Executor<B>, id: Uuid) -> Result<User, RepositoryError>;

    /// Read the user and hold its row lock until the unit of work ends
    async fn get_for_update(&self, exec: &Executor<B>, id: Uuid) -> Result<User, RepositoryError>;
}

#[async_trait]
pub trait MachineRepository<B: Backend>: Send + Sync {
    async fn get(&self, exec: &Executor<B>, id: Uuid) -> Result<Machine, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_domain() {
        let id = Uuid::new_v4();

        assert_eq!(
            RepositoryError::AccountNotFound(id).as_domain(),
            Some(DomainError::AccountNotFound(id))
        );
        assert_eq!(
            RepositoryError::MachineNotFound(id).as_domain(),
            Some(DomainError::MachineNotFound(id))
        );
        assert!(RepositoryError::Database(sqlx::Error::RowNotFound)
            .as_domain()
            .is_none());
    }
}

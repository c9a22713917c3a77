//! Services
//!
//! Business operations over the repositories. Every operation takes the
//! caller's [`Executor`]; balance mutations wrap their writes in
//! [`TransactionManager::run_atomic`], so calling them from inside another
//! unit of work simply joins it.

mod accounts;
mod commands;
mod machines;


use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::broker::{MemoryBroker, NotificationBroker, PgTaskQueue};
use crate::domain::{Account, AmountError, DomainError, NotificationEvent};
use crate::repository::{
    AccountRepository, MachineRepository, MemoryDb, MemoryRepository, PgAccountRepository,
    PgMachineRepository, PgUserRepository, RepositoryError, UserRepository,
};
use crate::transaction::{Backend, Executor, TransactionError, TransactionManager};

pub use accounts::AccountsService;
pub use commands::{MachineCommand, TransferCommand, TransferResult};
pub use machines::MachinesService;

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl ServiceError {
    /// Infrastructure failure rather than a business-rule rejection
    pub fn is_internal(&self) -> bool {
        !matches!(self, ServiceError::Domain(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        if let Some(domain) = err.as_domain() {
            return ServiceError::Domain(domain);
        }
        match err {
            RepositoryError::Transaction(e) => ServiceError::Transaction(e),
            other => ServiceError::Repository(other),
        }
    }
}

impl From<AmountError> for ServiceError {
    fn from(err: AmountError) -> Self {
        ServiceError::Domain(err.into())
    }
}

/// Hide accounts that belong to someone else behind `AccountNotFound`
pub(crate) fn owned_by(account: Account, user_id: Uuid) -> Result<Account, DomainError> {
    if account.is_owned_by(user_id) {
        Ok(account)
    } else {
        Err(DomainError::AccountNotFound(account.id))
    }
}

/// Deliver `event`, logging instead of failing
pub(crate) async fn notify(broker: Arc<dyn NotificationBroker>, event: NotificationEvent) {
    if let Err(e) = broker.enqueue(&event).await {
        tracing::warn!(
            error = %e,
            queue = event.queue(),
            event_type = event.event_type(),
            "Failed to enqueue notification"
        );
    }
}

/// All services, wired to one backend
pub struct Services<B: Backend> {
    pub manager: TransactionManager<B>,
    pub accounts: AccountsService<B>,
    pub machines: MachinesService<B>,
}

impl<B: Backend> Services<B> {
    pub fn new(
        manager: TransactionManager<B>,
        accounts: Arc<dyn AccountRepository<B>>,
        users: Arc<dyn UserRepository<B>>,
        machines: Arc<dyn MachineRepository<B>>,
        broker: Arc<dyn NotificationBroker>,
    ) -> Self {
        Self {
            accounts: AccountsService::new(
                manager.clone(),
                Arc::clone(&accounts),
                Arc::clone(&users),
                Arc::clone(&broker),
            ),
            machines: MachinesService::new(manager.clone(), accounts, users, machines, broker),
            manager,
        }
    }

    /// Executor for a request that has not opened a unit of work
    pub fn executor(&self) -> Executor<B> {
        self.manager.executor()
    }
}

impl<B: Backend> Clone for Services<B> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            accounts: self.accounts.clone(),
            machines: self.machines.clone(),
        }
    }
}

impl Services<PgPool> {
    /// Services over PostgreSQL with the `task_queue` table as broker
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            TransactionManager::new(pool.clone()),
            Arc::new(PgAccountRepository),
            Arc::new(PgUserRepository),
            Arc::new(PgMachineRepository),
            Arc::new(PgTaskQueue::new(pool)),
        )
    }
}

impl Services<MemoryDb> {
    /// Services over the in-memory store
    pub fn memory(db: MemoryDb, broker: MemoryBroker) -> Self {
        Self::new(
            TransactionManager::new(db),
            Arc::new(MemoryRepository),
            Arc::new(MemoryRepository),
            Arc::new(MemoryRepository),
            Arc::new(broker),
        )
    }
}

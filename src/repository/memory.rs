//! In-memory storage backend
//!
//! Used by the test-suite and for running the service without PostgreSQL.
//! A transaction holds the store lock for its whole lifetime and writes to a
//! staged copy, so units of work are fully serialized and an uncommitted
//! transaction simply disappears when dropped.

use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{Account, Machine, User};
use crate::transaction::{Backend, Executor};

use super::{AccountRepository, MachineRepository, RepositoryError, UserRepository};

/// Tables of the in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    users: HashMap<Uuid, User>,
    machines: HashMap<Uuid, Machine>,
    accounts: HashMap<Uuid, Account>,
    failing_accounts: HashSet<Uuid>,
}

impl MemoryState {
    fn account(&self, id: Uuid) -> Result<Account, RepositoryError> {
        self.accounts
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::AccountNotFound(id))
    }

    fn user(&self, id: Uuid) -> Result<User, RepositoryError> {
        self.users
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::UserNotFound(id))
    }
}

/// Open in-memory transaction
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl Deref for MemoryTransaction {
    type Target = MemoryState;

    fn deref(&self) -> &Self::Target {
        &self.staged
    }
}

impl DerefMut for MemoryTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.staged
    }
}

/// Transaction counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

#[derive(Debug, Default)]
struct Counters {
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
    fail_next_begin: AtomicBool,
    fail_next_commit: AtomicBool,
}

/// In-memory database
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<MemoryState>>,
    counters: Arc<Counters>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            begun: self.counters.begun.load(Ordering::SeqCst),
            committed: self.counters.committed.load(Ordering::SeqCst),
            rolled_back: self.counters.rolled_back.load(Ordering::SeqCst),
        }
    }

    /// Make the next `begin` fail
    pub fn fail_next_begin(&self) {
        self.counters.fail_next_begin.store(true, Ordering::SeqCst);
    }

    /// Make the next `commit` fail; the transaction is discarded
    pub fn fail_next_commit(&self) {
        self.counters.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make every balance update on `account_id` fail with a storage error
    pub async fn fail_balance_updates_for(&self, account_id: Uuid) {
        self.state.lock().await.failing_accounts.insert(account_id);
    }

    pub async fn seed_user(&self, email: &str, verified: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            surname: "Ivanov".to_string(),
            name: "Ivan".to_string(),
            patronymic: "Ivanovich".to_string(),
            email: email.to_string(),
            verified,
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn seed_machine(&self, place: &str) -> Machine {
        let machine = Machine {
            id: Uuid::new_v4(),
            place: place.to_string(),
        };
        self.state
            .lock()
            .await
            .machines
            .insert(machine.id, machine.clone());
        machine
    }

    pub async fn seed_account(&self, user_id: Uuid, balance: i64) -> Account {
        let account = Account {
            balance,
            ..Account::new(user_id)
        };
        self.state
            .lock()
            .await
            .accounts
            .insert(account.id, account.clone());
        account
    }

    /// Committed balance of an account
    pub async fn balance_of(&self, account_id: Uuid) -> Option<i64> {
        self.state
            .lock()
            .await
            .accounts
            .get(&account_id)
            .map(|account| account.balance)
    }

    /// Sum of all committed balances
    pub async fn total_balance(&self) -> i64 {
        self.state
            .lock()
            .await
            .accounts
            .values()
            .map(|account| account.balance)
            .sum()
    }
}

#[async_trait]
impl Backend for MemoryDb {
    type Connection = MemoryState;
    type Pooled = OwnedMutexGuard<MemoryState>;
    type Transaction = MemoryTransaction;

    async fn acquire(&self) -> Result<Self::Pooled, sqlx::Error> {
        Ok(Arc::clone(&self.state).lock_owned().await)
    }

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error> {
        if self.counters.fail_next_begin.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("begin refused".to_string()));
        }

        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTransaction { guard, staged })
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<(), sqlx::Error> {
        if self.counters.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("connection lost during commit".to_string()));
        }

        let MemoryTransaction { mut guard, staged } = tx;
        *guard = staged;
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), sqlx::Error> {
        drop(tx);
        self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Repositories over [`MemoryDb`]
///
/// The store lock already serializes units of work, so `get_for_update` is a
/// plain read.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryRepository;

#[async_trait]
impl AccountRepository<MemoryDb> for MemoryRepository {
    async fn create(
        &self,
        exec: &Executor<MemoryDb>,
        user_id: Uuid,
    ) -> Result<Account, RepositoryError> {
        let mut conn = exec.resolve().await?;
        let account = Account::new(user_id);
        conn.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get(&self, exec: &Executor<MemoryDb>, id: Uuid) -> Result<Account, RepositoryError> {
        exec.resolve().await?.account(id)
    }

    async fn get_for_update(
        &self,
        exec: &Executor<MemoryDb>,
        id: Uuid,
    ) -> Result<Account, RepositoryError> {
        exec.resolve().await?.account(id)
    }

    async fn list_by_user(
        &self,
        exec: &Executor<MemoryDb>,
        user_id: Uuid,
    ) -> Result<Vec<Account>, RepositoryError> {
        let conn = exec.resolve().await?;
        let mut accounts: Vec<Account> = conn
            .accounts
            .values()
            .filter(|account| account.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|account| (account.created_at, account.id));
        Ok(accounts)
    }

    async fn count_by_user(
        &self,
        exec: &Executor<MemoryDb>,
        user_id: Uuid,
    ) -> Result<i64, RepositoryError> {
        let conn = exec.resolve().await?;
        let count = conn
            .accounts
            .values()
            .filter(|account| account.user_id == user_id)
            .count();
        Ok(count as i64)
    }

    async fn update_balance(
        &self,
        exec: &Executor<MemoryDb>,
        id: Uuid,
        balance: i64,
    ) -> Result<Account, RepositoryError> {
        let mut conn = exec.resolve().await?;

        if conn.failing_accounts.contains(&id) {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(format!(
                "write to account {} failed",
                id
            ))));
        }
        if balance < 0 {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(
                "accounts_balance_check violated".to_string(),
            )));
        }

        let account = conn
            .accounts
            .get_mut(&id)
            .ok_or(RepositoryError::AccountNotFound(id))?;
        account.balance = balance;
        Ok(account.clone())
    }

    async fn delete(&self, exec: &Executor<MemoryDb>, id: Uuid) -> Result<(), RepositoryError> {
        let mut conn = exec.resolve().await?;
        conn.accounts
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::AccountNotFound(id))
    }
}

#[async_trait]
impl UserRepository<MemoryDb> for MemoryRepository {
    async fn get(&self, exec: &Executor<MemoryDb>, id: Uuid) -> Result<User, RepositoryError> {
        exec.resolve().await?.user(id)
    }

    async fn get_for_update(
        &self,
        exec: &Executor<MemoryDb>,
        id: Uuid,
    ) -> Result<User, RepositoryError> {
        exec.resolve().await?.user(id)
    }
}

#[async_trait]
impl MachineRepository<MemoryDb> for MemoryRepository {
    async fn get(&self, exec: &Executor<MemoryDb>, id: Uuid) -> Result<Machine, RepositoryError> {
        exec.resolve()
            .await?
            .machines
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::MachineNotFound(id))
    }
}

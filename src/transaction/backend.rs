//! Storage backends
//!
//! A backend hands out two kinds of handle: a pooled connection for
//! statements that run on their own, and a transaction for a unit of work.
//! Both dereference to the same connection type, which is all a repository
//! ever sees.

use std::ops::DerefMut;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Storage engine the unit-of-work manager runs on
#[async_trait]
pub trait Backend: Clone + Send + Sync + 'static {
    /// Statement-execution capability shared by pooled connections and
    /// open transactions
    type Connection: Send;

    /// Connection checked out of the pool for a single statement
    type Pooled: DerefMut<Target = Self::Connection> + Send;

    /// Open transaction; dropping it without commit rolls it back
    type Transaction: DerefMut<Target = Self::Connection> + Send + 'static;

    async fn acquire(&self) -> Result<Self::Pooled, sqlx::Error>;

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error>;

    async fn commit(&self, tx: Self::Transaction) -> Result<(), sqlx::Error>;

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl Backend for PgPool {
    type Connection = PgConnection;
    type Pooled = PoolConnection<Postgres>;
    type Transaction = Transaction<'static, Postgres>;

    async fn acquire(&self) -> Result<Self::Pooled, sqlx::Error> {
        sqlx::Pool::acquire(self).await
    }

    async fn begin(&self) -> Result<Self::Transaction, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }

    async fn commit(&self, tx: Self::Transaction) -> Result<(), sqlx::Error> {
        tx.commit().await
    }

    async fn rollback(&self, tx: Self::Transaction) -> Result<(), sqlx::Error> {
        tx.rollback().await
    }
}

//! Executor and resolver
//!
//! [`Executor`] is the explicit replacement for a request-scoped "current
//! transaction" lookup. It is threaded through service and repository calls;
//! [`Executor::resolve`] picks the handle a single statement runs against.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::Instrument;
use uuid::Uuid;

use super::{Backend, TransactionError};

/// Deferred side effect that runs once the outermost unit of work commits
pub type AfterCommit = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Run `hooks` in order on a detached task.
///
/// The caller's result never waits on them, and cancelling the caller after
/// this point does not cancel them.
pub(crate) fn spawn_hooks(unit_of_work: Option<Uuid>, hooks: Vec<AfterCommit>) {
    if hooks.is_empty() {
        return;
    }

    let span = tracing::debug_span!("after_commit", unit_of_work = ?unit_of_work, hooks = hooks.len());
    tokio::spawn(
        async move {
            for hook in hooks {
                hook.await;
            }
        }
        .instrument(span),
    );
}

struct Shared<B: Backend> {
    id: Uuid,
    tx: Mutex<B::Transaction>,
    after_commit: Mutex<Vec<AfterCommit>>,
}

/// Handle to an open transaction
///
/// Clones are lookup-only: the [`TransactionManager`](super::TransactionManager)
/// that opened the transaction alone decides whether it commits.
pub struct UnitOfWork<B: Backend> {
    shared: Arc<Shared<B>>,
}

impl<B: Backend> UnitOfWork<B> {
    pub(crate) fn new(tx: B::Transaction) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                tx: Mutex::new(tx),
                after_commit: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Take the transaction and pending hooks back.
    ///
    /// Fails with the unit-of-work id while any other handle is alive.
    pub(crate) fn into_parts(self) -> Result<(B::Transaction, Vec<AfterCommit>), Uuid> {
        let id = self.id();
        Arc::try_unwrap(self.shared)
            .map(|shared| (shared.tx.into_inner(), shared.after_commit.into_inner()))
            .map_err(|_| id)
    }
}

impl<B: Backend> Clone for UnitOfWork<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Where a statement should run
pub enum Executor<B: Backend> {
    /// No unit of work is open; every statement takes its own pooled connection
    Direct(B),
    /// Statements join the caller's open unit of work
    Joined(UnitOfWork<B>),
}

impl<B: Backend> Executor<B> {
    pub fn is_joined(&self) -> bool {
        matches!(self, Executor::Joined(_))
    }

    pub fn unit_of_work_id(&self) -> Option<Uuid> {
        match self {
            Executor::Direct(_) => None,
            Executor::Joined(uow) => Some(uow.id()),
        }
    }

    /// Return the open transaction when joined, otherwise a pooled connection.
    ///
    /// A joined handle locks the transaction until it is dropped, so drop it
    /// before resolving again.
    pub async fn resolve(&self) -> Result<Resolved<'_, B>, TransactionError> {
        match self {
            Executor::Direct(backend) => backend
                .acquire()
                .await
                .map(Resolved::Pooled)
                .map_err(TransactionError::Acquire),
            Executor::Joined(uow) => Ok(Resolved::Joined(uow.shared.tx.lock().await)),
        }
    }

    /// Run `hook` after the outermost commit.
    ///
    /// Hooks run on a detached task. Outside a unit of work there is nothing
    /// to wait for and the hook is spawned at once. Hooks registered on a unit
    /// of work that rolls back are dropped without running.
    pub async fn after_commit<F>(&self, hook: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            Executor::Direct(_) => {
                let hook: AfterCommit = Box::pin(hook);
                spawn_hooks(None, vec![hook]);
            }
            Executor::Joined(uow) => uow.shared.after_commit.lock().await.push(Box::pin(hook)),
        }
    }
}

impl<B: Backend> Clone for Executor<B> {
    fn clone(&self) -> Self {
        match self {
            Executor::Direct(backend) => Executor::Direct(backend.clone()),
            Executor::Joined(uow) => Executor::Joined(uow.clone()),
        }
    }
}

impl<B: Backend> fmt::Debug for Executor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Direct(_) => f.write_str("Executor::Direct"),
            Executor::Joined(uow) => write!(f, "Executor::Joined({})", uow.id()),
        }
    }
}

/// Connection handle picked by [`Executor::resolve`]
pub enum Resolved<'a, B: Backend> {
    Pooled(B::Pooled),
    Joined(MutexGuard<'a, B::Transaction>),
}

impl<B: Backend> Deref for Resolved<'_, B> {
    type Target = B::Connection;

    fn deref(&self) -> &Self::Target {
        match self {
            Resolved::Pooled(conn) => &**conn,
            Resolved::Joined(tx) => &***tx,
        }
    }
}

impl<B: Backend> DerefMut for Resolved<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Resolved::Pooled(conn) => &mut **conn,
            Resolved::Joined(tx) => &mut ***tx,
        }
    }
}

//! Unit-of-work manager

use std::future::Future;

use super::{spawn_hooks, Backend, Executor, TransactionError, UnitOfWork};

/// Opens, commits and rolls back units of work
#[derive(Debug, Clone)]
pub struct TransactionManager<B: Backend> {
    backend: B,
}

impl<B: Backend> TransactionManager<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Executor for work that is not part of any unit of work yet
    pub fn executor(&self) -> Executor<B> {
        Executor::Direct(self.backend.clone())
    }

    /// Run `f` atomically.
    ///
    /// With a direct executor a new transaction is opened and handed to `f`
    /// as a joined executor; it commits when `f` returns `Ok` and rolls back
    /// otherwise, returning the closure's error unchanged. With a joined
    /// executor `f` simply becomes part of the caller's unit of work and the
    /// outermost call keeps the commit decision.
    ///
    /// After a successful commit the registered hooks are spawned and the
    /// result is returned without waiting for them.
    ///
    /// Dropping the returned future before it completes drops the
    /// transaction, which rolls it back.
    pub async fn run_atomic<F, Fut, T, E>(&self, executor: &Executor<B>, f: F) -> Result<T, E>
    where
        F: FnOnce(Executor<B>) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: From<TransactionError> + Send,
    {
        if let Executor::Joined(uow) = executor {
            tracing::trace!(unit_of_work = %uow.id(), "Joining open unit of work");
            return f(executor.clone()).await;
        }

        let tx = self.backend.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to start transaction");
            TransactionError::Begin(e)
        })?;

        let uow = UnitOfWork::<B>::new(tx);
        let id = uow.id();
        tracing::debug!(unit_of_work = %id, "Unit of work started");

        let result = f(Executor::Joined(uow.clone())).await;

        let (tx, hooks) = match uow.into_parts() {
            Ok(parts) => parts,
            Err(id) => {
                tracing::error!(
                    unit_of_work = %id,
                    "Executor escaped its unit of work; rolling back on last drop"
                );
                return match result {
                    Ok(_) => Err(TransactionError::StillShared(id).into()),
                    Err(err) => Err(err),
                };
            }
        };

        match result {
            Ok(value) => {
                if let Err(e) = self.backend.commit(tx).await {
                    tracing::error!(
                        unit_of_work = %id,
                        error = %e,
                        "Commit failed; outcome of unit of work is uncertain"
                    );
                    return Err(TransactionError::Commit(e).into());
                }
                tracing::debug!(unit_of_work = %id, hooks = hooks.len(), "Unit of work committed");

                spawn_hooks(Some(id), hooks);
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = self.backend.rollback(tx).await {
                    tracing::error!(unit_of_work = %id, error = %e, "Rollback failed");
                } else {
                    tracing::debug!(unit_of_work = %id, "Unit of work rolled back");
                }
                Err(err)
            }
        }
    }
}

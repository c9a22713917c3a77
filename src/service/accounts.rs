//! Accounts service
//!
//! Account lifecycle and transfers between accounts of the same user.

use std::sync::Arc;

use uuid::Uuid;

use crate::broker::NotificationBroker;
use crate::domain::{Account, Amount, DomainError, NotificationEvent, MAX_ACCOUNTS_PER_USER};
use crate::repository::{AccountRepository, UserRepository};
use crate::transaction::{Backend, Executor, TransactionManager};

use super::{notify, owned_by, ServiceError, TransferCommand, TransferResult};

pub struct AccountsService<B: Backend> {
    manager: TransactionManager<B>,
    accounts: Arc<dyn AccountRepository<B>>,
    users: Arc<dyn UserRepository<B>>,
    broker: Arc<dyn NotificationBroker>,
}

impl<B: Backend> Clone for AccountsService<B> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            accounts: Arc::clone(&self.accounts),
            users: Arc::clone(&self.users),
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<B: Backend> AccountsService<B> {
    pub fn new(
        manager: TransactionManager<B>,
        accounts: Arc<dyn AccountRepository<B>>,
        users: Arc<dyn UserRepository<B>>,
        broker: Arc<dyn NotificationBroker>,
    ) -> Self {
        Self {
            manager,
            accounts,
            users,
            broker,
        }
    }

    /// Open a zero-balance account.
    ///
    /// The user must exist and have a verified email. The per-user limit is
    /// checked with the user row locked, so concurrent creations cannot both
    /// slip under it.
    pub async fn create(&self, exec: &Executor<B>, user_id: Uuid) -> Result<Account, ServiceError> {
        let user = self.users.get(exec, user_id).await?;
        if !user.verified {
            return Err(DomainError::EmailNotVerified.into());
        }

        let accounts = Arc::clone(&self.accounts);
        let users = Arc::clone(&self.users);
        self.manager
            .run_atomic(exec, move |tx| async move {
                users.get_for_update(&tx, user_id).await?;

                let count = accounts.count_by_user(&tx, user_id).await?;
                if count >= MAX_ACCOUNTS_PER_USER {
                    return Err(DomainError::TooManyAccounts {
                        limit: MAX_ACCOUNTS_PER_USER,
                    }
                    .into());
                }

                let account = accounts.create(&tx, user_id).await?;
                tracing::info!(
                    user_id = %user_id,
                    account_id = %account.id,
                    "Account created"
                );
                Ok::<_, ServiceError>(account)
            })
            .await
    }

    pub async fn get(
        &self,
        exec: &Executor<B>,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<Account, ServiceError> {
        let account = self.accounts.get(exec, account_id).await?;
        Ok(owned_by(account, user_id)?)
    }

    pub async fn list(&self, exec: &Executor<B>, user_id: Uuid) -> Result<Vec<Account>, ServiceError> {
        self.users.get(exec, user_id).await?;
        Ok(self.accounts.list_by_user(exec, user_id).await?)
    }

    pub async fn delete(
        &self,
        exec: &Executor<B>,
        user_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), ServiceError> {
        let accounts = Arc::clone(&self.accounts);
        self.manager
            .run_atomic(exec, move |tx| async move {
                owned_by(accounts.get_for_update(&tx, account_id).await?, user_id)?;
                accounts.delete(&tx, account_id).await?;
                tracing::info!(user_id = %user_id, account_id = %account_id, "Account deleted");
                Ok::<_, ServiceError>(())
            })
            .await
    }

    /// Move `amount` from one of the user's accounts to another.
    ///
    /// Both rows are locked in ascending id order before the balances are
    /// read, and ownership and funds are checked again on the locked values.
    /// The debit and the credit commit together or not at all.
    pub async fn transfer(
        &self,
        exec: &Executor<B>,
        command: TransferCommand,
    ) -> Result<TransferResult, ServiceError> {
        let TransferCommand {
            user_id,
            from_account_id,
            to_account_id,
            amount,
        } = command;

        let amount = Amount::new(amount)?;
        if from_account_id == to_account_id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        let source = owned_by(self.accounts.get(exec, from_account_id).await?, user_id)?;
        if !amount.is_covered_by(source.balance) {
            return Err(DomainError::insufficient_funds(amount.value(), source.balance).into());
        }
        owned_by(self.accounts.get(exec, to_account_id).await?, user_id)?;

        let accounts = Arc::clone(&self.accounts);
        let users = Arc::clone(&self.users);
        let broker = Arc::clone(&self.broker);
        let result = self
            .manager
            .run_atomic(exec, move |tx| async move {
                let (first, second) = if from_account_id < to_account_id {
                    (from_account_id, to_account_id)
                } else {
                    (to_account_id, from_account_id)
                };
                let first = owned_by(accounts.get_for_update(&tx, first).await?, user_id)?;
                let second = owned_by(accounts.get_for_update(&tx, second).await?, user_id)?;
                let (source, destination) = if first.id == from_account_id {
                    (first, second)
                } else {
                    (second, first)
                };

                let from_balance = source.debit(amount)?;
                let to_balance = destination.credit(amount)?;

                accounts
                    .update_balance(&tx, from_account_id, from_balance)
                    .await?;
                accounts
                    .update_balance(&tx, to_account_id, to_balance)
                    .await?;

                let result = TransferResult {
                    from_account_id,
                    to_account_id,
                    amount: amount.value(),
                    from_balance,
                    to_balance,
                };

                match users.get(&tx, user_id).await {
                    Ok(user) => {
                        let event = NotificationEvent::Transfer {
                            email: user.email,
                            from_account_id,
                            to_account_id,
                            amount: result.amount,
                            from_balance,
                            to_balance,
                        };
                        tx.after_commit(notify(broker, event)).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            user_id = %user_id,
                            "Skipping transfer notification"
                        );
                    }
                }

                Ok::<_, ServiceError>(result)
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            from = %result.from_account_id,
            to = %result.to_account_id,
            amount = result.amount,
            "Transfer applied"
        );
        Ok(result)
    }
}

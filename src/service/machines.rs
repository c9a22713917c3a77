//! Machines service
//!
//! Cash-out and deposit at a physical machine.

use std::sync::Arc;

use crate::broker::NotificationBroker;
use crate::domain::{Account, Amount, DomainError, MachineOperation, NotificationEvent};
use crate::repository::{AccountRepository, MachineRepository, UserRepository};
use crate::transaction::{Backend, Executor, TransactionManager};

use super::{notify, owned_by, MachineCommand, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    CashOut,
    Deposit,
}

impl Direction {
    fn apply(self, account: &Account, amount: Amount) -> Result<i64, DomainError> {
        match self {
            Direction::CashOut => account.debit(amount),
            Direction::Deposit => account.credit(amount),
        }
    }

    fn event(self, operation: MachineOperation) -> NotificationEvent {
        match self {
            Direction::CashOut => NotificationEvent::CashOut(operation),
            Direction::Deposit => NotificationEvent::Deposit(operation),
        }
    }
}

pub struct MachinesService<B: Backend> {
    manager: TransactionManager<B>,
    accounts: Arc<dyn AccountRepository<B>>,
    users: Arc<dyn UserRepository<B>>,
    machines: Arc<dyn MachineRepository<B>>,
    broker: Arc<dyn NotificationBroker>,
}

impl<B: Backend> Clone for MachinesService<B> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            accounts: Arc::clone(&self.accounts),
            users: Arc::clone(&self.users),
            machines: Arc::clone(&self.machines),
            broker: Arc::clone(&self.broker),
        }
    }
}

impl<B: Backend> MachinesService<B> {
    pub fn new(
        manager: TransactionManager<B>,
        accounts: Arc<dyn AccountRepository<B>>,
        users: Arc<dyn UserRepository<B>>,
        machines: Arc<dyn MachineRepository<B>>,
        broker: Arc<dyn NotificationBroker>,
    ) -> Self {
        Self {
            manager,
            accounts,
            users,
            machines,
            broker,
        }
    }

    /// Withdraw cash; the balance never goes negative
    pub async fn cash_out(
        &self,
        exec: &Executor<B>,
        command: MachineCommand,
    ) -> Result<Account, ServiceError> {
        self.execute(exec, command, Direction::CashOut).await
    }

    /// Deposit cash
    pub async fn deposit(
        &self,
        exec: &Executor<B>,
        command: MachineCommand,
    ) -> Result<Account, ServiceError> {
        self.execute(exec, command, Direction::Deposit).await
    }

    async fn execute(
        &self,
        exec: &Executor<B>,
        command: MachineCommand,
        direction: Direction,
    ) -> Result<Account, ServiceError> {
        let MachineCommand {
            machine_id,
            user_id,
            account_id,
            amount,
        } = command;

        let amount = Amount::new(amount)?;
        self.machines.get(exec, machine_id).await?;
        let user = self.users.get(exec, user_id).await?;
        let account = owned_by(self.accounts.get(exec, account_id).await?, user_id)?;
        if direction == Direction::CashOut && !amount.is_covered_by(account.balance) {
            return Err(DomainError::insufficient_funds(amount.value(), account.balance).into());
        }

        let accounts = Arc::clone(&self.accounts);
        let broker = Arc::clone(&self.broker);
        let account = self
            .manager
            .run_atomic(exec, move |tx| async move {
                let locked = owned_by(accounts.get_for_update(&tx, account_id).await?, user_id)?;
                let new_balance = direction.apply(&locked, amount)?;
                let account = accounts.update_balance(&tx, account_id, new_balance).await?;

                let event = direction.event(MachineOperation {
                    machine_id,
                    email: user.email,
                    account_id,
                    amount: amount.value(),
                    new_balance,
                });
                tx.after_commit(notify(broker, event)).await;

                Ok::<_, ServiceError>(account)
            })
            .await?;

        tracing::info!(
            operation = ?direction,
            machine_id = %machine_id,
            account_id = %account_id,
            amount = amount.value(),
            balance = account.balance,
            "Machine operation applied"
        );
        Ok(account)
    }
}

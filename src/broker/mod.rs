//! Notification broker
//!
//! Delivers [`NotificationEvent`]s to their task queue. Delivery is
//! best-effort: callers log failures and never roll back a committed
//! balance change because of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::domain::NotificationEvent;

/// Broker errors
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Broker unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait NotificationBroker: Send + Sync {
    async fn enqueue(&self, event: &NotificationEvent) -> Result<(), BrokerError>;
}

/// Task queue stored in the `task_queue` table
#[derive(Debug, Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationBroker for PgTaskQueue {
    async fn enqueue(&self, event: &NotificationEvent) -> Result<(), BrokerError> {
        let payload = serde_json::to_value(event)?;

        sqlx::query(
            r#"
            INSERT INTO task_queue (id, queue, payload, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.queue())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            queue = event.queue(),
            event_type = event.event_type(),
            amount = event.amount(),
            "Notification enqueued"
        );
        Ok(())
    }
}

/// How long [`MemoryBroker::wait_for`] waits for deliveries
const DELIVERY_WAIT: Duration = Duration::from_secs(2);

/// Broker that keeps events in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
    delivered: Arc<Notify>,
    failing: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered so far
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Wait until at least `count` events were delivered, then return them.
    ///
    /// Deliveries happen on detached tasks. Gives up after a short while and
    /// returns whatever arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<NotificationEvent> {
        let arrived = async {
            loop {
                // Registered before the check so a delivery in between still wakes us
                let delivered = self.delivered.notified();
                let events = self.events();
                if events.len() >= count {
                    return events;
                }
                delivered.await;
            }
        };

        match tokio::time::timeout(DELIVERY_WAIT, arrived).await {
            Ok(events) => events,
            Err(_) => self.events(),
        }
    }

    /// Reject every delivery while `failing` is set
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Never complete a delivery while `stalled` is set
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationBroker for MemoryBroker {
    async fn enqueue(&self, event: &NotificationEvent) -> Result<(), BrokerError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("broker is down".to_string()));
        }

        self.events
            .lock()
            .map_err(|_| BrokerError::Unavailable("event log poisoned".to_string()))?
            .push(event.clone());
        self.delivered.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MachineOperation;

    fn deposit() -> NotificationEvent {
        NotificationEvent::Deposit(MachineOperation {
            machine_id: Uuid::new_v4(),
            email: "ivan@example.com".to_string(),
            account_id: Uuid::new_v4(),
            amount: 10,
            new_balance: 10,
        })
    }

    #[tokio::test]
    async fn test_memory_broker_records_events() {
        let broker = MemoryBroker::new();
        broker.enqueue(&deposit()).await.unwrap();

        let events = broker.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].queue(), "queue:deposit");
    }

    #[tokio::test]
    async fn test_memory_broker_failure() {
        let broker = MemoryBroker::new();
        broker.set_failing(true);

        let result = broker.enqueue(&deposit()).await;
        assert!(matches!(result, Err(BrokerError::Unavailable(_))));
        assert!(broker.events().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_sees_later_delivery() {
        let broker = MemoryBroker::new();

        let sender = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender.enqueue(&deposit()).await.unwrap();
        });

        assert_eq!(broker.wait_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_stalled_delivery_never_completes() {
        let broker = MemoryBroker::new();
        broker.set_stalled(true);

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), broker.enqueue(&deposit())).await;
        assert!(outcome.is_err());
        assert!(broker.events().is_empty());
    }
}

//! Notification queue trait, Postgres outbox and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use store::Order;
use thiserror::Error;

/// Job kind sent after a committed checkout.
pub const ORDER_CONFIRMATION: &str = "order_confirmation";

/// A unit of work for the notification worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub kind: String,
    pub payload: serde_json::Value,
}

impl NotificationJob {
    /// Builds the confirmation job for a committed order.
    pub fn order_confirmation(order: &Order) -> Self {
        Self {
            kind: ORDER_CONFIRMATION.to_string(),
            payload: serde_json::json!({
                "order_id": order.id,
                "user_id": order.user_id,
                "total_cents": order.total.cents(),
                "transaction_id": order.transaction_id,
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification queue error: {0}")]
    Queue(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Trait for handing jobs to an asynchronous worker.
///
/// Enqueueing is fire-and-forget from the caller's point of view: failures
/// are reported but never undo the work that produced the job.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, job: NotificationJob) -> Result<(), NotificationError>;
}

#[async_trait]
impl<T: NotificationQueue + ?Sized> NotificationQueue for Arc<T> {
    async fn enqueue(&self, job: NotificationJob) -> Result<(), NotificationError> {
        self.as_ref().enqueue(job).await
    }
}

/// Queue backed by the `notification_jobs` table.
#[derive(Debug, Clone)]
pub struct PostgresNotificationQueue {
    pool: PgPool,
}

impl PostgresNotificationQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationQueue for PostgresNotificationQueue {
    #[tracing::instrument(skip(self, job), fields(kind = %job.kind))]
    async fn enqueue(&self, job: NotificationJob) -> Result<(), NotificationError> {
        sqlx::query("INSERT INTO notification_jobs (kind, payload) VALUES ($1, $2)")
            .bind(&job.kind)
            .bind(&job.payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    jobs: Vec<NotificationJob>,
    fail_on_enqueue: bool,
}

/// In-memory queue for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationQueue {
    state: Arc<RwLock<InMemoryQueueState>>,
}

impl InMemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the queue to reject every job.
    pub fn set_fail_on_enqueue(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_on_enqueue = fail;
        }
    }

    /// Returns the jobs accepted so far.
    pub fn jobs(&self) -> Vec<NotificationJob> {
        self.state
            .read()
            .map(|s| s.jobs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationQueue for InMemoryNotificationQueue {
    async fn enqueue(&self, job: NotificationJob) -> Result<(), NotificationError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| NotificationError::Queue("queue state poisoned".to_string()))?;

        if state.fail_on_enqueue {
            return Err(NotificationError::Queue("queue unavailable".to_string()));
        }

        state.jobs.push(job);
        Ok(())
    }
}

//! Broker port - 優先度付きキューを持つ外部 broker の抽象化
//!
//! The broker owns delivery state: once `enqueue` succeeds nobody else keeps
//! track of the task. Delivery is at-least-once; a handler may see the same
//! task more than once.
//!
//! # 実装
//! - **InMemoryBroker**: 開発・テスト用（`impls::inmem_broker`）

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{DeliveryOptions, QueueName, TaskEnvelope, TaskId};

/// What the broker reports back after accepting a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: TaskId,
    pub queue: QueueName,
    pub max_retry: u32,
    pub ready_at: DateTime<Utc>,
}

/// Identifies one delivery of a task.
///
/// `attempt` grows every time the broker hands the task out, so a worker
/// whose lease expired cannot settle the delivery that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryTag {
    pub id: TaskId,
    pub attempt: u64,
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.attempt)
    }
}

/// One delivery of a task to a worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: TaskId,
    /// Delivery sequence number, starting at 1.
    pub attempt: u64,
    pub envelope: TaskEnvelope,
    pub queue: QueueName,
    /// Number of failed attempts before this one.
    pub retried: u32,
    pub max_retry: u32,
}

impl Delivery {
    pub fn tag(&self) -> DeliveryTag {
        DeliveryTag {
            id: self.id,
            attempt: self.attempt,
        }
    }
}

/// Outcome of reporting a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Scheduled for another attempt.
    Scheduled {
        retried: u32,
        ready_at: DateTime<Utc>,
    },
    /// Retry budget exhausted; the task was archived.
    Archived { retried: u32 },
}

/// Number of tasks per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub scheduled: usize,
    pub pending: usize,
    pub active: usize,
    pub retry: usize,
    pub archived: usize,
    pub completed: usize,
}

impl QueueCounts {
    /// Tasks that may still be delivered.
    pub fn outstanding(&self) -> usize {
        self.scheduled + self.pending + self.active + self.retry
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("task {0} is not in flight")]
    NotInFlight(TaskId),

    /// The lease expired and the task was delivered again.
    #[error("delivery {0} was superseded by a later one")]
    Superseded(DeliveryTag),

    #[error("broker is closed")]
    Closed,

    #[error("broker rejected the task: {0}")]
    Rejected(String),
}

impl BrokerError {
    /// Errors after which no further dequeue can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrokerError::Closed)
    }
}

/// Broker は配送キューの抽象化
///
/// # 契約
/// - `dequeue` は待たない。配送可能なタスクがなければ `Ok(None)`
/// - `dequeue` は `queues` の順に見て、最初に見つかったタスクを返す
/// - `ack` / `nack_*` は配送中（active）のタスクに対してのみ有効
/// - `ack` / `nack_*` は最新の配送の `DeliveryTag` でのみ受け付ける
/// - `nack_with_retry` は `retried` が `max_retry` に達していれば archive する
#[async_trait]
pub trait Broker: Send + Sync {
    async fn enqueue(
        &self,
        envelope: TaskEnvelope,
        options: &DeliveryOptions,
    ) -> Result<TaskInfo, BrokerError>;

    async fn dequeue(&self, queues: &[QueueName]) -> Result<Option<Delivery>, BrokerError>;

    async fn ack(&self, tag: DeliveryTag) -> Result<(), BrokerError>;

    async fn nack_with_retry(
        &self,
        tag: DeliveryTag,
        error: &str,
        delay: Duration,
    ) -> Result<RetryDisposition, BrokerError>;

    async fn nack_permanent(&self, tag: DeliveryTag, error: &str) -> Result<(), BrokerError>;

    async fn counts(&self) -> Result<QueueCounts, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_is_fatal() {
        assert!(BrokerError::Closed.is_fatal());
        assert!(!BrokerError::Unavailable("timeout".into()).is_fatal());
        assert!(!BrokerError::Rejected("too large".into()).is_fatal());
    }

    #[test]
    fn delivery_tag_names_the_attempt() {
        let id = TaskId::from_ulid(ulid::Ulid::from_parts(1_000, 1));
        let tag = DeliveryTag { id, attempt: 3 };
        assert_eq!(tag.to_string(), format!("{id}#3"));
        assert!(!BrokerError::Superseded(tag).is_fatal());
    }

    #[test]
    fn outstanding_excludes_terminal_states() {
        let counts = QueueCounts {
            scheduled: 1,
            pending: 2,
            active: 3,
            retry: 4,
            archived: 5,
            completed: 6,
        };
        assert_eq!(counts.outstanding(), 10);
    }
}

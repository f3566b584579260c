//! TaskContext - ハンドラに渡す配送メタデータ

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{QueueName, TaskId};
use crate::ports::Delivery;

/// Delivery metadata visible to a handler.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub id: TaskId,
    pub queue: QueueName,
    /// Failed attempts before this one.
    pub retried: u32,
    pub max_retry: u32,
    /// The processor cancels the handler once this instant passes.
    pub deadline: Instant,
}

impl TaskContext {
    pub fn from_delivery(delivery: &Delivery, timeout: Duration) -> Self {
        Self {
            id: delivery.id,
            queue: delivery.queue.clone(),
            retried: delivery.retried,
            max_retry: delivery.max_retry,
            deadline: Instant::now() + timeout,
        }
    }

    /// True when a failure of this attempt will not be retried.
    pub fn is_last_attempt(&self) -> bool {
        self.retried >= self.max_retry
    }
}

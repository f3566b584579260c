//! Distributor - タスクを broker に投入する
//!
//! # 設計
//! - broker は `Arc<dyn Broker>` で注入する（グローバルなクライアントは持たない）
//! - payload の encode 失敗は broker に触る前に返す
//! - 投入に成功したら状態は持たない（配送状態は broker が持つ）

use std::sync::Arc;

use tracing::{error, info, warn};

use super::post_commit::Effects;
use crate::domain::{DeliveryOptions, TaskEnvelope};
use crate::ports::{Broker, BrokerError, TaskInfo};
use crate::typed::{CodecError, PayloadCodec, Task};

#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error(transparent)]
    Encode(#[from] CodecError),

    #[error("failed to enqueue {task_type}: {source}")]
    Enqueue {
        task_type: String,
        #[source]
        source: BrokerError,
    },
}

/// Per-effect outcome of [`Distributor::flush`].
#[derive(Debug, Default)]
pub struct FlushReport {
    pub enqueued: Vec<TaskInfo>,
    pub failed: Vec<DistributeError>,
}

impl FlushReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Distributor {
    broker: Arc<dyn Broker>,
}

impl Distributor {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Encodes `task` and hands it to the broker.
    pub async fn distribute<T: Task>(
        &self,
        task: &T,
        options: DeliveryOptions,
    ) -> Result<TaskInfo, DistributeError> {
        let envelope = PayloadCodec::encode(task)?;
        self.distribute_envelope(envelope, options).await
    }

    /// Hands an already encoded task to the broker.
    pub async fn distribute_envelope(
        &self,
        envelope: TaskEnvelope,
        options: DeliveryOptions,
    ) -> Result<TaskInfo, DistributeError> {
        let task_type = envelope.task_type().to_string();
        let payload_size = envelope.payload_size();

        let info = self
            .broker
            .enqueue(envelope, &options)
            .await
            .map_err(|source| {
                warn!(
                    task_type = %task_type,
                    queue = %options.queue,
                    error = %source,
                    "failed to enqueue task"
                );
                DistributeError::Enqueue {
                    task_type: task_type.clone(),
                    source,
                }
            })?;

        info!(
            task.id = %info.id,
            task_type = %task_type,
            payload.size = payload_size,
            queue = %info.queue,
            max_retry = info.max_retry,
            ready_at = %info.ready_at,
            "enqueued task"
        );
        Ok(info)
    }

    /// Enqueues every effect, in order, continuing past failures.
    ///
    /// Call only after the transaction that produced `effects` committed.
    /// A failed enqueue does not undo the commit; it is reported back.
    pub async fn flush(&self, effects: Effects) -> FlushReport {
        let mut report = FlushReport::default();
        for pending in effects {
            match self
                .distribute_envelope(pending.envelope, pending.options)
                .await
            {
                Ok(info) => report.enqueued.push(info),
                Err(err) => {
                    error!(error = %err, "post-commit enqueue failed");
                    report.failed.push(err);
                }
            }
        }
        report
    }
}

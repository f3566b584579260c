//! WorkerLoop - タスク実行ループ
//!
//! # フロー
//! 1. QueueSelector でキューの参照順を決める
//! 2. Broker::dequeue() で配送を受け取る（なければ poll_interval 待つ）
//! 3. TypedRegistry::dispatch() を task_timeout 付きで実行
//! 4. 結果に応じて ack / nack_with_retry / nack_permanent

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use super::processor::{ErrorHandler, ProcessorInner};
use crate::domain::TaskError;
use crate::ports::{BrokerError, Delivery, RetryDisposition};
use crate::typed::TaskContext;

pub(crate) async fn worker_loop(
    worker_id: usize,
    inner: Arc<ProcessorInner>,
    mut shutdown_rx: watch::Receiver<bool>,
    fatal_tx: mpsc::Sender<BrokerError>,
) {
    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        let queues = inner.selector.order(&mut rand::thread_rng());
        let delivery = match inner.broker.dequeue(&queues).await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                idle(&inner, &mut shutdown_rx).await;
                continue;
            }
            Err(err) if err.is_fatal() => {
                error!(worker_id, error = %err, "dequeue failed");
                let _ = fatal_tx.try_send(err);
                break;
            }
            Err(err) => {
                warn!(worker_id, error = %err, "dequeue failed, backing off");
                idle(&inner, &mut shutdown_rx).await;
                continue;
            }
        };

        let span = info_span!(
            "task",
            worker_id,
            task.id = %delivery.id,
            task_type = %delivery.envelope.task_type(),
            payload.size = delivery.envelope.payload_size(),
            queue = %delivery.queue,
        );
        process(&inner, delivery).instrument(span).await;
    }
}

async fn idle(inner: &ProcessorInner, shutdown_rx: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(inner.poll_interval) => {}
        _ = shutdown_rx.changed() => {}
    }
}

/// Aborts the handler task if the worker stops waiting for it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn execute(inner: &ProcessorInner, ctx: &TaskContext, delivery: &Delivery) -> Result<(), TaskError> {
    let registry = Arc::clone(&inner.registry);
    let handler_ctx = ctx.clone();
    let envelope = delivery.envelope.clone();
    let mut handle = AbortOnDrop(tokio::spawn(async move {
        registry.dispatch(&handler_ctx, &envelope).await
    }));

    match tokio::time::timeout_at(ctx.deadline, &mut handle.0).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => Err(TaskError::transient("handler panicked")),
        Ok(Err(_)) => Err(TaskError::transient("handler was cancelled")),
        Err(_) => Err(TaskError::transient(format!(
            "handler did not finish within {:?}",
            inner.task_timeout
        ))),
    }
}

/// Error text stored by the broker: the error plus its sources.
fn describe(err: &TaskError) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Runs the user hook; a panic in it must not take the worker down.
fn notify(handler: &dyn ErrorHandler, delivery: &Delivery, err: &TaskError) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler.handle_error(delivery, err))) {
        error!(panic = panic_message(payload.as_ref()), "error handler panicked");
    }
}

async fn process(inner: &ProcessorInner, delivery: Delivery) {
    let ctx = TaskContext::from_delivery(&delivery, inner.task_timeout);
    let result = execute(inner, &ctx, &delivery).await;

    let err = match result {
        Ok(()) => {
            match inner.broker.ack(delivery.tag()).await {
                Ok(()) => info!(retried = delivery.retried, "processed task"),
                Err(BrokerError::Superseded(tag)) => {
                    warn!(%tag, "lease expired before the task finished, result dropped");
                }
                Err(err) => error!(error = %err, "could not acknowledge task"),
            }
            return;
        }
        Err(err) => err,
    };

    let message = describe(&err);
    error!(
        error = %message,
        kind = %err.kind(),
        retried = delivery.retried,
        max_retry = delivery.max_retry,
        "task processing error"
    );
    if let Some(handler) = &inner.error_handler {
        notify(handler.as_ref(), &delivery, &err);
    }

    if !err.is_retryable() {
        match inner.broker.nack_permanent(delivery.tag(), &message).await {
            Ok(()) => warn!("task archived without retry"),
            Err(err) => error!(error = %err, "could not archive task"),
        }
        return;
    }

    let delay = inner.retry.next_delay(delivery.retried.saturating_add(1));
    match inner
        .broker
        .nack_with_retry(delivery.tag(), &message, delay)
        .await
    {
        Ok(RetryDisposition::Scheduled { retried, ready_at }) => {
            info!(retried, %ready_at, "task scheduled for retry");
        }
        Ok(RetryDisposition::Archived { retried }) => {
            error!(retried, "retries exhausted, task archived");
        }
        Err(err) => error!(error = %err, "could not schedule retry"),
    }
}

//! Processor - ワーカープールでタスクを実行する
//!
//! # ライフサイクル
//! 1. `ProcessorBuilder::build()` で handler の網羅性と設定を検証
//! 2. `start()` が `concurrency` 個のワーカーを起動し、停止までブロック
//! 3. `ShutdownHandle::shutdown()` でデキューを止め、実行中のタスクを待つ
//!    (`shutdown_timeout` を過ぎたら abort。未 ack のタスクは lease 切れで再配送)

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::builder::ProcessorBuilder;
use super::retry::RetryPolicy;
use super::selector::QueueSelector;
use super::worker_loop::worker_loop;
use crate::domain::TaskError;
use crate::ports::{Broker, BrokerError, Delivery};
use crate::typed::TypedRegistry;

/// Hook invoked for every failed attempt, after it has been logged.
pub trait ErrorHandler: Send + Sync {
    fn handle_error(&self, delivery: &Delivery, error: &TaskError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&Delivery, &TaskError) + Send + Sync,
{
    fn handle_error(&self, delivery: &Delivery, error: &TaskError) {
        self(delivery, error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("processor is already running")]
    AlreadyRunning,

    #[error("broker failed: {0}")]
    Broker(#[from] BrokerError),
}

/// Everything a worker needs, shared by all workers.
pub(crate) struct ProcessorInner {
    pub(crate) broker: Arc<dyn Broker>,
    pub(crate) registry: Arc<TypedRegistry>,
    pub(crate) selector: QueueSelector,
    pub(crate) retry: RetryPolicy,
    pub(crate) error_handler: Option<Arc<dyn ErrorHandler>>,
    pub(crate) concurrency: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) task_timeout: Duration,
    pub(crate) shutdown_timeout: Duration,
}

pub struct Processor {
    inner: Arc<ProcessorInner>,
    shutdown: Arc<watch::Sender<bool>>,
    started: AtomicBool,
}

/// Requests a graceful stop of a running (or not yet started) processor.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Processor {
    pub fn builder(broker: Arc<dyn Broker>) -> ProcessorBuilder {
        ProcessorBuilder::new(broker)
    }

    pub(crate) fn from_inner(inner: ProcessorInner) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(inner),
            shutdown: Arc::new(tx),
            started: AtomicBool::new(false),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown),
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Runs the worker pool until shutdown is requested or the broker fails.
    ///
    /// Returns `Ok` after a requested shutdown and `Err` if the broker
    /// reported a fatal error. A processor can only be started once.
    pub async fn start(&self) -> Result<(), ProcessorError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ProcessorError::AlreadyRunning);
        }

        let inner = &self.inner;
        let (fatal_tx, mut fatal_rx) = mpsc::channel::<BrokerError>(1);
        let mut workers = JoinSet::new();
        let spawn_worker = |workers: &mut JoinSet<()>, worker_id: usize| {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(inner),
                self.shutdown.subscribe(),
                fatal_tx.clone(),
            ));
        };
        for worker_id in 0..inner.concurrency {
            spawn_worker(&mut workers, worker_id);
        }
        let mut next_worker_id = inner.concurrency;

        info!(
            concurrency = inner.concurrency,
            queues = ?inner.selector.lanes(),
            strict_priority = inner.selector.is_strict(),
            "processor started"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let outcome = loop {
            tokio::select! {
                _ = async {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                } => break Ok(()),
                Some(err) = fatal_rx.recv() => {
                    error!(error = %err, "broker failed, stopping processor");
                    break Err(ProcessorError::Broker(err));
                }
                // ワーカーが panic したら補充してプールの大きさを保つ
                Some(joined) = workers.join_next() => {
                    if let Err(err) = joined
                        && err.is_panic()
                    {
                        error!(error = %err, replacement = next_worker_id, "worker panicked, starting a replacement");
                        spawn_worker(&mut workers, next_worker_id);
                        next_worker_id += 1;
                    }
                }
            }
        };
        drop(fatal_tx);

        // ワーカーにデキュー停止を通知（fatal の場合も同じ経路で止める）
        self.shutdown.send_replace(true);
        info!("waiting for in-flight tasks");

        let drained = tokio::time::timeout(inner.shutdown_timeout, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(err) = joined
                    && err.is_panic()
                {
                    error!(error = %err, "worker panicked");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = workers.len(),
                "shutdown timeout elapsed, aborting in-flight tasks"
            );
            workers.shutdown().await;
        }

        info!("processor stopped");
        outcome
    }
}

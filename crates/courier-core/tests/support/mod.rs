#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use courier_core::app::{Processor, ProcessorError};
use courier_core::settings::ProcessorSettings;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Settings that keep integration tests fast.
pub fn fast_settings() -> ProcessorSettings {
    ProcessorSettings {
        concurrency: 2,
        poll_interval_ms: 5,
        task_timeout_secs: 5,
        shutdown_timeout_secs: 2,
        ..ProcessorSettings::default()
    }
}

pub fn spawn_processor(processor: &Arc<Processor>) -> JoinHandle<Result<(), ProcessorError>> {
    let processor = Arc::clone(processor);
    tokio::spawn(async move { processor.start().await })
}

/// Polls `check` until it holds, failing the test after five seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

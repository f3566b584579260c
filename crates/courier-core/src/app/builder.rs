//! ProcessorBuilder - Processor の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use super::processor::{ErrorHandler, Processor, ProcessorInner};
use super::retry::RetryPolicy;
use super::selector::QueueSelector;
use crate::domain::TaskKind;
use crate::ports::Broker;
use crate::settings::ProcessorSettings;
use crate::typed::{Handler, RegistryError, Task, TypedRegistry};

/// ProcessorBuilder は Processor を構築
///
/// # 使用例
/// ```ignore
/// let processor = Processor::builder(broker)
///     .register::<SendVerifyEmail, _>(handler)?
///     .settings(settings.processor.clone())
///     .retry_policy(RetryPolicy::from(&settings.retry))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に TaskKind::ALL が全て登録済みかチェック
/// - 不足があれば BuildError::MissingHandlers を返す
pub struct ProcessorBuilder {
    broker: Arc<dyn Broker>,
    registry: TypedRegistry,
    settings: ProcessorSettings,
    retry: RetryPolicy,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

/// BuildError は Processor 構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("missing handlers for task types: {0:?}")]
    MissingHandlers(Vec<TaskKind>),

    #[error("at least one queue must be configured")]
    NoQueues,

    #[error("queue {0:?} has weight 0")]
    ZeroWeight(String),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

impl ProcessorBuilder {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            registry: TypedRegistry::new(),
            settings: ProcessorSettings::default(),
            retry: RetryPolicy::default(),
            error_handler: None,
        }
    }

    /// Handler を登録
    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn settings(mut self, settings: ProcessorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 失敗したタスクごとに呼ばれるフック
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// # 検証
    /// - すべての TaskKind に handler が登録されているか
    /// - キューが 1 つ以上あり、重みがすべて 1 以上か
    /// - concurrency が 1 以上か
    pub fn build(self) -> Result<Processor, BuildError> {
        let missing = self.registry.missing_kinds();
        if !missing.is_empty() {
            return Err(BuildError::MissingHandlers(missing));
        }
        if self.settings.concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }
        let lanes = self.settings.queue_weights();
        if lanes.is_empty() {
            return Err(BuildError::NoQueues);
        }
        if let Some((name, _)) = lanes.iter().find(|(_, weight)| *weight == 0) {
            return Err(BuildError::ZeroWeight(name.to_string()));
        }

        Ok(Processor::from_inner(ProcessorInner {
            broker: self.broker,
            registry: Arc::new(self.registry),
            selector: QueueSelector::new(lanes, self.settings.strict_priority),
            retry: self.retry,
            error_handler: self.error_handler,
            concurrency: self.settings.concurrency,
            poll_interval: self.settings.poll_interval(),
            task_timeout: self.settings.task_timeout(),
            shutdown_timeout: self.settings.shutdown_timeout(),
        }))
    }
}

//! Handler trait - Task を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Object-safe trait (DynHandler)
//! - Type erasure パターン (TypedHandler<T, H> → DynHandler)

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::codec::PayloadCodec;
use super::context::TaskContext;
use super::task::Task;
use crate::domain::{TaskEnvelope, TaskError, TaskKind};

/// Handler は Task を実行する
///
/// # 使用例
/// ```ignore
/// struct SendVerifyEmailHandler;
///
/// #[async_trait]
/// impl Handler<SendVerifyEmail> for SendVerifyEmailHandler {
///     async fn handle(&self, ctx: &TaskContext, task: SendVerifyEmail) -> Result<(), TaskError> {
///         tracing::info!(task.id = %ctx.id, username = %task.username, "sending");
///         Ok(())
///     }
/// }
/// ```
///
/// # エラーの返し方
/// - `TaskError::transient`: リトライされる（max_retry まで）
/// - `TaskError::permanent`: 即 archive、再実行されない
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, ctx: &TaskContext, task: T) -> Result<(), TaskError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// TypedHandler<T, H> を DynHandler に変換することで、
/// HashMap<TaskKind, Arc<dyn DynHandler>> に格納可能にします。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, ctx: &TaskContext, envelope: &TaskEnvelope)
    -> Result<(), TaskError>;

    fn kind(&self) -> TaskKind;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(
        &self,
        ctx: &TaskContext,
        envelope: &TaskEnvelope,
    ) -> Result<(), TaskError> {
        // decode できない payload は何度やっても decode できない
        let task: T = PayloadCodec::decode(envelope)
            .map_err(|e| TaskError::permanent("malformed payload").with_source(e))?;
        self.handler.handle(ctx, task).await
    }

    fn kind(&self) -> TaskKind {
        T::KIND
    }
}

/// クロージャを Handler として使うためのラッパー
pub struct HandlerFn<F>(F);

/// Wraps an async closure as a [`Handler`].
///
/// ```ignore
/// registry.register::<SendVerifyEmail, _>(handler_fn(|_ctx, task: SendVerifyEmail| async move {
///     println!("{}", task.username);
///     Ok(())
/// }))?;
/// ```
pub fn handler_fn<T, F, Fut>(f: F) -> HandlerFn<F>
where
    T: Task,
    F: Fn(TaskContext, T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    HandlerFn(f)
}

#[async_trait]
impl<T, F, Fut> Handler<T> for HandlerFn<F>
where
    T: Task,
    F: Fn(TaskContext, T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    async fn handle(&self, ctx: &TaskContext, task: T) -> Result<(), TaskError> {
        (self.0)(ctx.clone(), task).await
    }
}

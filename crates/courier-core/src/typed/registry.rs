//! TypedRegistry - Handler の登録とディスパッチ
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - 閉じた enum (TaskKind) による網羅性チェック

use std::collections::HashMap;
use std::sync::Arc;

use super::context::TaskContext;
use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;
use crate::domain::{TaskEnvelope, TaskError, TaskKind};

/// TypedRegistry は型付き Handler を登録・管理
///
/// # 使用例
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<SendVerifyEmail, _>(handler)?;
/// registry.dispatch(&ctx, &envelope).await?;
/// ```
///
/// # 内部実装
/// - `register::<T, H>(handler)` で登録
/// - 内部的に TypedHandler でラップして DynHandler に変換
/// - HashMap<TaskKind, Arc<dyn DynHandler>> で管理
#[derive(Default, Clone)]
pub struct TypedRegistry {
    handlers: HashMap<TaskKind, Arc<dyn DynHandler>>,
}

/// RegistryError は TypedRegistry の操作エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for task type '{0}' is already registered")]
    AlreadyRegistered(TaskKind),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&T::KIND) {
            return Err(RegistryError::AlreadyRegistered(T::KIND));
        }
        self.handlers
            .insert(T::KIND, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Registered kinds, in declaration order.
    pub fn registered_kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Kinds in [`TaskKind::ALL`] that have no handler yet.
    pub fn missing_kinds(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .iter()
            .copied()
            .filter(|kind| !self.handlers.contains_key(kind))
            .collect()
    }

    /// Routes an envelope to the handler registered for its type.
    ///
    /// 未知の task_type / handler 未登録は恒久エラー（リトライしても直らない）
    pub async fn dispatch(
        &self,
        ctx: &TaskContext,
        envelope: &TaskEnvelope,
    ) -> Result<(), TaskError> {
        let kind = envelope
            .kind()
            .map_err(|e| TaskError::permanent("unregistered task type").with_source(e))?;
        let handler = self.get(kind).ok_or_else(|| {
            TaskError::permanent(format!("no handler registered for {kind}"))
        })?;
        handler.handle_dyn(ctx, envelope).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::domain::{ErrorKind, QueueName, TaskId};
    use crate::typed::codec::test_tasks::Greeting;
    use crate::typed::{PayloadCodec, handler_fn};
    use ulid::Ulid;

    fn ctx() -> TaskContext {
        TaskContext {
            id: TaskId::from_ulid(Ulid::new()),
            queue: QueueName::DEFAULT,
            retried: 0,
            max_retry: 3,
            deadline: tokio::time::Instant::now() + Duration::from_secs(5),
        }
    }

    fn counting_handler(
        counter: Arc<AtomicUsize>,
    ) -> impl Handler<Greeting> + 'static {
        handler_fn(move |_ctx, _task: Greeting| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = TypedRegistry::new();
        registry
            .register::<Greeting, _>(counting_handler(Arc::default()))
            .unwrap();

        let retrieved = registry.get(TaskKind::SendVerifyEmail);
        assert!(retrieved.is_some());
        assert_eq!(registry.registered_kinds(), vec![TaskKind::SendVerifyEmail]);
        assert!(registry.missing_kinds().is_empty());
    }

    #[test]
    fn test_double_registration() {
        let mut registry = TypedRegistry::new();
        registry
            .register::<Greeting, _>(counting_handler(Arc::default()))
            .unwrap();
        let result = registry.register::<Greeting, _>(counting_handler(Arc::default()));
        assert_eq!(
            result,
            Err(RegistryError::AlreadyRegistered(TaskKind::SendVerifyEmail))
        );
    }

    #[test]
    fn empty_registry_reports_every_kind_missing() {
        let registry = TypedRegistry::new();
        assert_eq!(registry.missing_kinds(), TaskKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn dispatch_routes_to_the_registered_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut registry = TypedRegistry::new();
        registry
            .register::<Greeting, _>(counting_handler(seen.clone()))
            .unwrap();

        let envelope = PayloadCodec::encode(&Greeting {
            username: "bob".into(),
        })
        .unwrap();
        registry.dispatch(&ctx(), &envelope).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_type_is_a_permanent_failure() {
        let registry = TypedRegistry::new();
        let envelope = TaskEnvelope::new("task:unknown", b"{}".to_vec());
        let err = registry.dispatch(&ctx(), &envelope).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn known_type_without_handler_is_a_permanent_failure() {
        let registry = TypedRegistry::new();
        let envelope = TaskEnvelope::new(TaskKind::SendVerifyEmail.as_str(), b"{}".to_vec());
        let err = registry.dispatch(&ctx(), &envelope).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert!(err.message().contains("task:send_verify_email"));
    }
}

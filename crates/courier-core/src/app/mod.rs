//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Distributor**: タスクの投入
//! - **ProcessorBuilder / Processor**: 起動時検証とワーカープール
//! - **WorkerLoop**: dequeue→dispatch→ack/nack
//! - **QueueSelector**: 重み付きキュー選択
//! - **RetryPolicy**: バックオフ計算
//! - **post_commit**: コミット後の副作用

pub mod builder;
pub mod distributor;
pub mod post_commit;
pub mod processor;
pub mod retry;
pub mod selector;
mod worker_loop;

pub use self::builder::{BuildError, ProcessorBuilder};
pub use self::distributor::{DistributeError, Distributor, FlushReport};
pub use self::post_commit::{Committed, Effects, PendingTask};
pub use self::processor::{ErrorHandler, Processor, ProcessorError, ShutdownHandle};
pub use self::retry::RetryPolicy;
pub use self::selector::QueueSelector;

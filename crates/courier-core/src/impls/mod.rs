//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryBroker**: 開発用の broker
//! - **InMemoryUserStore**: 開発用のユーザーストア
//! - **LogMailer**: ログに出すだけの Mailer
//!
//! 本番用の broker / ストア / メール送信は別クレートに配置します。

pub mod inmem_broker;
pub mod inmem_store;
pub mod log_mailer;

pub use self::inmem_broker::{InMemoryBroker, TaskRecord};
pub use self::inmem_store::InMemoryUserStore;
pub use self::log_mailer::LogMailer;

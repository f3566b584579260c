//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（broker, ユーザーストア, メール送信）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//! 実装はすべて `Arc<dyn ...>` で注入します（グローバルなクライアントは持たない）。

pub mod broker;
pub mod clock;
pub mod id_generator;
pub mod mailer;
pub mod user_store;

pub use self::broker::{
    Broker, BrokerError, Delivery, DeliveryTag, QueueCounts, RetryDisposition, TaskInfo,
};
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::mailer::{Email, MailError, Mailer};
pub use self::user_store::{StoreError, User, UserStore};

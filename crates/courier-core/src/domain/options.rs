//! DeliveryOptions - キュー名、リトライ上限、実行時刻の指定
//!
//! Options are advisory input to the broker. Once a task has been
//! accepted the distributor keeps nothing; the broker owns delivery state.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broker-side default for the retry budget of a task.
pub const DEFAULT_MAX_RETRY: u32 = 25;

/// Name of a priority lane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(Cow<'static, str>);

impl QueueName {
    pub const CRITICAL: QueueName = QueueName(Cow::Borrowed("critical"));
    pub const DEFAULT: QueueName = QueueName(Cow::Borrowed("default"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn critical() -> Self {
        Self::CRITICAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueueName {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// When a task becomes eligible for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    #[default]
    Immediate,
    /// Relative to the moment the broker accepts the task.
    In(Duration),
    At(DateTime<Utc>),
}

impl Schedule {
    /// Absolute eligibility time given the broker's current time.
    pub fn ready_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::Immediate => now,
            Schedule::In(delay) => chrono::Duration::from_std(delay)
                .ok()
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Schedule::At(at) => at,
        }
    }
}

/// Queue, retry budget and schedule for one enqueue call.
///
/// # 使用例
/// ```ignore
/// let opts = DeliveryOptions::default()
///     .max_retry(10)
///     .process_in(Duration::from_secs(10))
///     .queue(QueueName::critical());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub queue: QueueName,
    pub max_retry: u32,
    pub schedule: Schedule,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            queue: QueueName::DEFAULT,
            max_retry: DEFAULT_MAX_RETRY,
            schedule: Schedule::Immediate,
        }
    }
}

impl DeliveryOptions {
    pub fn queue(mut self, queue: QueueName) -> Self {
        self.queue = queue;
        self
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn process_in(mut self, delay: Duration) -> Self {
        self.schedule = Schedule::In(delay);
        self
    }

    pub fn process_at(mut self, at: DateTime<Utc>) -> Self {
        self.schedule = Schedule::At(at);
        self
    }
}

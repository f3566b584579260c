//! Post-commit effects - コミット後にだけ実行する副作用
//!
//! A domain operation that must enqueue work records the enqueue as an
//! effect instead of talking to the broker inside its transaction. The
//! caller flushes the effects through [`Distributor::flush`] once the
//! transaction has committed; if the transaction rolls back the effects are
//! simply dropped.
//!
//! # 使用例
//! ```ignore
//! let committed = create_user_tx(&store, params)?; // Committed<User>
//! let (user, effects) = committed.into_parts();
//! let report = distributor.flush(effects).await;
//! ```
//!
//! [`Distributor::flush`]: super::Distributor::flush

use crate::domain::{DeliveryOptions, TaskEnvelope};
use crate::typed::{CodecError, PayloadCodec, Task};

/// An encoded task waiting for its transaction to commit.
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub envelope: TaskEnvelope,
    pub options: DeliveryOptions,
}

/// Enqueues to run after commit, in the order they were recorded.
#[derive(Debug, Clone, Default)]
#[must_use = "effects do nothing until flushed"]
pub struct Effects {
    pending: Vec<PendingTask>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an enqueue.
    ///
    /// The payload is encoded now so an unserializable task fails inside the
    /// transaction and can roll it back.
    pub fn enqueue<T: Task>(
        &mut self,
        task: &T,
        options: DeliveryOptions,
    ) -> Result<(), CodecError> {
        let envelope = PayloadCodec::encode(task)?;
        self.pending.push(PendingTask { envelope, options });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTask> {
        self.pending.iter()
    }
}

impl IntoIterator for Effects {
    type Item = PendingTask;
    type IntoIter = std::vec::IntoIter<PendingTask>;

    fn into_iter(self) -> Self::IntoIter {
        self.pending.into_iter()
    }
}

/// The result of a committed domain operation plus its deferred effects.
#[derive(Debug)]
#[must_use = "the effects of a committed operation must be flushed"]
pub struct Committed<T> {
    pub value: T,
    pub effects: Effects,
}

impl<T> Committed<T> {
    pub fn new(value: T, effects: Effects) -> Self {
        Self { value, effects }
    }

    pub fn into_parts(self) -> (T, Effects) {
        (self.value, self.effects)
    }
}

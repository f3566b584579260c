//! TaskEnvelope: the unit of work handed to a broker.

use serde::{Deserialize, Serialize};

use super::task_kind::{TaskKind, UnknownTaskKind};

/// A task type name plus its opaque serialized payload.
///
/// Delivery options are deliberately not part of the envelope: the same
/// envelope can be enqueued on any lane with any retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_type: String,
    payload: Vec<u8>,
}

impl TaskEnvelope {
    pub fn new(task_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            task_type: task_type.into(),
            payload: payload.into(),
        }
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// Resolves the wire name into a known [`TaskKind`].
    pub fn kind(&self) -> Result<TaskKind, UnknownTaskKind> {
        self.task_type.parse()
    }
}

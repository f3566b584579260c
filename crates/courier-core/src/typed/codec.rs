//! PayloadCodec - Task と payload bytes の相互変換
//!
//! Payloads are JSON. Encoding happens before the broker is contacted so a
//! bad payload never reaches a queue.

use super::task::Task;
use crate::domain::{TaskEnvelope, TaskKind};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode {kind} payload: {source}")]
    Encode {
        kind: TaskKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {kind} payload: {source}")]
    Decode {
        kind: TaskKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("envelope carries {found:?}, expected {expected}")]
    KindMismatch { expected: TaskKind, found: String },
}

/// PayloadCodec は T と TaskEnvelope を相互変換
///
/// # フロー
/// 1. encode: serde_json で bytes にして `T::KIND` の wire 名を付ける
/// 2. decode: wire 名を確認してから serde_json で T に復元
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec;

impl PayloadCodec {
    pub fn encode<T: Task>(task: &T) -> Result<TaskEnvelope, CodecError> {
        let payload = serde_json::to_vec(task).map_err(|source| CodecError::Encode {
            kind: T::KIND,
            source,
        })?;
        Ok(TaskEnvelope::new(T::KIND.as_str(), payload))
    }

    pub fn decode<T: Task>(envelope: &TaskEnvelope) -> Result<T, CodecError> {
        if envelope.task_type() != T::KIND.as_str() {
            return Err(CodecError::KindMismatch {
                expected: T::KIND,
                found: envelope.task_type().to_string(),
            });
        }
        serde_json::from_slice(envelope.payload()).map_err(|source| CodecError::Decode {
            kind: T::KIND,
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_tasks {
    use serde::{Deserialize, Serialize};

    use super::Task;
    use crate::domain::TaskKind;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Greeting {
        pub username: String,
    }

    impl Task for Greeting {
        const KIND: TaskKind = TaskKind::SendVerifyEmail;
    }
}

#[cfg(test)]
mod tests {
    use super::test_tasks::Greeting;
    use super::*;
    use rstest::rstest;

    #[test]
    fn round_trips_payload() {
        let task = Greeting {
            username: "alice".into(),
        };
        let envelope = PayloadCodec::encode(&task).unwrap();
        assert_eq!(envelope.task_type(), "task:send_verify_email");
        assert_eq!(envelope.payload(), br#"{"username":"alice"}"#);

        let back: Greeting = PayloadCodec::decode(&envelope).unwrap();
        assert_eq!(back, task);
    }

    #[rstest]
    #[case::not_json(b"not json".as_slice())]
    #[case::missing_field(br#"{"name":"alice"}"#.as_slice())]
    #[case::wrong_type(br#"{"username":42}"#.as_slice())]
    fn malformed_payloads_fail_to_decode(#[case] payload: &[u8]) {
        let envelope = TaskEnvelope::new(TaskKind::SendVerifyEmail.as_str(), payload.to_vec());
        let err = PayloadCodec::decode::<Greeting>(&envelope).unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn refuses_envelopes_of_another_type() {
        let envelope = TaskEnvelope::new("task:other", br#"{"username":"alice"}"#.to_vec());
        let err = PayloadCodec::decode::<Greeting>(&envelope).unwrap_err();
        assert!(matches!(err, CodecError::KindMismatch { .. }));
    }
}

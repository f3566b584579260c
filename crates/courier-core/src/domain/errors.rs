//! Errors - ハンドラ実行エラーと分類
//!
//! Handlers report failures as [`TaskError`]. The [`ErrorKind`] decides
//! what the processor does with the delivery.

use std::fmt;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（リトライ対象）
/// - Permanent: 恒久的なエラー（即 archive）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => f.write_str("transient"),
            ErrorKind::Permanent => f.write_str("permanent"),
        }
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// TaskError はハンドラが返すエラー
#[derive(Debug, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct TaskError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TaskError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn display_includes_kind_and_message() {
        let err = TaskError::permanent("bad payload");
        assert_eq!(err.to_string(), "permanent failure: bad payload");
        assert!(!err.is_retryable());
    }

    #[test]
    fn source_is_exposed() {
        let io = std::io::Error::other("connection reset");
        let err = TaskError::transient("smtp").with_source(io);
        assert!(err.is_retryable());
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("connection reset"));
    }
}

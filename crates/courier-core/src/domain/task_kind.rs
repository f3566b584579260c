//! The closed set of task kinds this system knows how to run.
//!
//! Brokers only carry the wire name (a plain string). Every place that
//! routes on it goes through [`TaskKind`] so a typo or an unknown name is
//! caught when it is parsed instead of silently falling through a string
//! lookup.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Every task type registered with the system.
///
/// Adding a variant forces [`TaskKind::as_str`] to be updated, and
/// processors refuse to build until a handler is registered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Sends the email address verification message to a new user.
    SendVerifyEmail,
}

impl TaskKind {
    /// All variants, in declaration order.
    pub const ALL: &'static [TaskKind] = &[TaskKind::SendVerifyEmail];

    /// Name used on the wire and in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskKind::SendVerifyEmail => "task:send_verify_email",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized task type {0:?}")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTaskKind(s.to_string()))
    }
}

//! Domain model (ids, task kinds, envelopes, delivery options, states, errors).

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod options;
pub mod state;
pub mod task_kind;

pub use self::envelope::TaskEnvelope;
pub use self::errors::{ErrorKind, TaskError};
pub use self::ids::TaskId;
pub use self::options::{DeliveryOptions, QueueName, Schedule, DEFAULT_MAX_RETRY};
pub use self::state::TaskState;
pub use self::task_kind::{TaskKind, UnknownTaskKind};

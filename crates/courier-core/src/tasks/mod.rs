//! Task definitions and their handlers.

pub mod send_verify_email;

pub use self::send_verify_email::{NotFoundPolicy, SendVerifyEmail, SendVerifyEmailHandler};

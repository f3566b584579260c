//! task:send_verify_email - 新規ユーザーに確認メールを送る

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{TaskError, TaskKind};
use crate::ports::{Email, Mailer, StoreError, UserStore};
use crate::typed::{Handler, Task, TaskContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendVerifyEmail {
    pub username: String,
}

impl Task for SendVerifyEmail {
    const KIND: TaskKind = TaskKind::SendVerifyEmail;
}

/// What to do when the user the task refers to does not exist.
///
/// The task is usually enqueued right after the user row is written, so a
/// miss can mean "not visible yet" rather than "never will be".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotFoundPolicy {
    /// Treat as transient; bounded by the task's retry budget.
    #[default]
    Retry,
    /// Give up immediately.
    Discard,
}

pub struct SendVerifyEmailHandler {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    not_found: NotFoundPolicy,
}

impl SendVerifyEmailHandler {
    pub fn new(store: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            mailer,
            not_found: NotFoundPolicy::default(),
        }
    }

    pub fn not_found_policy(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }
}

#[async_trait]
impl Handler<SendVerifyEmail> for SendVerifyEmailHandler {
    async fn handle(&self, ctx: &TaskContext, task: SendVerifyEmail) -> Result<(), TaskError> {
        let user = match self.store.get_user(&task.username).await {
            Ok(user) => user,
            Err(err @ StoreError::NotFound(_)) => {
                return Err(match self.not_found {
                    NotFoundPolicy::Retry => TaskError::transient("user not found"),
                    NotFoundPolicy::Discard => TaskError::permanent("user not found"),
                }
                .with_source(err));
            }
            Err(err) => return Err(TaskError::transient("could not get user").with_source(err)),
        };

        info!(
            task.id = %ctx.id,
            task_type = %SendVerifyEmail::KIND,
            email = %user.email,
            "sending verify email"
        );

        let email = Email {
            subject: "Welcome! Please verify your email address".to_string(),
            content: format!(
                "Hello {},\n\nThank you for registering with us.\n\
                 Please verify your email address to activate your account.\n",
                user.full_name
            ),
            to: vec![user.email],
            ..Email::default()
        };
        self.mailer.send_email(email).await.map_err(|err| {
            let wrapped = if err.is_retryable() {
                TaskError::transient("could not send verify email")
            } else {
                TaskError::permanent("could not send verify email")
            };
            wrapped.with_source(err)
        })
    }
}

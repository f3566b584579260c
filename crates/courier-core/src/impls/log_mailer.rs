//! LogMailer - メールを送らずにログに出すだけの Mailer

use async_trait::async_trait;
use tracing::info;

use crate::ports::{Email, MailError, Mailer};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_email(&self, email: Email) -> Result<(), MailError> {
        if let Some(bad) = email.to.iter().find(|addr| !addr.contains('@')) {
            return Err(MailError::InvalidRecipient(bad.clone()));
        }
        info!(
            to = ?email.to,
            cc = ?email.cc,
            bcc = ?email.bcc,
            subject = %email.subject,
            content.size = email.content.len(),
            "email sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_recipients() {
        let email = Email {
            subject: "hi".into(),
            to: vec!["not-an-address".into()],
            ..Email::default()
        };
        assert_eq!(
            LogMailer.send_email(email).await,
            Err(MailError::InvalidRecipient("not-an-address".into()))
        );
    }
}

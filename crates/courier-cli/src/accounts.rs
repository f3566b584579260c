//! Sign-up flow: store the user, then queue the verification email.

use std::time::Duration;

use anyhow::Context;
use courier_core::app::{Committed, Distributor, Effects};
use courier_core::domain::{DeliveryOptions, QueueName};
use courier_core::impls::InMemoryUserStore;
use courier_core::ports::User;
use courier_core::tasks::SendVerifyEmail;
use tracing::{info, warn};

/// Retry budget and delay used for the verification email.
fn verify_email_options() -> DeliveryOptions {
    DeliveryOptions::default()
        .max_retry(10)
        .process_in(Duration::from_secs(10))
        .queue(QueueName::critical())
}

/// Writes the user and records the follow-up enqueue without sending it.
///
/// The effect is encoded before the write so a bad payload aborts the whole
/// operation and nothing is stored.
pub async fn create_user_tx(store: &InMemoryUserStore, user: User) -> anyhow::Result<Committed<User>> {
    let mut effects = Effects::new();
    effects.enqueue(
        &SendVerifyEmail {
            username: user.username.clone(),
        },
        verify_email_options(),
    )?;

    store
        .insert(user.clone())
        .await
        .with_context(|| format!("could not create user {:?}", user.username))?;
    Ok(Committed::new(user, effects))
}

/// Creates a user and, once stored, queues the verification email.
///
/// A failed enqueue is logged and does not undo the sign-up.
pub async fn create_user(
    store: &InMemoryUserStore,
    distributor: &Distributor,
    user: User,
) -> anyhow::Result<User> {
    let (user, effects) = create_user_tx(store, user).await?.into_parts();
    let report = distributor.flush(effects).await;
    if report.is_complete() {
        info!(username = %user.username, "user created");
    } else {
        warn!(
            username = %user.username,
            failed = report.failed.len(),
            "user created but verification email was not queued"
        );
    }
    Ok(user)
}

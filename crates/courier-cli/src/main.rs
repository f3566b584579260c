mod accounts;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use courier_core::app::{Distributor, Processor, RetryPolicy};
use courier_core::domain::TaskError;
use courier_core::impls::{InMemoryBroker, InMemoryUserStore, LogMailer};
use courier_core::ports::{Broker, Delivery, User};
use courier_core::settings::Settings;
use courier_core::tasks::{SendVerifyEmail, SendVerifyEmailHandler};
use courier_core::telemetry;
use tracing::{debug, info};

/// Runs a task processor against an in-memory broker and signs up a few
/// demo users so there is something to process.
#[derive(Debug, Parser)]
#[command(name = "courier", version)]
struct Cli {
    /// Path to a TOML settings file.
    #[arg(long, env = "COURIER_SETTINGS")]
    config: Option<PathBuf>,

    /// Number of demo users to sign up at startup.
    #[arg(long, default_value_t = 3)]
    demo_users: usize,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    run_for_secs: Option<u64>,
}

/// Keeps the in-memory broker from growing without bound.
async fn purge_finished_tasks(broker: Arc<InMemoryBroker>, every: Duration, retention: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let purged = broker.purge_terminal(retention).await;
        if purged > 0 {
            info!(purged, "purged finished tasks");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("could not load settings")?;
    telemetry::init(&settings.logging)?;

    let broker = Arc::new(InMemoryBroker::new(&settings.broker));
    let store = Arc::new(InMemoryUserStore::new());

    let processor = Processor::builder(broker.clone())
        .register::<SendVerifyEmail, _>(SendVerifyEmailHandler::new(
            store.clone(),
            Arc::new(LogMailer),
        ))?
        .settings(settings.processor.clone())
        .retry_policy(RetryPolicy::from(&settings.retry))
        .error_handler(|delivery: &Delivery, _err: &TaskError| {
            debug!(
                task_type = %delivery.envelope.task_type(),
                payload = %String::from_utf8_lossy(delivery.envelope.payload()),
                "failed task payload"
            );
        })
        .build()?;
    let processor = Arc::new(processor);
    let shutdown = processor.shutdown_handle();
    let runner = {
        let processor = Arc::clone(&processor);
        tokio::spawn(async move { processor.start().await })
    };

    let purger = tokio::spawn(purge_finished_tasks(
        Arc::clone(&broker),
        settings.broker.purge_interval(),
        settings.broker.retention(),
    ));

    let distributor = Distributor::new(broker.clone());
    for i in 1..=cli.demo_users {
        accounts::create_user(
            &store,
            &distributor,
            User {
                username: format!("user{i}"),
                full_name: format!("Demo User {i}"),
                email: format!("user{i}@example.com"),
            },
        )
        .await?;
    }

    match cli.run_for_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c()
            .await
            .context("could not listen for Ctrl-C")?,
    }

    info!("shutting down");
    shutdown.shutdown();
    runner.await??;
    purger.abort();

    let counts = broker.counts().await?;
    info!(?counts, "final queue counts");
    Ok(())
}

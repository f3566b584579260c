//! Tracing/logging initialization.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{LoggingSettings, LoggingStyle};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("could not parse log targets {directives:?}")]
    Directives {
        directives: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("unable to set up tracing: {0}")]
    Install(String),
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `settings.targets`; with neither set only `info`
/// and above are emitted.
pub fn init(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| settings.targets.clone());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse(&directives)
        .map_err(|source| TelemetryError::Directives {
            directives: directives.clone(),
            source,
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match settings.style {
        LoggingStyle::Compact => builder.compact().try_init(),
        LoggingStyle::Pretty => builder.pretty().try_init(),
        LoggingStyle::Json => builder.json().try_init(),
    };
    installed.map_err(|e| TelemetryError::Install(e.to_string()))
}

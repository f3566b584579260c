//! Runtime settings.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `COURIER_*` environment variables (`COURIER_PROCESSOR__CONCURRENCY=4`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::domain::QueueName;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub processor: ProcessorSettings,
    pub retry: RetrySettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not load settings{}", .path.as_ref().map(|p| format!(" from {}", p.display())).unwrap_or_default())]
    Load {
        path: Option<PathBuf>,
        #[source]
        source: config::ConfigError,
    },

    /// A task still running at its lease deadline would be delivered twice.
    #[error(
        "broker.lease_timeout_secs ({lease_timeout_secs}) must be greater than processor.task_timeout_secs ({task_timeout_secs})"
    )]
    LeaseNotLongerThanTaskTimeout {
        lease_timeout_secs: u64,
        task_timeout_secs: u64,
    },
}

impl Settings {
    pub const ENV_PREFIX: &'static str = "COURIER";

    /// Loads settings from `path` (if any) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings: Self = builder
            .add_source(Self::environment())
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|source| SettingsError::Load {
                path: path.map(Path::to_path_buf),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from TOML text, ignoring the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, SettingsError> {
        let settings: Self = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|source| SettingsError::Load { path: None, source })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks rules that span sections.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let lease_timeout_secs = self.broker.lease_timeout_secs;
        let task_timeout_secs = self.processor.task_timeout_secs;
        if lease_timeout_secs <= task_timeout_secs {
            return Err(SettingsError::LeaseNotLongerThanTaskTimeout {
                lease_timeout_secs,
                task_timeout_secs,
            });
        }
        Ok(())
    }

    fn environment() -> Environment {
        Environment::with_prefix(Self::ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }
}

/// Worker pool and queue priority.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Number of tasks processed at the same time.
    pub concurrency: usize,

    /// Lane weights. A lane with weight 10 is picked first twice as often
    /// as a lane with weight 5.
    pub queues: BTreeMap<String, u32>,

    /// Always drain higher-weight lanes before looking at lower ones.
    pub strict_priority: bool,

    /// How long an idle worker waits before polling the broker again.
    pub poll_interval_ms: u64,

    pub task_timeout_secs: u64,

    /// Grace period for in-flight handlers once shutdown is requested.
    pub shutdown_timeout_secs: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            queues: BTreeMap::from([
                (QueueName::CRITICAL.to_string(), 10),
                (QueueName::DEFAULT.to_string(), 5),
            ]),
            strict_priority: false,
            poll_interval_ms: 100,
            task_timeout_secs: 30 * 60,
            shutdown_timeout_secs: 8,
        }
    }
}

impl ProcessorSettings {
    pub fn queue_weights(&self) -> Vec<(QueueName, u32)> {
        self.queues
            .iter()
            .map(|(name, weight)| (QueueName::new(name.as_str()), *weight))
            .collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Backoff between attempts of a failing task.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
    /// Spread retries of tasks that failed together.
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_delay_secs: 60 * 60,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// An active task whose worker has not reported back within this
    /// window is delivered again.
    pub lease_timeout_secs: u64,

    /// Completed and archived tasks older than this are dropped.
    pub retention_secs: u64,

    /// How often finished tasks are purged.
    pub purge_interval_secs: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            lease_timeout_secs: 30 * 60 + 100,
            retention_secs: 24 * 60 * 60,
            purge_interval_secs: 60,
        }
    }
}

impl BrokerSettings {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `compact`, `pretty` or `json`.
    pub style: LoggingStyle,

    /// Filter directives, e.g. `info,courier_core=debug`. `RUST_LOG` takes
    /// precedence when set. Empty means `info`.
    pub targets: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingStyle {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_favour_the_critical_lane() {
        let settings = Settings::default();
        assert_eq!(settings.processor.concurrency, 10);
        assert_eq!(
            settings.processor.queue_weights(),
            vec![(QueueName::CRITICAL, 10), (QueueName::DEFAULT, 5)]
        );
        assert!(settings.broker.lease_timeout() > settings.processor.task_timeout());
    }

    #[test]
    fn toml_overrides_only_what_it_names() {
        let settings = Settings::from_toml_str(
            r#"
            [processor]
            concurrency = 4
            strict_priority = true

            [processor.queues]
            critical = 6
            default = 3
            low = 1

            [logging]
            style = "json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.processor.concurrency, 4);
        assert!(settings.processor.strict_priority);
        assert_eq!(settings.processor.queues.len(), 3);
        assert_eq!(settings.processor.poll_interval_ms, 100);
        assert_eq!(settings.retry, RetrySettings::default());
        assert_eq!(settings.logging.style, LoggingStyle::Json);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Settings::from_toml_str("[processor]\nconcurrency = \"many\"\n").unwrap_err();
        assert!(err.to_string().starts_with("could not load settings"));
    }

    #[rstest]
    #[case::equal(1800, 1800)]
    #[case::shorter(60, 1800)]
    fn lease_must_outlast_the_task_timeout(#[case] lease: u64, #[case] task: u64) {
        let toml = format!(
            "[broker]\nlease_timeout_secs = {lease}\n[processor]\ntask_timeout_secs = {task}\n"
        );
        let err = Settings::from_toml_str(&toml).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::LeaseNotLongerThanTaskTimeout {
                lease_timeout_secs,
                task_timeout_secs,
            } if lease_timeout_secs == lease && task_timeout_secs == task
        ));
    }

    #[test]
    fn shorter_task_timeout_is_accepted() {
        let settings = Settings::from_toml_str(
            "[broker]\nlease_timeout_secs = 120\n[processor]\ntask_timeout_secs = 60\n",
        )
        .unwrap();
        assert_eq!(settings.broker.lease_timeout(), Duration::from_secs(120));
        assert_eq!(settings.broker.retention(), Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Settings::load(Some(Path::new("/nonexistent/courier.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/courier.toml"));
    }
}

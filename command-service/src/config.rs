//! Service configuration.
//!
//! Read from the process environment once at startup. Required values have no
//! defaults: when any is missing, startup fails with every missing name listed
//! at once.
//!
//! | Variable | Default |
//! |---|---|
//! | `BROKER_URL` | required |
//! | `HTTP_ADDR` | required |
//! | `LOG_LEVEL` | required |
//! | `METRICS_ADDR` | required |
//! | `ENV` | `development` |
//! | `COMMAND_STREAM` | `todo_commands` |
//! | `COMMAND_SUBJECT` | `todo.commands` |
//! | `STREAM_PARTITIONS` | `1` |
//! | `STREAM_REPLICATION` | `1` |
//! | `PUBLISH_ACK_TIMEOUT_MS` | `5000` |
//! | `SHUTDOWN_TIMEOUT_SECS` | `30` |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use todoflow_core::stream::{DEFAULT_STREAM_NAME, DEFAULT_SUBJECT, StreamConfig};
use todoflow_web::IdentityPolicy;
use tracing_subscriber::EnvFilter;

/// Variables that must be set, in the order they are reported.
pub const REQUIRED: [&str; 4] = ["BROKER_URL", "HTTP_ADDR", "LOG_LEVEL", "METRICS_ADDR"];

/// Configuration could not be loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variables are unset or blank.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// A variable is set but unusable.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Everything the service needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Kafka-compatible bootstrap servers
    pub broker_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Log filter, e.g. `info` or `info,todoflow_web=debug`
    pub log_level: String,
    /// Prometheus listen address
    pub metrics_addr: SocketAddr,
    /// Deployment environment; `production` requires caller identity
    pub environment: String,
    /// Logical stream name
    pub stream_name: String,
    /// Subject (topic) commands are appended to
    pub subject: String,
    /// Partitions used when the stream is created
    pub partitions: i32,
    /// Replication factor used when the stream is created
    pub replication_factor: i32,
    /// Bounded wait for a publish acknowledgment
    pub publish_ack_timeout: Duration,
    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] naming every required variable that is unset
    /// - [`ConfigError::Invalid`] for the first value that does not parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED
            .iter()
            .copied()
            .filter(|name| read(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |name: &'static str| read(name).ok_or(ConfigError::Missing(vec![name]));

        let log_level = required("LOG_LEVEL")?;
        EnvFilter::try_new(&log_level).map_err(|e| ConfigError::Invalid {
            name: "LOG_LEVEL",
            reason: e.to_string(),
        })?;

        let partitions = parse_or(&read, "STREAM_PARTITIONS", 1)?;
        let replication_factor = parse_or(&read, "STREAM_REPLICATION", 1)?;
        let ack_ms: u64 = parse_or(&read, "PUBLISH_ACK_TIMEOUT_MS", 5000)?;
        positive("STREAM_PARTITIONS", i64::from(partitions))?;
        positive("STREAM_REPLICATION", i64::from(replication_factor))?;
        positive("PUBLISH_ACK_TIMEOUT_MS", i64::try_from(ack_ms).unwrap_or(i64::MAX))?;

        Ok(Self {
            broker_url: required("BROKER_URL")?,
            http_addr: parse("HTTP_ADDR", &required("HTTP_ADDR")?)?,
            log_level,
            metrics_addr: parse("METRICS_ADDR", &required("METRICS_ADDR")?)?,
            environment: read("ENV").unwrap_or_else(|| "development".to_string()),
            stream_name: read("COMMAND_STREAM").unwrap_or_else(|| DEFAULT_STREAM_NAME.to_string()),
            subject: read("COMMAND_SUBJECT").unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            partitions,
            replication_factor,
            publish_ack_timeout: Duration::from_millis(ack_ms),
            shutdown_timeout: Duration::from_secs(parse_or(&read, "SHUTDOWN_TIMEOUT_SECS", 30)?),
        })
    }

    /// Stream to provision at startup.
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new(self.stream_name.clone(), vec![self.subject.clone()])
            .with_partitions(self.partitions)
            .with_replication_factor(self.replication_factor)
    }

    /// Identity handling for this environment.
    #[must_use]
    pub fn identity_policy(&self) -> IdentityPolicy {
        IdentityPolicy::for_environment(&self.environment)
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: format!("{value:?}: {e}"),
    })
}

fn parse_or<T, R>(read: &R, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    R: Fn(&str) -> Option<String>,
{
    read(name).map_or(Ok(default), |value| parse(name, &value))
}

fn positive(name: &'static str, value: i64) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        })
    }
}

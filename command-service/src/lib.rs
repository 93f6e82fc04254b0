//! Todo command ingestion service.
//!
//! Wires configuration, telemetry, the Redpanda command stream and the HTTP
//! gateway into one process. The `command-service` binary is a thin wrapper
//! around [`startup::run`].

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]

pub mod config;
pub mod startup;

pub use config::{Config, ConfigError};
pub use startup::StartupError;

/// Value of the `service` field on the service's root span.
pub const SERVICE_NAME: &str = "command-service";

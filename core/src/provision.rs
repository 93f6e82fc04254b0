//! Idempotent stream provisioning.
//!
//! Every process start calls [`StreamProvisioner::ensure`] before accepting
//! traffic. Several instances may race here; whichever loses sees
//! [`StreamProvisioned::AlreadyExists`], which counts as success. Any other
//! outcome is a [`ProvisionError`] and the process must not start serving.

use crate::stream::{CommandStream, StreamConfig, StreamError, StreamProvisioned};
use std::sync::Arc;
use thiserror::Error;

/// Provisioning failed; fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    /// The requested configuration cannot describe a usable stream.
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),

    /// The broker refused or could not be reached.
    #[error("failed to provision stream '{stream}': {source}")]
    Stream {
        /// Stream name
        stream: String,
        /// Underlying stream error
        #[source]
        source: StreamError,
    },
}

/// Ensures the command stream exists.
#[derive(Clone)]
pub struct StreamProvisioner {
    stream: Arc<dyn CommandStream>,
}

impl StreamProvisioner {
    /// Create a provisioner for `stream`.
    #[must_use]
    pub fn new(stream: Arc<dyn CommandStream>) -> Self {
        Self { stream }
    }

    /// Create the stream unless an equivalent one already exists.
    ///
    /// # Errors
    ///
    /// - [`ProvisionError::InvalidConfig`] if the name is blank, no subjects
    ///   are given, or the sizing is not positive.
    /// - [`ProvisionError::Stream`] for any broker error.
    pub async fn ensure(&self, config: &StreamConfig) -> Result<StreamProvisioned, ProvisionError> {
        validate(config)?;

        match self.stream.ensure_stream(config).await {
            Ok(StreamProvisioned::Created) => {
                tracing::info!(
                    stream = %config.name,
                    subjects = ?config.subjects,
                    partitions = config.partitions,
                    "Command stream created"
                );
                Ok(StreamProvisioned::Created)
            },
            Ok(StreamProvisioned::AlreadyExists) => {
                tracing::info!(
                    stream = %config.name,
                    subjects = ?config.subjects,
                    "Command stream already exists"
                );
                Ok(StreamProvisioned::AlreadyExists)
            },
            Err(source) => {
                tracing::error!(stream = %config.name, error = %source, "Failed to provision command stream");
                Err(ProvisionError::Stream {
                    stream: config.name.clone(),
                    source,
                })
            },
        }
    }
}

fn validate(config: &StreamConfig) -> Result<(), ProvisionError> {
    if config.name.trim().is_empty() {
        return Err(ProvisionError::InvalidConfig("stream name is empty".to_string()));
    }
    if config.subjects.is_empty() || config.subjects.iter().any(|s| s.trim().is_empty()) {
        return Err(ProvisionError::InvalidConfig(format!(
            "stream '{}' needs at least one non-empty subject",
            config.name
        )));
    }
    if config.partitions < 1 || config.replication_factor < 1 {
        return Err(ProvisionError::InvalidConfig(format!(
            "stream '{}' needs positive partitions and replication factor",
            config.name
        )));
    }
    Ok(())
}

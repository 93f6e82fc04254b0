//! Command stream abstraction.
//!
//! The [`CommandStream`] trait is the gateway's only outbound dependency: a
//! durable, append-only log bound to one or more subjects. Commands are
//! appended to a subject and the call resolves once the broker has
//! acknowledged durable storage.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  HTTP request   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Normalizer    │◄─── Pure, no I/O
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Publisher     │
//! └────────┬────────┘
//!          │ append + wait for ack
//!          ▼
//! ┌─────────────────┐
//! │ Command stream  │◄─── Durable, ordered, at-least-once
//! └────────┬────────┘
//!          │
//!          ▼
//!    downstream consumers
//! ```
//!
//! # Key Principles
//!
//! - **Provision before traffic**: the stream is ensured once at startup and
//!   re-ensuring an existing stream is a no-op
//! - **Acknowledged or failed**: `append` never reports success before the
//!   broker has stored the message
//! - **At-least-once**: the broker may store a message more than once;
//!   consumers deduplicate on the envelope's `command_id`
//! - **Ordered per key**: messages with the same key keep their relative order
//!
//! # Implementations
//!
//! - `InMemoryCommandStream` in `todoflow-testing` - for tests
//! - `RedpandaCommandStream` in `todoflow-redpanda` - for production (Kafka-compatible)

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Default name of the command stream.
pub const DEFAULT_STREAM_NAME: &str = "todo_commands";

/// Default subject commands are published on.
pub const DEFAULT_SUBJECT: &str = "todo.commands";

/// Errors raised by a [`CommandStream`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The broker could not be reached.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// A stream with this name exists but was created with different settings.
    #[error("Stream '{stream}' exists with conflicting configuration: {reason}")]
    ConflictingConfiguration {
        /// Name of the stream
        stream: String,
        /// What differs
        reason: String,
    },

    /// No stream is bound to the subject.
    #[error("No stream is bound to subject '{0}'")]
    NoStreamForSubject(String),

    /// The broker refused the message.
    #[error("Append to '{subject}' rejected: {reason}")]
    Rejected {
        /// Subject the message was sent to
        subject: String,
        /// The broker's reason
        reason: String,
    },

    /// No acknowledgment arrived within the bounded wait.
    #[error("No acknowledgment for '{subject}' within {timeout:?}")]
    AckTimeout {
        /// Subject the message was sent to
        subject: String,
        /// The configured wait
        timeout: Duration,
    },

    /// Any other failure.
    #[error("Command stream error: {0}")]
    Other(String),
}

/// Settings used when creating the command stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Stream name
    pub name: String,
    /// Subjects bound to the stream
    pub subjects: Vec<String>,
    /// Partition count (brokers without partitions ignore it)
    pub partitions: i32,
    /// Replication factor (brokers without replication ignore it)
    pub replication_factor: i32,
}

impl StreamConfig {
    /// A stream named `name` bound to `subjects`, with one partition and one replica.
    #[must_use]
    pub fn new(name: impl Into<String>, subjects: Vec<String>) -> Self {
        Self {
            name: name.into(),
            subjects,
            partitions: 1,
            replication_factor: 1,
        }
    }

    /// Set the partition count.
    #[must_use]
    pub const fn with_partitions(mut self, partitions: i32) -> Self {
        self.partitions = partitions;
        self
    }

    /// Set the replication factor.
    #[must_use]
    pub const fn with_replication_factor(mut self, replication_factor: i32) -> Self {
        self.replication_factor = replication_factor;
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_NAME, vec![DEFAULT_SUBJECT.to_string()])
    }
}

/// Result of ensuring a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamProvisioned {
    /// The stream did not exist and was created.
    Created,
    /// An equivalent stream already existed.
    AlreadyExists,
}

/// One message handed to [`CommandStream::append`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Partition / ordering key
    pub key: String,
    /// Serialized command envelope
    pub payload: Vec<u8>,
    /// Transport headers
    pub headers: Vec<(String, String)>,
}

/// Broker confirmation that a message was stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acknowledgment {
    /// Stream or topic that stored the message
    pub stream: String,
    /// Partition the message landed in (0 for unpartitioned brokers)
    pub partition: i32,
    /// Sequence number / offset assigned by the broker
    pub sequence: i64,
}

/// Durable, append-only command log.
///
/// # Thread Safety
///
/// Implementations are shared by every in-flight request and must be
/// `Send + Sync`.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` so the gateway can hold an
/// `Arc<dyn CommandStream>` and swap the broker for an in-memory log in tests.
pub trait CommandStream: Send + Sync {
    /// Create the stream described by `config` unless it already exists.
    ///
    /// # Errors
    ///
    /// - [`StreamError::Unavailable`] if the broker cannot be reached.
    /// - [`StreamError::ConflictingConfiguration`] if a stream with the same
    ///   name exists with different settings.
    fn ensure_stream(
        &self,
        config: &StreamConfig,
    ) -> Pin<Box<dyn Future<Output = Result<StreamProvisioned, StreamError>> + Send + '_>>;

    /// Append `message` to `subject` and wait for the acknowledgment.
    ///
    /// # Errors
    ///
    /// - [`StreamError::NoStreamForSubject`] if nothing is bound to `subject`.
    /// - [`StreamError::Rejected`] if the broker refused the message.
    /// - [`StreamError::AckTimeout`] if the bounded wait elapsed.
    fn append(
        &self,
        subject: &str,
        message: &OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<Acknowledgment, StreamError>> + Send + '_>>;
}

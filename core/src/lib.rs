//! # Todoflow Core
//!
//! Command construction and publishing for the todo command gateway.
//!
//! The gateway is the write-side ingress of a CQRS system: it turns HTTP
//! intents into typed, versioned commands and appends them to a durable log.
//! It never reads or mutates todo state itself.
//!
//! ## Core Concepts
//!
//! - **Command**: a canonical [`TodoCommand`], tagged by kind
//! - **Normalizer**: pure functions building commands from a body, path id and caller
//! - **Envelope**: a [`CommandEnvelope`] adding version, id, time and correlation
//! - **Command stream**: the [`CommandStream`] log, provisioned once at startup
//! - **Publisher**: appends envelopes and waits for the broker's acknowledgment
//! - **Observer**: receives outcomes, injected rather than global
//!
//! ## Example
//!
//! ```ignore
//! use todoflow_core::*;
//!
//! let caller = CallerId::new("alice")?;
//! let command = normalize::normalize_create(br#"{"title":"Buy milk"}"#, &caller)?;
//!
//! let publisher = CommandPublisher::new(stream, Arc::new(SystemClock), Arc::new(NoopObserver));
//! let receipt = publisher.publish(DEFAULT_SUBJECT, command, None).await?;
//! ```

pub mod command;
pub mod envelope;
pub mod normalize;
pub mod observer;
pub mod provision;
pub mod publisher;
pub mod stream;

pub use command::{
    BlankIdentifier, CallerId, CommandKind, CreateTodo, DeleteTodo, TodoCommand, TodoId,
    UpdateTodo,
};
pub use envelope::{CommandEnvelope, ENVELOPE_VERSION};
pub use normalize::NormalizeError;
pub use observer::{CommandObserver, NoopObserver, RejectionReason};
pub use provision::{ProvisionError, StreamProvisioner};
pub use publisher::{CommandPublisher, PublishError, PublishReceipt};
pub use stream::{
    Acknowledgment, CommandStream, DEFAULT_STREAM_NAME, DEFAULT_SUBJECT, OutboundMessage,
    StreamConfig, StreamError, StreamProvisioned,
};

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait for time operations
    ///
    /// Allows tests to inject fixed time for deterministic envelopes.
    ///
    /// # Example
    ///
    /// ```
    /// use todoflow_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

//! # Todoflow Testing
//!
//! Testing utilities and helpers for the todo command gateway.
//!
//! This crate provides:
//! - An in-memory command stream that records every acknowledged message
//! - A recording observer for asserting on command outcomes
//! - A fixed clock for deterministic envelopes
//! - proptest strategies for identifiers and titles
//!
//! ## Example
//!
//! ```ignore
//! use todoflow_testing::mocks::{InMemoryCommandStream, RecordingObserver};
//!
//! #[tokio::test]
//! async fn publishes_once() {
//!     let stream = Arc::new(InMemoryCommandStream::provisioned());
//!     let publisher = CommandPublisher::new(stream.clone(), Arc::new(test_clock()), Arc::new(RecordingObserver::new()));
//!
//!     publisher.publish(DEFAULT_SUBJECT, command, None).await?;
//!
//!     assert_eq!(stream.len(), 1);
//! }
//! ```

pub mod mocks;
pub mod properties;

// Re-export commonly used items
pub use mocks::{
    FixedClock, InMemoryCommandStream, ObservedOutcome, RecordedMessage, RecordingObserver,
    test_clock,
};

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`. Safe to call from every test; only the first call
/// installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

//! Prometheus-backed command observer.
//!
//! Records through the `metrics` facade. Whatever recorder the binary
//! installs (the Prometheus exporter in production) receives:
//!
//! - `todo_commands_total{kind, outcome}`: outcome is `accepted`,
//!   `unauthenticated`, `invalid`, `malformed` or `error`
//! - `todo_command_publish_duration_seconds{kind}`: time from sealing the
//!   envelope to the acknowledgment

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;
use todoflow_core::command::CommandKind;
use todoflow_core::observer::{CommandObserver, RejectionReason};
use todoflow_core::publisher::PublishError;
use todoflow_core::stream::Acknowledgment;

/// Counter of command outcomes.
pub const COMMANDS_TOTAL: &str = "todo_commands_total";

/// Histogram of acknowledged publish latency.
pub const PUBLISH_DURATION: &str = "todo_command_publish_duration_seconds";

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        COMMANDS_TOTAL,
        Unit::Count,
        "Commands handled by the gateway, by kind and outcome"
    );
    describe_histogram!(
        PUBLISH_DURATION,
        Unit::Seconds,
        "Time until the command stream acknowledged a command"
    );
}

/// [`CommandObserver`] that records metrics.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrometheusObserver;

impl PrometheusObserver {
    /// Create the observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CommandObserver for PrometheusObserver {
    fn command_rejected(&self, kind: CommandKind, reason: RejectionReason) {
        counter!(COMMANDS_TOTAL, "kind" => kind.as_str(), "outcome" => reason.as_str()).increment(1);
    }

    fn command_published(&self, kind: CommandKind, _ack: &Acknowledgment, elapsed: Duration) {
        counter!(COMMANDS_TOTAL, "kind" => kind.as_str(), "outcome" => "accepted").increment(1);
        histogram!(PUBLISH_DURATION, "kind" => kind.as_str()).record(elapsed.as_secs_f64());
    }

    fn publish_failed(&self, kind: CommandKind, error: &PublishError) {
        tracing::warn!(kind = kind.as_str(), error = %error, "Command not acknowledged");
        counter!(COMMANDS_TOTAL, "kind" => kind.as_str(), "outcome" => "error").increment(1);
    }
}

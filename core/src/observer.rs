//! Outcome observers.
//!
//! Components report what happened to each command through a
//! [`CommandObserver`] handed to them at construction. Production wires a
//! metrics-backed observer; tests pass a recording one or [`NoopObserver`].

use crate::command::CommandKind;
use crate::normalize::NormalizeError;
use crate::publisher::PublishError;
use crate::stream::Acknowledgment;
use std::time::Duration;

/// Why a request was turned away before publishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// No caller identity under a strict policy.
    Unauthenticated,
    /// Body was not parseable as the expected shape.
    MalformedPayload,
    /// Body parsed but failed structural validation.
    Invalid,
}

impl RejectionReason {
    /// Label used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::MalformedPayload => "malformed",
            Self::Invalid => "invalid",
        }
    }
}

impl From<&NormalizeError> for RejectionReason {
    fn from(err: &NormalizeError) -> Self {
        match err {
            NormalizeError::MalformedPayload(_) => Self::MalformedPayload,
            NormalizeError::Validation(_) => Self::Invalid,
        }
    }
}

/// Receives command outcomes. All methods default to doing nothing.
pub trait CommandObserver: Send + Sync {
    /// A request could not be normalized into a command.
    fn command_rejected(&self, _kind: CommandKind, _reason: RejectionReason) {}

    /// A command was acknowledged by the stream.
    fn command_published(&self, _kind: CommandKind, _ack: &Acknowledgment, _elapsed: Duration) {}

    /// Publishing a command failed.
    fn publish_failed(&self, _kind: CommandKind, _error: &PublishError) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl CommandObserver for NoopObserver {}

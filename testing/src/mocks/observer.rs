//! Recording observer.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use todoflow_core::command::CommandKind;
use todoflow_core::observer::{CommandObserver, RejectionReason};
use todoflow_core::publisher::PublishError;
use todoflow_core::stream::Acknowledgment;

/// One outcome reported to a [`RecordingObserver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObservedOutcome {
    /// The request never became a command
    Rejected {
        /// Command kind the request targeted
        kind: CommandKind,
        /// Why it was rejected
        reason: RejectionReason,
    },
    /// The command was acknowledged
    Published {
        /// Command kind
        kind: CommandKind,
        /// Acknowledgment returned by the stream
        ack: Acknowledgment,
    },
    /// Publishing failed
    Failed {
        /// Command kind
        kind: CommandKind,
        /// The failure
        error: PublishError,
    },
}

/// Observer that keeps every outcome in order.
///
/// Durations are dropped so assertions stay deterministic.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    outcomes: Mutex<Vec<ObservedOutcome>>,
}

impl RecordingObserver {
    /// Create an empty observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything observed so far.
    #[must_use]
    pub fn outcomes(&self) -> Vec<ObservedOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of acknowledged commands observed.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.outcomes()
            .iter()
            .filter(|o| matches!(o, ObservedOutcome::Published { .. }))
            .count()
    }

    fn record(&self, outcome: ObservedOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }
}

impl CommandObserver for RecordingObserver {
    fn command_rejected(&self, kind: CommandKind, reason: RejectionReason) {
        self.record(ObservedOutcome::Rejected { kind, reason });
    }

    fn command_published(&self, kind: CommandKind, ack: &Acknowledgment, _elapsed: Duration) {
        self.record(ObservedOutcome::Published {
            kind,
            ack: ack.clone(),
        });
    }

    fn publish_failed(&self, kind: CommandKind, error: &PublishError) {
        self.record(ObservedOutcome::Failed {
            kind,
            error: error.clone(),
        });
    }
}

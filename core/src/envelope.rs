//! Versioned envelope around a published command.
//!
//! The command's own fields are flattened into the envelope, so a published
//! message is one flat JSON object:
//!
//! ```json
//! {
//!   "version": 1,
//!   "command_id": "6f1c...",
//!   "issued_at": "2025-01-01T00:00:00Z",
//!   "correlation_id": "0b7e...",
//!   "type": "CreateTodo",
//!   "title": "Buy milk",
//!   "user_id": "alice"
//! }
//! ```
//!
//! `command_id` is unique per publish attempt. The stream delivers at least
//! once, so consumers use it to drop duplicates.

use crate::command::TodoCommand;
use crate::environment::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current envelope schema version.
pub const ENVELOPE_VERSION: u32 = 1;

/// A command sealed for publication. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Envelope schema version.
    pub version: u32,
    /// Unique id of this command.
    pub command_id: Uuid,
    /// When the gateway sealed the command.
    pub issued_at: DateTime<Utc>,
    /// Request id of the HTTP request that produced the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    /// The command itself, including its `type` tag.
    #[serde(flatten)]
    pub command: TodoCommand,
}

impl CommandEnvelope {
    /// Seal `command` with a fresh command id and the clock's current time.
    #[must_use]
    pub fn seal(command: TodoCommand, clock: &dyn Clock, correlation_id: Option<Uuid>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            command_id: Uuid::new_v4(),
            issued_at: clock.now(),
            correlation_id,
            command,
        }
    }

    /// Serialize to the JSON bytes that go on the stream.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse an envelope read back from the stream.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `bytes` is not a valid envelope.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::command::{CallerId, TodoId, UpdateTodo};
    use chrono::TimeZone;

    struct Frozen;

    impl Clock for Frozen {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        }
    }

    fn update() -> TodoCommand {
        TodoCommand::UpdateTodo(UpdateTodo {
            id: TodoId::new("42").unwrap(),
            title: None,
            completed: Some(true),
            user_id: CallerId::new("bob").unwrap(),
        })
    }

    #[test]
    fn envelope_is_flat_json() {
        let correlation = Uuid::new_v4();
        let envelope = CommandEnvelope::seal(update(), &Frozen, Some(correlation));

        let value: serde_json::Value = serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["type"], "UpdateTodo");
        assert_eq!(value["id"], "42");
        assert_eq!(value["completed"], true);
        assert_eq!(value["user_id"], "bob");
        assert_eq!(value["issued_at"], "2025-01-01T00:00:00Z");
        assert_eq!(value["correlation_id"], correlation.to_string());
        assert!(value.get("title").is_none());
    }

    #[test]
    fn envelope_reads_back() {
        let envelope = CommandEnvelope::seal(update(), &Frozen, None);
        let parsed = CommandEnvelope::from_slice(&envelope.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn every_seal_gets_a_new_command_id() {
        let first = CommandEnvelope::seal(update(), &Frozen, None);
        let second = CommandEnvelope::seal(update(), &Frozen, None);
        assert_ne!(first.command_id, second.command_id);
    }
}

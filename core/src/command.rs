//! Canonical todo commands.
//!
//! A [`TodoCommand`] is the value published onto the command stream. It is
//! tagged by kind through the `type` field, which the gateway sets from the
//! route that produced the command; a `type` sent by the client is never read.
//!
//! # Wire Format
//!
//! ```json
//! {"type":"UpdateTodo","id":"42","title":"Buy milk","user_id":"alice"}
//! ```
//!
//! Optional fields are omitted when absent, so consumers can tell
//! "no change requested" apart from "set to empty" or `false`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An identifier was empty or whitespace only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0} must not be empty")]
pub struct BlankIdentifier(pub &'static str);

/// Identity of the caller on whose behalf a command is issued.
///
/// Always non-blank. The constructor is the only way to obtain one, including
/// through deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallerId(String);

impl CallerId {
    /// Create a caller id.
    ///
    /// # Errors
    ///
    /// Returns [`BlankIdentifier`] if `value` is empty or whitespace only.
    pub fn new(value: impl Into<String>) -> Result<Self, BlankIdentifier> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(BlankIdentifier("caller id"));
        }
        Ok(Self(value))
    }

    /// The caller id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CallerId {
    type Error = BlankIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CallerId> for String {
    fn from(id: CallerId) -> Self {
        id.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a todo, taken from the URL path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TodoId(String);

impl TodoId {
    /// Create a todo id.
    ///
    /// # Errors
    ///
    /// Returns [`BlankIdentifier`] if `value` is empty or whitespace only.
    pub fn new(value: impl Into<String>) -> Result<Self, BlankIdentifier> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(BlankIdentifier("todo id"));
        }
        Ok(Self(value))
    }

    /// The todo id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TodoId {
    type Error = BlankIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TodoId> for String {
    fn from(id: TodoId) -> Self {
        id.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three kinds of command the gateway accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `POST /todos`
    Create,
    /// `PUT /todos/{id}`
    Update,
    /// `DELETE /todos/{id}`
    Delete,
}

impl CommandKind {
    /// Lowercase label, used for log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// The value of the `type` tag on the wire.
    #[must_use]
    pub const fn type_tag(self) -> &'static str {
        match self {
            Self::Create => "CreateTodo",
            Self::Update => "UpdateTodo",
            Self::Delete => "DeleteTodo",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to create a todo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTodo {
    /// Assigned downstream; always `None` when issued by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TodoId>,
    /// Non-blank title.
    pub title: String,
    /// Issuing caller.
    pub user_id: CallerId,
}

/// Request to change a todo. Absent fields mean "leave unchanged".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTodo {
    /// Target todo, always the path parameter.
    pub id: TodoId,
    /// New title, if one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New completion flag, if one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Issuing caller.
    pub user_id: CallerId,
}

/// Request to delete a todo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTodo {
    /// Target todo, always the path parameter.
    pub id: TodoId,
    /// Issuing caller.
    pub user_id: CallerId,
}

/// A canonical todo command, discriminated by the `type` tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TodoCommand {
    /// See [`CreateTodo`].
    CreateTodo(CreateTodo),
    /// See [`UpdateTodo`].
    UpdateTodo(UpdateTodo),
    /// See [`DeleteTodo`].
    DeleteTodo(DeleteTodo),
}

impl TodoCommand {
    /// Which kind of command this is.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::CreateTodo(_) => CommandKind::Create,
            Self::UpdateTodo(_) => CommandKind::Update,
            Self::DeleteTodo(_) => CommandKind::Delete,
        }
    }

    /// The caller that issued the command.
    #[must_use]
    pub const fn caller(&self) -> &CallerId {
        match self {
            Self::CreateTodo(cmd) => &cmd.user_id,
            Self::UpdateTodo(cmd) => &cmd.user_id,
            Self::DeleteTodo(cmd) => &cmd.user_id,
        }
    }

    /// The targeted todo, if known at issue time.
    #[must_use]
    pub const fn todo_id(&self) -> Option<&TodoId> {
        match self {
            Self::CreateTodo(cmd) => cmd.id.as_ref(),
            Self::UpdateTodo(cmd) => Some(&cmd.id),
            Self::DeleteTodo(cmd) => Some(&cmd.id),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn alice() -> CallerId {
        CallerId::new("alice").unwrap()
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        assert_eq!(CallerId::new("").unwrap_err(), BlankIdentifier("caller id"));
        assert_eq!(CallerId::new("  \t").unwrap_err(), BlankIdentifier("caller id"));
        assert_eq!(TodoId::new("").unwrap_err().to_string(), "todo id must not be empty");
    }

    #[test]
    fn create_serializes_without_id() {
        let command = TodoCommand::CreateTodo(CreateTodo {
            id: None,
            title: "Buy milk".to_string(),
            user_id: alice(),
        });

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(
            value,
            json!({"type": "CreateTodo", "title": "Buy milk", "user_id": "alice"})
        );
    }

    #[test]
    fn update_omits_absent_fields_but_keeps_false() {
        let command = TodoCommand::UpdateTodo(UpdateTodo {
            id: TodoId::new("42").unwrap(),
            title: None,
            completed: Some(false),
            user_id: alice(),
        });

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["type"], "UpdateTodo");
        assert_eq!(value["completed"], Value::Bool(false));
        assert!(value.get("title").is_none());
    }

    #[test]
    fn deserializing_a_blank_caller_fails() {
        let raw = r#"{"type":"DeleteTodo","id":"1","user_id":" "}"#;
        assert!(serde_json::from_str::<TodoCommand>(raw).is_err());
    }

    #[test]
    fn kind_matches_type_tag() {
        let command = TodoCommand::DeleteTodo(DeleteTodo {
            id: TodoId::new("7").unwrap(),
            user_id: alice(),
        });
        let value = serde_json::to_value(&command).unwrap();

        assert_eq!(command.kind(), CommandKind::Delete);
        assert_eq!(value["type"], command.kind().type_tag());
        assert_eq!(command.todo_id().map(TodoId::as_str), Some("7"));
        assert_eq!(command.caller().as_str(), "alice");
    }
}

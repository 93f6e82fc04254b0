//! Turning HTTP-level intents into canonical commands.
//!
//! Each function takes the raw request body (where one is expected), the id
//! from the URL path (where the route has one) and the caller, and returns a
//! [`TodoCommand`]. None of them perform I/O.
//!
//! The gateway owns the `type` tag, the todo id and the caller id. Anything the
//! client sends under those names is ignored: the payload types below do not
//! declare them, and serde skips unknown fields.

use crate::command::{CallerId, CreateTodo, DeleteTodo, TodoCommand, TodoId, UpdateTodo};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Why a request could not be turned into a command.
///
/// Both variants map to `400 Bad Request`; they are kept apart for logs and
/// metrics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The body is not valid JSON of the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The body parsed but is structurally invalid.
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Deserialize)]
struct CreateTodoPayload {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateTodoPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
}

/// Derived struct impls also accept positional arrays, so the object shape is
/// checked before the fields are read.
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, NormalizeError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| NormalizeError::MalformedPayload(e.to_string()))?;
    if !value.is_object() {
        return Err(NormalizeError::MalformedPayload("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| NormalizeError::MalformedPayload(e.to_string()))
}

fn path_id(raw: &str) -> Result<TodoId, NormalizeError> {
    TodoId::new(raw).map_err(|e| NormalizeError::Validation(e.to_string()))
}

/// Build a [`TodoCommand::CreateTodo`] from a `POST /todos` body.
///
/// # Errors
///
/// - [`NormalizeError::MalformedPayload`] if the body is not a JSON object
///   with an optional string `title`.
/// - [`NormalizeError::Validation`] if `title` is missing or blank.
pub fn normalize_create(body: &[u8], caller: &CallerId) -> Result<TodoCommand, NormalizeError> {
    let payload: CreateTodoPayload = decode(body)?;

    let title = match payload.title {
        Some(title) if !title.trim().is_empty() => title,
        _ => return Err(NormalizeError::Validation("title must not be empty".to_string())),
    };

    Ok(TodoCommand::CreateTodo(CreateTodo {
        id: None,
        title,
        user_id: caller.clone(),
    }))
}

/// Build a [`TodoCommand::UpdateTodo`] from a `PUT /todos/{id}` body.
///
/// Every body field is optional and stays absent when not supplied. An empty
/// title is a legitimate change and passes through untouched.
///
/// # Errors
///
/// - [`NormalizeError::Validation`] if the path id is blank.
/// - [`NormalizeError::MalformedPayload`] if the body (including an empty
///   body) is not a JSON object of the expected shape.
pub fn normalize_update(
    body: &[u8],
    raw_id: &str,
    caller: &CallerId,
) -> Result<TodoCommand, NormalizeError> {
    let id = path_id(raw_id)?;
    let payload: UpdateTodoPayload = decode(body)?;

    Ok(TodoCommand::UpdateTodo(UpdateTodo {
        id,
        title: payload.title,
        completed: payload.completed,
        user_id: caller.clone(),
    }))
}

/// Build a [`TodoCommand::DeleteTodo`] for `DELETE /todos/{id}`. No body is read.
///
/// # Errors
///
/// Returns [`NormalizeError::Validation`] if the path id is blank.
pub fn normalize_delete(raw_id: &str, caller: &CallerId) -> Result<TodoCommand, NormalizeError> {
    Ok(TodoCommand::DeleteTodo(DeleteTodo {
        id: path_id(raw_id)?,
        user_id: caller.clone(),
    }))
}

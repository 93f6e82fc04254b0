//! Command endpoints.
//!
//! Each handler runs the same pipeline: resolve the caller, normalize the
//! request into a [`TodoCommand`], publish it and answer `202 Accepted` once
//! the stream has acknowledged it. Nothing is published when any earlier
//! step fails.
//!
//! # Endpoints
//!
//! ```text
//! POST   /todos        {"title": "..."}
//! PUT    /todos/{id}   {"title"?: "...", "completed"?: bool}
//! DELETE /todos/{id}
//! ```

use crate::error::AppError;
use crate::extractors::Caller;
use crate::middleware::RequestId;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State, rejection::BytesRejection, rejection::PathRejection},
    http::StatusCode,
};
use todoflow_core::command::{CommandKind, TodoCommand};
use todoflow_core::normalize::{self, NormalizeError};
use todoflow_core::observer::RejectionReason;
use todoflow_core::publisher::PublishError;
use tracing::Instrument;

/// `POST /todos`
///
/// # Errors
///
/// 401 without an identity under a strict policy, 400 for an undecodable
/// body or a blank title, 500 when the command is not acknowledged.
pub async fn create_todo(
    State(state): State<AppState>,
    request_id: Option<RequestId>,
    caller: Result<Caller, AppError>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, AppError> {
    let Caller(caller) = caller.map_err(|e| unauthenticated(&state, CommandKind::Create, e))?;
    let body = body?;
    let command = normalize::normalize_create(&body, &caller)
        .map_err(|e| rejected(&state, CommandKind::Create, e))?;

    dispatch(&state, command, request_id).await
}

/// `PUT /todos/{id}`
///
/// The path id always wins over any `id` in the body. Omitted fields stay
/// unset on the command.
///
/// # Errors
///
/// 401 without an identity under a strict policy, 400 for a blank id, an
/// empty or undecodable body, 500 when the command is not acknowledged.
pub async fn update_todo(
    State(state): State<AppState>,
    request_id: Option<RequestId>,
    caller: Result<Caller, AppError>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, AppError> {
    let Caller(caller) = caller.map_err(|e| unauthenticated(&state, CommandKind::Update, e))?;
    let Path(id) = id.map_err(|e| bad_path(&state, CommandKind::Update, &e))?;
    let body = body?;
    let command = normalize::normalize_update(&body, &id, &caller)
        .map_err(|e| rejected(&state, CommandKind::Update, e))?;

    dispatch(&state, command, request_id).await
}

/// `DELETE /todos/{id}`
///
/// Any request body is ignored.
///
/// # Errors
///
/// 401 without an identity under a strict policy, 400 for a blank id, 500
/// when the command is not acknowledged.
pub async fn delete_todo(
    State(state): State<AppState>,
    request_id: Option<RequestId>,
    caller: Result<Caller, AppError>,
    id: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Caller(caller) = caller.map_err(|e| unauthenticated(&state, CommandKind::Delete, e))?;
    let Path(id) = id.map_err(|e| bad_path(&state, CommandKind::Delete, &e))?;
    let command = normalize::normalize_delete(&id, &caller)
        .map_err(|e| rejected(&state, CommandKind::Delete, e))?;

    dispatch(&state, command, request_id).await
}

fn rejected(state: &AppState, kind: CommandKind, err: NormalizeError) -> AppError {
    let reason = RejectionReason::from(&err);
    tracing::info!(kind = kind.as_str(), reason = reason.as_str(), error = %err, "Command rejected");
    state.observer().command_rejected(kind, reason);
    AppError::from(err)
}

fn unauthenticated(state: &AppState, kind: CommandKind, err: AppError) -> AppError {
    tracing::info!(kind = kind.as_str(), "Command rejected without caller identity");
    state
        .observer()
        .command_rejected(kind, RejectionReason::Unauthenticated);
    err
}

fn bad_path(state: &AppState, kind: CommandKind, rejection: &PathRejection) -> AppError {
    state.observer().command_rejected(kind, RejectionReason::Invalid);
    AppError::bad_request("invalid todo id")
        .with_source(anyhow::anyhow!(rejection.body_text()))
}

/// Publish on a separate task and wait for it.
///
/// The task keeps running if the client goes away, so a command already
/// handed to the broker is not abandoned halfway.
async fn dispatch(
    state: &AppState,
    command: TodoCommand,
    request_id: Option<RequestId>,
) -> Result<StatusCode, AppError> {
    let kind = command.kind();
    let correlation_id = request_id.map(|RequestId(id)| id);
    let publisher = state.publisher().clone();
    let subject = state.subject().to_string();

    let task = tokio::spawn(
        async move { publisher.publish(&subject, command, correlation_id).await }.in_current_span(),
    );

    match task.await {
        Ok(Ok(receipt)) => {
            tracing::info!(
                kind = kind.as_str(),
                command_id = %receipt.command_id,
                stream = %receipt.acknowledgment.stream,
                sequence = receipt.acknowledgment.sequence,
                "Command accepted"
            );
            Ok(StatusCode::ACCEPTED)
        }
        Ok(Err(err)) => Err(err.into()),
        Err(join_error) => {
            let err = PublishError::Aborted(join_error.to_string());
            state.observer().publish_failed(kind, &err);
            Err(err.into())
        }
    }
}

//! Gateway routes and the layers around them.
//!
//! ```text
//! POST   /todos       -> create_todo
//! PUT    /todos/:id   -> update_todo
//! DELETE /todos/:id   -> delete_todo
//! GET    /health      -> health_check
//! GET    /todos[/:id] -> 404 (no read side)
//! other methods       -> 405
//! other paths         -> 404
//! ```
//!
//! Outermost first: request id sanitizing and assignment, tracing, request id
//! propagation, JSON content type, panic recovery.

use crate::error::AppError;
use crate::handlers::{
    create_todo, delete_todo, health_check, method_not_allowed, route_not_found, update_todo,
};
use crate::middleware::{
    discard_malformed_request_id, json_content_type_layer, propagate_request_id_layer,
    request_span, set_request_id_layer,
};
use crate::state::AppState;
use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/todos",
            post(create_todo)
                .get(route_not_found)
                .fallback(method_not_allowed),
        )
        .route(
            "/todos/:id",
            put(update_todo)
                .delete(delete_todo)
                .get(route_not_found)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health_check))
        .fallback(route_not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(json_content_type_layer())
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(set_request_id_layer())
        .layer(axum::middleware::map_request(discard_malformed_request_id))
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Handler panicked");
    AppError::internal("internal server error").into_response()
}

//! HTTP gateway for todo commands.
//!
//! Turns `POST /todos`, `PUT /todos/:id` and `DELETE /todos/:id` into
//! [`TodoCommand`](todoflow_core::TodoCommand)s and publishes them through a
//! [`CommandPublisher`](todoflow_core::CommandPublisher). A request is
//! answered `202 Accepted` only once the command stream acknowledged the
//! command.
//!
//! # Request Flow
//!
//! 1. **Request id** assigned and attached to the tracing span
//! 2. **Identity** resolved from `X-User-ID` ([`Caller`])
//! 3. **Normalize** body and path into a command
//! 4. **Publish** and wait for the acknowledgment
//! 5. **Respond** `202`, or map the failure through [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! use todoflow_web::{AppState, IdentityPolicy, router};
//!
//! let state = AppState::new(publisher, "todo.commands")
//!     .with_identity_policy(IdentityPolicy::for_environment("production"));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::AppError;
pub use extractors::{Caller, FALLBACK_CALLER_ID, IdentityPolicy, USER_ID_HEADER};
pub use metrics::PrometheusObserver;
pub use middleware::{REQUEST_ID_HEADER, RequestId, json_content_type_layer};
pub use router::router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

//! Request-scoped middleware.
//!
//! - **Request ids**: built on `tower-http`'s request-id layers. Every request
//!   carries an `X-Request-ID` that is a UUID; a client-supplied id is kept
//!   when it parses, otherwise a fresh v4 id is minted. The id is recorded on
//!   the request span, echoed on the response and becomes the published
//!   envelope's `correlation_id` through the [`RequestId`] extractor.
//! - **JSON content type**: every response is labelled `application/json`.
//!
//! # Example
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/todos", post(create_todo))
//!     .layer(json_content_type_layer())
//!     .layer(propagate_request_id_layer())
//!     .layer(TraceLayer::new_for_http().make_span_with(request_span))
//!     .layer(set_request_id_layer())
//!     .layer(axum::middleware::map_request(discard_malformed_request_id));
//! ```

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{HeaderValue, header, request::Parts},
};
use std::fmt;
use tower_http::request_id::{self, MakeRequestId, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::Span;
use uuid::Uuid;

/// Header name for request ids.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Mints v4 UUID request ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(
        &mut self,
        _request: &axum::http::Request<B>,
    ) -> Option<request_id::RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(request_id::RequestId::new)
    }
}

/// Drop an `X-Request-ID` that is not a UUID so a fresh one gets minted.
///
/// Used with [`axum::middleware::map_request`], outside
/// [`set_request_id_layer`].
pub async fn discard_malformed_request_id(mut request: Request) -> Request {
    let malformed = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .is_some_and(|value| parse_request_id(value).is_none());
    if malformed {
        request.headers_mut().remove(REQUEST_ID_HEADER);
    }
    request
}

/// Assigns an id to requests that arrive without one.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Copies the request id onto the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Span for one request, for `TraceLayer::make_span_with`.
pub fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        "command_request",
        request_id = request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}

fn parse_request_id(value: &HeaderValue) -> Option<Uuid> {
    value.to_str().ok().and_then(|s| Uuid::parse_str(s).ok())
}

/// Id of one inbound request, as assigned by [`set_request_id_layer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<request_id::RequestId>()
            .and_then(|id| parse_request_id(id.header_value()))
            .map(Self)
            .ok_or_else(|| AppError::internal("request id missing"))
    }
}

/// Layer forcing `Content-Type: application/json` on every response.
#[must_use]
pub fn json_content_type_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    )
}

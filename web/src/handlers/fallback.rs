//! Responses for requests no command handler takes.

use crate::error::AppError;

/// No route matches the path, or the path has no read side.
#[allow(clippy::unused_async)]
pub async fn route_not_found() -> AppError {
    AppError::route_not_found()
}

/// The path exists but not for this method.
#[allow(clippy::unused_async)]
pub async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed()
}

//! Caller identity.
//!
//! The gateway trusts an upstream proxy to authenticate the caller and pass
//! the result in `X-User-ID`. The [`Caller`] extractor reads that header
//! according to the configured [`IdentityPolicy`]. Handlers take `Caller`
//! before the body, so identity is settled before any payload is decoded.
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(Caller(caller): Caller, body: Bytes) -> Result<StatusCode, AppError> {
//!     let command = normalize_create(&body, &caller)?;
//!     // ...
//! }
//! ```

use crate::error::{AppError, MISSING_IDENTITY};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use todoflow_core::command::CallerId;

/// Header carrying the authenticated caller id.
pub const USER_ID_HEADER: &str = "X-User-ID";

/// Identity substituted outside production when the header is missing.
pub const FALLBACK_CALLER_ID: &str = "test-user";

/// What to do when a request carries no caller identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Reject with 401.
    Strict,
    /// Use `fallback` instead.
    Permissive {
        /// Identity recorded on the command
        fallback: CallerId,
    },
}

impl IdentityPolicy {
    /// Permissive policy using [`FALLBACK_CALLER_ID`].
    #[must_use]
    pub fn permissive() -> Self {
        CallerId::new(FALLBACK_CALLER_ID).map_or(Self::Strict, |fallback| Self::Permissive {
            fallback,
        })
    }

    /// Strict in `production`, permissive everywhere else.
    #[must_use]
    pub fn for_environment(environment: &str) -> Self {
        if environment == "production" {
            Self::Strict
        } else {
            Self::permissive()
        }
    }

    /// Resolve the caller from request headers.
    ///
    /// A header that is blank or not valid UTF-8 counts as absent.
    ///
    /// # Errors
    ///
    /// Returns 401 when no identity is present and the policy is strict.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<CallerId, AppError> {
        let presented = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| CallerId::new(s).ok());

        match (presented, self) {
            (Some(caller), _) => Ok(caller),
            (None, Self::Permissive { fallback }) => Ok(fallback.clone()),
            (None, Self::Strict) => Err(AppError::unauthorized(MISSING_IDENTITY)),
        }
    }
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

/// The caller a command is issued on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub CallerId);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    IdentityPolicy: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        IdentityPolicy::from_ref(state)
            .resolve(&parts.headers)
            .map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(policy: IdentityPolicy, header: Option<&str>) -> Result<Caller, AppError> {
        let mut builder = Request::builder();
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &policy).await
    }

    #[tokio::test]
    async fn test_header_is_used_when_present() {
        let caller = extract(IdentityPolicy::Strict, Some("alice")).await.unwrap();
        assert_eq!(caller.0.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_strict_rejects_missing_header() {
        let err = extract(IdentityPolicy::Strict, None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Missing X-User-ID header");
    }

    #[tokio::test]
    async fn test_blank_header_counts_as_missing() {
        let err = extract(IdentityPolicy::Strict, Some("   ")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let caller = extract(IdentityPolicy::permissive(), Some("")).await.unwrap();
        assert_eq!(caller.0.as_str(), FALLBACK_CALLER_ID);
    }

    #[tokio::test]
    async fn test_permissive_substitutes_fallback() {
        let caller = extract(IdentityPolicy::permissive(), None).await.unwrap();
        assert_eq!(caller.0.as_str(), "test-user");
    }

    #[test]
    fn test_only_production_is_strict() {
        assert_eq!(IdentityPolicy::for_environment("production"), IdentityPolicy::Strict);
        assert_eq!(
            IdentityPolicy::for_environment("staging"),
            IdentityPolicy::permissive()
        );
        assert_eq!(IdentityPolicy::for_environment(""), IdentityPolicy::permissive());
    }
}

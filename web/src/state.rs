//! Application state for Axum handlers.

use crate::extractors::IdentityPolicy;
use axum::extract::FromRef;
use std::sync::Arc;
use todoflow_core::observer::{CommandObserver, NoopObserver};
use todoflow_core::publisher::CommandPublisher;

/// State shared by every gateway handler.
///
/// Cloned per request; all fields are cheap handles.
///
/// # Examples
///
/// ```ignore
/// let publisher = CommandPublisher::new(stream, Arc::new(SystemClock), observer.clone());
/// let state = AppState::new(publisher, "todo.commands")
///     .with_observer(observer)
///     .with_identity_policy(IdentityPolicy::Strict);
/// let app = router(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    publisher: CommandPublisher,
    observer: Arc<dyn CommandObserver>,
    subject: Arc<str>,
    identity: IdentityPolicy,
}

impl AppState {
    /// State publishing to `subject`, permissive about identity, observing nothing.
    #[must_use]
    pub fn new(publisher: CommandPublisher, subject: impl Into<Arc<str>>) -> Self {
        Self {
            publisher,
            observer: Arc::new(NoopObserver),
            subject: subject.into(),
            identity: IdentityPolicy::default(),
        }
    }

    /// Observer told about rejected requests and aborted publishes.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CommandObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// How missing identities are handled.
    #[must_use]
    pub fn with_identity_policy(mut self, identity: IdentityPolicy) -> Self {
        self.identity = identity;
        self
    }

    /// The command publisher.
    #[must_use]
    pub const fn publisher(&self) -> &CommandPublisher {
        &self.publisher
    }

    /// The outcome observer.
    #[must_use]
    pub fn observer(&self) -> &dyn CommandObserver {
        self.observer.as_ref()
    }

    /// Subject commands are appended to.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The identity policy in force.
    #[must_use]
    pub const fn identity_policy(&self) -> &IdentityPolicy {
        &self.identity
    }
}

impl FromRef<AppState> for IdentityPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("subject", &self.subject)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

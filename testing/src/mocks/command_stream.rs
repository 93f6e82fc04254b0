//! In-memory command stream.
//!
//! Behaves like a single broker node: streams are created by name and bound to
//! subjects, appends to an unbound subject fail, and every acknowledged
//! message is kept in append order with a per-stream sequence number starting
//! at 1.
//!
//! Failures and slow acknowledgments can be injected to exercise the
//! gateway's error paths.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use todoflow_core::envelope::CommandEnvelope;
use todoflow_core::stream::{
    Acknowledgment, CommandStream, OutboundMessage, StreamConfig, StreamError, StreamProvisioned,
};

/// A message the stream acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedMessage {
    /// Stream that stored the message
    pub stream: String,
    /// Subject it was appended to
    pub subject: String,
    /// Sequence number within the stream
    pub sequence: i64,
    /// The message as appended
    pub message: OutboundMessage,
}

#[derive(Debug)]
struct StoredStream {
    subjects: BTreeSet<String>,
    messages: Vec<RecordedMessage>,
}

#[derive(Debug, Default)]
struct State {
    streams: HashMap<String, StoredStream>,
    /// Global append order across streams
    log: Vec<RecordedMessage>,
    create_calls: usize,
}

/// In-memory [`CommandStream`] for tests.
#[derive(Debug, Default)]
pub struct InMemoryCommandStream {
    state: Mutex<State>,
    failure: Mutex<Option<StreamError>>,
    ack_delay: Mutex<Option<Duration>>,
}

impl InMemoryCommandStream {
    /// An empty broker with no streams.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker that already holds the default `todo_commands` stream.
    #[must_use]
    pub fn provisioned() -> Self {
        let stream = Self::new();
        let config = StreamConfig::default();
        stream.lock_state().streams.insert(
            config.name,
            StoredStream {
                subjects: config.subjects.into_iter().collect(),
                messages: Vec::new(),
            },
        );
        stream
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following append fail with `error` until cleared.
    pub fn fail_appends_with(&self, error: StreamError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Stop injecting append failures.
    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Delay every acknowledgment by `delay`.
    pub fn delay_acks_by(&self, delay: Duration) {
        *self.ack_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Number of streams that exist.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.lock_state().streams.len()
    }

    /// Number of times a stream was actually created.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.lock_state().create_calls
    }

    /// Every acknowledged message, in append order.
    #[must_use]
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.lock_state().log.clone()
    }

    /// Number of acknowledged messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_state().log.len()
    }

    /// Whether no message has been acknowledged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acknowledged payloads decoded as envelopes. Undecodable payloads are skipped.
    #[must_use]
    pub fn envelopes(&self) -> Vec<CommandEnvelope> {
        self.lock_state()
            .log
            .iter()
            .filter_map(|m| CommandEnvelope::from_slice(&m.message.payload).ok())
            .collect()
    }

    fn ensure(&self, config: &StreamConfig) -> Result<StreamProvisioned, StreamError> {
        let subjects: BTreeSet<String> = config.subjects.iter().cloned().collect();
        let mut state = self.lock_state();

        if let Some(existing) = state.streams.get(&config.name) {
            if existing.subjects == subjects {
                return Ok(StreamProvisioned::AlreadyExists);
            }
            return Err(StreamError::ConflictingConfiguration {
                stream: config.name.clone(),
                reason: format!("bound to {:?}, requested {:?}", existing.subjects, subjects),
            });
        }

        if let Some((other, _)) = state
            .streams
            .iter()
            .find(|(_, s)| !s.subjects.is_disjoint(&subjects))
        {
            return Err(StreamError::ConflictingConfiguration {
                stream: config.name.clone(),
                reason: format!("subjects overlap with stream '{other}'"),
            });
        }

        state.streams.insert(
            config.name.clone(),
            StoredStream {
                subjects,
                messages: Vec::new(),
            },
        );
        state.create_calls += 1;
        Ok(StreamProvisioned::Created)
    }

    fn store(&self, subject: &str, message: &OutboundMessage) -> Result<Acknowledgment, StreamError> {
        if let Some(error) = self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(error);
        }

        let mut state = self.lock_state();
        let (name, stored) = state
            .streams
            .iter_mut()
            .find(|(_, s)| s.subjects.contains(subject))
            .ok_or_else(|| StreamError::NoStreamForSubject(subject.to_string()))?;

        let sequence = i64::try_from(stored.messages.len() + 1)
            .map_err(|e| StreamError::Other(e.to_string()))?;
        let recorded = RecordedMessage {
            stream: name.clone(),
            subject: subject.to_string(),
            sequence,
            message: message.clone(),
        };
        stored.messages.push(recorded.clone());
        let stream = recorded.stream.clone();
        state.log.push(recorded);

        Ok(Acknowledgment {
            stream,
            partition: 0,
            sequence,
        })
    }
}

impl CommandStream for InMemoryCommandStream {
    fn ensure_stream(
        &self,
        config: &StreamConfig,
    ) -> Pin<Box<dyn Future<Output = Result<StreamProvisioned, StreamError>> + Send + '_>> {
        let outcome = self.ensure(config);
        Box::pin(async move { outcome })
    }

    fn append(
        &self,
        subject: &str,
        message: &OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<Acknowledgment, StreamError>> + Send + '_>> {
        let subject = subject.to_string();
        let message = message.clone();
        let delay = *self.ack_delay.lock().unwrap_or_else(PoisonError::into_inner);

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.store(&subject, &message)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message(key: &str) -> OutboundMessage {
        OutboundMessage {
            key: key.to_string(),
            payload: b"{}".to_vec(),
            headers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn ensuring_twice_creates_one_stream() {
        let stream = InMemoryCommandStream::new();
        let config = StreamConfig::default();

        assert_eq!(stream.ensure_stream(&config).await.unwrap(), StreamProvisioned::Created);
        assert_eq!(
            stream.ensure_stream(&config).await.unwrap(),
            StreamProvisioned::AlreadyExists
        );
        assert_eq!(stream.stream_count(), 1);
        assert_eq!(stream.create_calls(), 1);
    }

    #[tokio::test]
    async fn same_name_with_other_subjects_conflicts() {
        let stream = InMemoryCommandStream::provisioned();
        let config = StreamConfig::new("todo_commands", vec!["other.subject".to_string()]);

        let err = stream.ensure_stream(&config).await.unwrap_err();
        assert!(matches!(err, StreamError::ConflictingConfiguration { .. }));
    }

    #[tokio::test]
    async fn append_requires_a_bound_subject() {
        let stream = InMemoryCommandStream::new();
        let err = stream.append("todo.commands", &message("k")).await.unwrap_err();

        assert_eq!(err, StreamError::NoStreamForSubject("todo.commands".to_string()));
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn appends_get_increasing_sequences() {
        let stream = InMemoryCommandStream::provisioned();

        let first = stream.append("todo.commands", &message("a")).await.unwrap();
        let second = stream.append("todo.commands", &message("b")).await.unwrap();

        assert_eq!((first.sequence, second.sequence), (1, 2));
        assert_eq!(first.stream, "todo_commands");
        assert_eq!(stream.len(), 2);
    }

    #[tokio::test]
    async fn injected_failure_stores_nothing() {
        let stream = InMemoryCommandStream::provisioned();
        stream.fail_appends_with(StreamError::Unavailable("down".to_string()));

        assert!(stream.append("todo.commands", &message("a")).await.is_err());
        assert!(stream.is_empty());

        stream.clear_failure();
        assert!(stream.append("todo.commands", &message("a")).await.is_ok());
        assert_eq!(stream.len(), 1);
    }
}

//! Publishing commands with acknowledgment.
//!
//! [`CommandPublisher::publish`] seals a command into a [`CommandEnvelope`],
//! serializes it, appends it to the command stream and waits for the broker's
//! acknowledgment. It returns `Ok` only after the acknowledgment arrives.
//!
//! The publisher never retries. A failed publish is reported to the caller,
//! which decides whether to retry; the HTTP gateway does not.

use crate::command::TodoCommand;
use crate::envelope::CommandEnvelope;
use crate::environment::Clock;
use crate::observer::CommandObserver;
use crate::stream::{Acknowledgment, CommandStream, OutboundMessage, StreamError};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Header carrying the command's `type` tag.
pub const COMMAND_TYPE_HEADER: &str = "command-type";

/// Header carrying the envelope's `command_id`.
pub const COMMAND_ID_HEADER: &str = "command-id";

/// A command was not durably recorded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The envelope could not be serialized.
    #[error("failed to serialize command: {0}")]
    Serialization(String),

    /// The stream refused, timed out, or was unreachable.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The task running the publish ended without a result.
    #[error("publish aborted: {0}")]
    Aborted(String),
}

/// Proof that a command was stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Id stamped on the envelope
    pub command_id: Uuid,
    /// The broker's acknowledgment
    pub acknowledgment: Acknowledgment,
}

/// Appends commands to the command stream.
#[derive(Clone)]
pub struct CommandPublisher {
    stream: Arc<dyn CommandStream>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CommandObserver>,
}

impl CommandPublisher {
    /// Create a publisher writing to `stream`.
    #[must_use]
    pub fn new(
        stream: Arc<dyn CommandStream>,
        clock: Arc<dyn Clock>,
        observer: Arc<dyn CommandObserver>,
    ) -> Self {
        Self {
            stream,
            clock,
            observer,
        }
    }

    /// Seal `command`, append it to `subject` and wait for the acknowledgment.
    ///
    /// Messages are keyed by todo id when the command has one and by caller
    /// otherwise, so commands for the same todo stay in order.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Serialization`] if the envelope cannot be encoded.
    /// - [`PublishError::Stream`] if the stream does not acknowledge.
    pub async fn publish(
        &self,
        subject: &str,
        command: TodoCommand,
        correlation_id: Option<Uuid>,
    ) -> Result<PublishReceipt, PublishError> {
        let kind = command.kind();
        let envelope = CommandEnvelope::seal(command, self.clock.as_ref(), correlation_id);

        let payload = match envelope.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                let err = PublishError::Serialization(e.to_string());
                self.observer.publish_failed(kind, &err);
                return Err(err);
            },
        };

        let key = envelope
            .command
            .todo_id()
            .map_or_else(|| envelope.command.caller().to_string(), ToString::to_string);

        let message = OutboundMessage {
            key,
            payload,
            headers: vec![
                (COMMAND_TYPE_HEADER.to_string(), kind.type_tag().to_string()),
                (COMMAND_ID_HEADER.to_string(), envelope.command_id.to_string()),
            ],
        };

        let started = Instant::now();
        match self.stream.append(subject, &message).await {
            Ok(acknowledgment) => {
                let elapsed = started.elapsed();
                tracing::debug!(
                    subject = %subject,
                    command_type = kind.type_tag(),
                    command_id = %envelope.command_id,
                    partition = acknowledgment.partition,
                    sequence = acknowledgment.sequence,
                    elapsed_ms = elapsed.as_millis(),
                    "Command published"
                );
                self.observer.command_published(kind, &acknowledgment, elapsed);
                Ok(PublishReceipt {
                    command_id: envelope.command_id,
                    acknowledgment,
                })
            },
            Err(e) => {
                tracing::error!(
                    subject = %subject,
                    command_type = kind.type_tag(),
                    command_id = %envelope.command_id,
                    error = %e,
                    "Failed to publish command"
                );
                let err = PublishError::from(e);
                self.observer.publish_failed(kind, &err);
                Err(err)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::command::{CallerId, CreateTodo, DeleteTodo, TodoId};
    use crate::environment::SystemClock;
    use crate::observer::NoopObserver;
    use crate::stream::{StreamConfig, StreamProvisioned};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture {
        sent: Mutex<Vec<(String, OutboundMessage)>>,
        fail: bool,
    }

    impl CommandStream for Capture {
        fn ensure_stream(
            &self,
            _config: &StreamConfig,
        ) -> Pin<Box<dyn Future<Output = Result<StreamProvisioned, StreamError>> + Send + '_>> {
            Box::pin(async { Ok(StreamProvisioned::Created) })
        }

        fn append(
            &self,
            subject: &str,
            message: &OutboundMessage,
        ) -> Pin<Box<dyn Future<Output = Result<Acknowledgment, StreamError>> + Send + '_>> {
            let subject = subject.to_string();
            let message = message.clone();
            Box::pin(async move {
                if self.fail {
                    return Err(StreamError::Rejected {
                        subject,
                        reason: "broker said no".to_string(),
                    });
                }
                let mut sent = self.sent.lock().unwrap();
                sent.push((subject, message));
                Ok(Acknowledgment {
                    stream: "todo_commands".to_string(),
                    partition: 0,
                    sequence: i64::try_from(sent.len()).unwrap(),
                })
            })
        }
    }

    fn publisher(stream: Arc<Capture>) -> CommandPublisher {
        CommandPublisher::new(stream, Arc::new(SystemClock), Arc::new(NoopObserver))
    }

    fn caller() -> CallerId {
        CallerId::new("carol").unwrap()
    }

    #[tokio::test]
    async fn publish_appends_one_envelope_and_returns_ack() {
        let stream = Arc::new(Capture::default());
        let command = TodoCommand::CreateTodo(CreateTodo {
            id: None,
            title: "Ship it".to_string(),
            user_id: caller(),
        });

        let receipt = publisher(stream.clone())
            .publish("todo.commands", command.clone(), None)
            .await
            .unwrap();

        let sent = stream.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (subject, message) = &sent[0];
        assert_eq!(subject, "todo.commands");
        assert_eq!(message.key, "carol");

        let envelope = CommandEnvelope::from_slice(&message.payload).unwrap();
        assert_eq!(envelope.command, command);
        assert_eq!(envelope.command_id, receipt.command_id);
        assert_eq!(receipt.acknowledgment.sequence, 1);
    }

    #[tokio::test]
    async fn messages_for_a_todo_are_keyed_by_todo_id() {
        let stream = Arc::new(Capture::default());
        let command = TodoCommand::DeleteTodo(DeleteTodo {
            id: TodoId::new("t-9").unwrap(),
            user_id: caller(),
        });

        publisher(stream.clone())
            .publish("todo.commands", command, None)
            .await
            .unwrap();

        let sent = stream.sent.lock().unwrap();
        assert_eq!(sent[0].1.key, "t-9");
        assert!(sent[0].1.headers.contains(&(COMMAND_TYPE_HEADER.to_string(), "DeleteTodo".to_string())));
    }

    #[tokio::test]
    async fn stream_failure_is_surfaced() {
        let stream = Arc::new(Capture {
            fail: true,
            ..Capture::default()
        });
        let command = TodoCommand::DeleteTodo(DeleteTodo {
            id: TodoId::new("1").unwrap(),
            user_id: caller(),
        });

        let err = publisher(stream)
            .publish("todo.commands", command, None)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Stream(StreamError::Rejected { .. })));
    }
}

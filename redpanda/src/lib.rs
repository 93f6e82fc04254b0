//! Redpanda command stream for the todo command gateway.
//!
//! This crate implements the [`CommandStream`] trait from `todoflow-core` on top
//! of rdkafka, so the gateway can append commands to Redpanda, Apache Kafka, or
//! any other Kafka-compatible broker.
//!
//! # Mapping
//!
//! Each subject of a [`StreamConfig`] becomes a topic of the same name, created
//! with the configured partition count and replication factor. The stream name
//! is a logical label used in logs and acknowledgments.
//!
//! # Delivery Semantics
//!
//! **Acknowledged, at-least-once** publishing:
//! - The producer runs with `acks=all` and idempotence enabled by default
//! - `append` resolves only after the broker reports the offset
//! - `message.timeout.ms` bounds how long a send may wait for that report
//! - Messages are keyed, so commands for the same todo stay in one partition
//!
//! # Example
//!
//! ```no_run
//! use todoflow_core::stream::{CommandStream, StreamConfig};
//! use todoflow_redpanda::RedpandaCommandStream;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = RedpandaCommandStream::builder()
//!     .brokers("localhost:9092")
//!     .ack_timeout(std::time::Duration::from_secs(5))
//!     .build()?;
//!
//! stream.ensure_stream(&StreamConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use todoflow_core::stream::{
    Acknowledgment, CommandStream, OutboundMessage, StreamConfig, StreamError, StreamProvisioned,
};

/// Kafka-compatible command stream.
///
/// Holds one idempotent producer for appends and one admin client for
/// provisioning. Both are safe to share across request tasks.
///
/// # Example
///
/// ```no_run
/// use todoflow_redpanda::RedpandaCommandStream;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Basic configuration
/// let stream = RedpandaCommandStream::new("localhost:9092")?;
///
/// // Custom configuration
/// let stream = RedpandaCommandStream::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .compression("lz4")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaCommandStream {
    /// Producer used for appends
    producer: FutureProducer,
    /// Admin client used for topic provisioning
    admin: Arc<AdminClient<DefaultClientContext>>,
    /// Broker addresses
    brokers: String,
    /// Bounded wait for a delivery report
    ack_timeout: Duration,
    /// Bounded wait for admin operations
    admin_timeout: Duration,
}

impl RedpandaCommandStream {
    /// Create a command stream with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unavailable`] if the clients cannot be created
    /// (for example, an invalid broker list).
    pub fn new(brokers: &str) -> Result<Self, StreamError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the command stream.
    #[must_use]
    pub fn builder() -> RedpandaCommandStreamBuilder {
        RedpandaCommandStreamBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Get the bounded acknowledgment wait.
    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Wait up to `timeout` for queued messages to be delivered.
    ///
    /// Called on shutdown so commands already handed to the producer are not
    /// dropped with the process. Blocks the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AckTimeout`] if messages are still queued when
    /// `timeout` elapses.
    pub fn flush(&self, timeout: Duration) -> Result<(), StreamError> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|_| StreamError::AckTimeout {
                subject: "*".to_string(),
                timeout,
            })
    }

    async fn partition_count(&self, topic: &str) -> Result<usize, StreamError> {
        let admin = Arc::clone(&self.admin);
        let topic = topic.to_string();
        let timeout = self.admin_timeout;

        // fetch_metadata blocks the calling thread
        tokio::task::spawn_blocking(move || {
            let metadata = admin
                .inner()
                .fetch_metadata(Some(&topic), Timeout::After(timeout))
                .map_err(|e| StreamError::Unavailable(format!("Failed to fetch metadata: {e}")))?;

            metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .map(|t| t.partitions().len())
                .ok_or_else(|| StreamError::Other(format!("Topic '{topic}' missing from metadata")))
        })
        .await
        .map_err(|e| StreamError::Other(format!("Metadata task failed: {e}")))?
    }
}

/// Builder for configuring a [`RedpandaCommandStream`].
#[derive(Default)]
pub struct RedpandaCommandStreamBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    ack_timeout: Option<Duration>,
    admin_timeout: Option<Duration>,
    client_id: Option<String>,
}

impl RedpandaCommandStreamBuilder {
    /// Set the broker addresses.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// Default: "all". Idempotence is only enabled with "all".
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set how long an append may wait for its acknowledgment.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }

    /// Set how long provisioning calls may take.
    ///
    /// Default: 10 seconds
    #[must_use]
    pub const fn admin_timeout(mut self, timeout: Duration) -> Self {
        self.admin_timeout = Some(timeout);
        self
    }

    /// Set the Kafka `client.id` reported to the broker.
    ///
    /// Default: "todoflow-command-service"
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Producer settings derived from this builder.
    fn producer_config(&self, brokers: &str, ack_timeout: Duration) -> ClientConfig {
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", brokers)
            .set("client.id", self.client_id.as_deref().unwrap_or("todoflow-command-service"))
            .set("message.timeout.ms", ack_timeout.as_millis().to_string())
            .set("acks", acks)
            .set("enable.idempotence", if acks == "all" { "true" } else { "false" })
            .set("compression.type", self.compression.as_deref().unwrap_or("none"));
        config
    }

    /// Build the [`RedpandaCommandStream`].
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unavailable`] if:
    /// - Brokers not set
    /// - The producer or admin client cannot be created
    pub fn build(self) -> Result<RedpandaCommandStream, StreamError> {
        let brokers = self
            .brokers
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| StreamError::Unavailable("Brokers not configured".to_string()))?;
        let ack_timeout = self.ack_timeout.unwrap_or(Duration::from_secs(5));
        let admin_timeout = self.admin_timeout.unwrap_or(Duration::from_secs(10));

        let producer: FutureProducer = self
            .producer_config(&brokers, ack_timeout)
            .create()
            .map_err(|e| StreamError::Unavailable(format!("Failed to create producer: {e}")))?;

        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .create()
            .map_err(|e| StreamError::Unavailable(format!("Failed to create admin client: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            acks = self.producer_acks.as_deref().unwrap_or("all"),
            compression = self.compression.as_deref().unwrap_or("none"),
            ack_timeout_ms = ack_timeout.as_millis(),
            "RedpandaCommandStream created successfully"
        );

        Ok(RedpandaCommandStream {
            producer,
            admin: Arc::new(admin),
            brokers,
            ack_timeout,
            admin_timeout,
        })
    }
}

/// Map a failed delivery to the stream error the gateway understands.
fn delivery_error(subject: &str, error: &KafkaError, ack_timeout: Duration) -> StreamError {
    match error.rdkafka_error_code() {
        Some(RDKafkaErrorCode::MessageTimedOut | RDKafkaErrorCode::RequestTimedOut) => {
            StreamError::AckTimeout {
                subject: subject.to_string(),
                timeout: ack_timeout,
            }
        },
        Some(RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic) => {
            StreamError::NoStreamForSubject(subject.to_string())
        },
        Some(RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure) => {
            StreamError::Unavailable(error.to_string())
        },
        _ => StreamError::Rejected {
            subject: subject.to_string(),
            reason: error.to_string(),
        },
    }
}

impl CommandStream for RedpandaCommandStream {
    fn ensure_stream(
        &self,
        config: &StreamConfig,
    ) -> Pin<Box<dyn Future<Output = Result<StreamProvisioned, StreamError>> + Send + '_>> {
        let config = config.clone();

        Box::pin(async move {
            let topics: Vec<NewTopic<'_>> = config
                .subjects
                .iter()
                .map(|subject| {
                    NewTopic::new(
                        subject.as_str(),
                        config.partitions,
                        TopicReplication::Fixed(config.replication_factor),
                    )
                })
                .collect();
            let options =
                AdminOptions::new().operation_timeout(Some(Timeout::After(self.admin_timeout)));

            let results = self
                .admin
                .create_topics(&topics, &options)
                .await
                .map_err(|e| StreamError::Unavailable(format!("Failed to create topics: {e}")))?;

            let mut created = false;
            for result in results {
                match result {
                    Ok(topic) => {
                        tracing::debug!(stream = %config.name, topic = %topic, "Topic created");
                        created = true;
                    },
                    Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                        let partitions = self.partition_count(&topic).await?;
                        let expected = usize::try_from(config.partitions).unwrap_or_default();
                        if partitions != expected {
                            return Err(StreamError::ConflictingConfiguration {
                                stream: config.name.clone(),
                                reason: format!(
                                    "topic '{topic}' has {partitions} partitions, expected {expected}"
                                ),
                            });
                        }
                        tracing::debug!(stream = %config.name, topic = %topic, "Topic already exists");
                    },
                    Err((topic, code)) => {
                        return Err(StreamError::Other(format!(
                            "Failed to create topic '{topic}': {code}"
                        )));
                    },
                }
            }

            Ok(if created {
                StreamProvisioned::Created
            } else {
                StreamProvisioned::AlreadyExists
            })
        })
    }

    fn append(
        &self,
        subject: &str,
        message: &OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<Acknowledgment, StreamError>> + Send + '_>> {
        // Clone data before moving into async block
        let subject = subject.to_string();
        let message = message.clone();
        let ack_timeout = self.ack_timeout;

        Box::pin(async move {
            let headers = message
                .headers
                .iter()
                .fold(OwnedHeaders::new_with_capacity(message.headers.len()), |headers, (key, value)| {
                    headers.insert(Header {
                        key: key.as_str(),
                        value: Some(value.as_str()),
                    })
                });

            let record = FutureRecord::to(&subject)
                .payload(&message.payload)
                .key(&message.key)
                .headers(headers);

            // The queue wait shares the acknowledgment budget
            match self.producer.send(record, Timeout::After(ack_timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %subject,
                        partition = partition,
                        offset = offset,
                        key = %message.key,
                        "Command appended"
                    );
                    Ok(Acknowledgment {
                        stream: subject,
                        partition,
                        sequence: offset,
                    })
                },
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %subject,
                        error = %kafka_error,
                        "Failed to append command"
                    );
                    Err(delivery_error(&subject, &kafka_error, ack_timeout))
                },
            }
        })
    }
}

//! Integration tests for [`RedpandaCommandStream`] with a real Kafka instance.
//!
//! These tests use testcontainers to spin up Kafka and validate:
//! - Idempotent provisioning (including concurrent callers)
//! - Conflicting configuration detection
//! - Acknowledged appends that can be read back
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they:
//! - Require Docker to be running (for testcontainers)
//! - Take 15-60 seconds per test to spin up Kafka
//!
//! To run explicitly:
//! ```bash
//! cargo test -p todoflow-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use futures::StreamExt;
use rdkafka::Message;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};
use todoflow_core::stream::{
    CommandStream, OutboundMessage, StreamConfig, StreamError, StreamProvisioned,
};
use todoflow_redpanda::RedpandaCommandStream;

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

/// Helper to wait until the broker answers admin requests
async fn ready_stream(brokers: &str, config: &StreamConfig) -> RedpandaCommandStream {
    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        let stream = RedpandaCommandStream::builder()
            .brokers(brokers)
            .admin_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build command stream");
        if stream.ensure_stream(config).await.is_ok() {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
    unreachable!()
}

fn message(key: &str, n: usize) -> OutboundMessage {
    OutboundMessage {
        key: key.to_string(),
        payload: format!(r#"{{"type":"DeleteTodo","id":"{n}","user_id":"it"}}"#).into_bytes(),
        headers: vec![("command-id".to_string(), n.to_string())],
    }
}

#[tokio::test]
#[ignore]
async fn test_provisioning_twice_is_a_no_op() {
    let (_kafka, brokers) = start_kafka().await;
    let config = StreamConfig::new("todo_commands", vec!["todo.commands.provision".to_string()]);

    // First successful call creates the topic
    let stream = ready_stream(&brokers, &config).await;

    let again = stream
        .ensure_stream(&config)
        .await
        .expect("Re-provisioning should succeed");
    assert_eq!(again, StreamProvisioned::AlreadyExists);

    // Two instances racing at startup both succeed
    let stream = Arc::new(stream);
    let (a, b) = tokio::join!(stream.ensure_stream(&config), stream.ensure_stream(&config));
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
#[ignore]
async fn test_conflicting_partition_count_is_reported() {
    let (_kafka, brokers) = start_kafka().await;
    let config = StreamConfig::new("todo_commands", vec!["todo.commands.conflict".to_string()]);
    let stream = ready_stream(&brokers, &config).await;

    let err = stream
        .ensure_stream(&config.clone().with_partitions(3))
        .await
        .expect_err("Partition mismatch should fail");
    assert!(matches!(err, StreamError::ConflictingConfiguration { .. }));
}

#[tokio::test]
#[ignore]
async fn test_concurrent_appends_are_all_recorded() {
    let (_kafka, brokers) = start_kafka().await;
    let topic = "todo.commands.append";
    let config = StreamConfig::new("todo_commands", vec![topic.to_string()]).with_partitions(3);
    let stream = Arc::new(ready_stream(&brokers, &config).await);

    let total = 20;
    let mut handles = Vec::new();
    for n in 0..total {
        let stream = Arc::clone(&stream);
        handles.push(tokio::spawn(async move {
            stream.append(topic, &message(&format!("todo-{}", n % 4), n)).await
        }));
    }
    for handle in handles {
        let ack = handle
            .await
            .expect("Append task panicked")
            .expect("Append should be acknowledged");
        assert_eq!(ack.stream, topic);
        assert!(ack.sequence >= 0);
    }

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", "todoflow-it")
        .set("auto.offset.reset", "earliest")
        .set("enable.partition.eof", "false")
        .create()
        .expect("Failed to create consumer");
    consumer.subscribe(&[topic]).expect("Failed to subscribe");

    let mut seen = HashSet::new();
    let mut received = 0;
    let mut messages = consumer.stream();
    tokio::time::timeout(Duration::from_secs(30), async {
        while received < total {
            let msg = messages
                .next()
                .await
                .expect("Consumer stream ended")
                .expect("Failed to receive message");
            let payload = msg.payload().expect("Message has no payload").to_vec();
            seen.insert(payload);
            received += 1;
        }
    })
    .await
    .expect("Timeout waiting for messages");

    assert_eq!(received, total);
    assert_eq!(seen.len(), total);
}

//! Startup wiring against the in-memory command stream.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use todoflow_command_service::startup::{self, StartupError};
use todoflow_command_service::{Config, ConfigError};
use todoflow_core::provision::ProvisionError;
use todoflow_core::stream::{StreamConfig, StreamProvisioned};
use todoflow_testing::{InMemoryCommandStream, RecordingObserver};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

fn config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<&str, &str> = HashMap::from([
        ("BROKER_URL", "localhost:9092"),
        ("HTTP_ADDR", "127.0.0.1:0"),
        ("LOG_LEVEL", "debug"),
        ("METRICS_ADDR", "127.0.0.1:0"),
    ]);
    vars.extend(extra.iter().copied());
    Config::from_lookup(|name| vars.get(name).map(|v| (*v).to_string())).unwrap()
}

#[tokio::test]
async fn provisioning_at_startup_is_idempotent() {
    let stream = Arc::new(InMemoryCommandStream::new());
    let config = config(&[]);

    let first = startup::provision(stream.clone(), &config).await.unwrap();
    let second = startup::provision(stream.clone(), &config).await.unwrap();

    assert_eq!(first, StreamProvisioned::Created);
    assert_eq!(second, StreamProvisioned::AlreadyExists);
    assert_eq!(stream.stream_count(), 1);
}

#[tokio::test]
async fn conflicting_stream_aborts_startup() {
    use todoflow_core::stream::CommandStream;

    let stream = Arc::new(InMemoryCommandStream::new());
    stream
        .ensure_stream(&StreamConfig::new("todo_commands", vec!["legacy.subject".to_string()]))
        .await
        .unwrap();

    let err = startup::provision(stream, &config(&[])).await.unwrap_err();

    assert!(matches!(err, StartupError::Provision(ProvisionError::Stream { .. })));
}

#[tokio::test]
async fn production_config_wires_strict_identity() {
    let stream = Arc::new(InMemoryCommandStream::new());
    let config = config(&[("ENV", "production"), ("COMMAND_SUBJECT", "todo.cmds")]);
    startup::provision(stream.clone(), &config).await.unwrap();

    let observer = Arc::new(RecordingObserver::new());
    let app = todoflow_web::router(startup::build_state(&config, stream.clone(), observer.clone()));

    let anonymous = Request::builder()
        .method(Method::POST)
        .uri("/todos")
        .body(Body::from(r#"{"title":"x"}"#))
        .unwrap();
    let response = app.clone().oneshot(anonymous).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let identified = Request::builder()
        .method(Method::POST)
        .uri("/todos")
        .header("X-User-ID", "frank")
        .body(Body::from(r#"{"title":"x"}"#))
        .unwrap();
    let response = app.oneshot(identified).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let messages = stream.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "todo.cmds");
    assert_eq!(observer.published_count(), 1);
}

#[test]
fn missing_configuration_is_reported_before_startup() {
    let err = Config::from_lookup(|_| None).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Missing(vec!["BROKER_URL", "HTTP_ADDR", "LOG_LEVEL", "METRICS_ADDR"])
    );
}

#[tokio::test]
async fn serve_answers_until_shutdown() {
    let stream = Arc::new(InMemoryCommandStream::provisioned());
    let config = config(&[]);
    let app = todoflow_web::router(startup::build_state(
        &config,
        stream,
        Arc::new(RecordingObserver::new()),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(startup::serve(
        listener,
        app,
        async move {
            let _ = stop_rx.await;
        },
        Duration::from_secs(5),
    ));

    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    conn.read_to_string(&mut raw).await.unwrap();

    assert!(raw.starts_with("HTTP/1.1 200"), "unexpected response: {raw}");
    assert!(raw.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(raw.ends_with(r#"{"status":"ok"}"#));

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

//! Startup sequence and graceful shutdown.
//!
//! 1. Install the Prometheus exporter
//! 2. Connect the Redpanda command stream
//! 3. Provision the stream (already existing is fine)
//! 4. Build the gateway and serve until SIGINT or SIGTERM
//! 5. Give in-flight requests the grace period, then flush the producer
//!
//! Any failure before the listener accepts connections is a [`StartupError`]
//! and the process exits without serving traffic.

use crate::config::Config;
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use todoflow_core::environment::SystemClock;
use todoflow_core::observer::CommandObserver;
use todoflow_core::provision::{ProvisionError, StreamProvisioner};
use todoflow_core::publisher::CommandPublisher;
use todoflow_core::stream::{CommandStream, StreamError, StreamProvisioned};
use todoflow_redpanda::RedpandaCommandStream;
use todoflow_web::{AppState, PrometheusObserver, router};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// The service could not start.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Logging or metrics could not be initialised.
    #[error("telemetry setup failed: {0}")]
    Telemetry(String),

    /// The broker client could not be created.
    #[error("broker connection failed: {0}")]
    Broker(#[from] StreamError),

    /// The command stream could not be provisioned.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// The HTTP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address requested
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `log_level` when set.
///
/// # Errors
///
/// Returns [`StartupError::Telemetry`] if a subscriber is already installed.
pub fn init_tracing(log_level: &str) -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| StartupError::Telemetry(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| StartupError::Telemetry(e.to_string()))
}

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// # Errors
///
/// Returns [`StartupError::Telemetry`] if the exporter cannot be installed.
pub fn install_metrics(addr: SocketAddr) -> Result<(), StartupError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| StartupError::Telemetry(format!("metrics exporter on {addr}: {e}")))?;
    todoflow_web::metrics::describe_metrics();
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Ensure the configured stream exists.
///
/// # Errors
///
/// Returns [`StartupError::Provision`] for anything but success or
/// already-exists.
pub async fn provision(
    stream: Arc<dyn CommandStream>,
    config: &Config,
) -> Result<StreamProvisioned, StartupError> {
    let outcome = StreamProvisioner::new(stream)
        .ensure(&config.stream_config())
        .await?;
    Ok(outcome)
}

/// Gateway state wired for `config`.
#[must_use]
pub fn build_state(
    config: &Config,
    stream: Arc<dyn CommandStream>,
    observer: Arc<dyn CommandObserver>,
) -> AppState {
    let publisher = CommandPublisher::new(stream, Arc::new(SystemClock), observer.clone());
    AppState::new(publisher, config.subject.as_str())
        .with_observer(observer)
        .with_identity_policy(config.identity_policy())
}

/// Serve `app` until `shutdown` resolves.
///
/// After the signal the listener stops accepting and in-flight requests get
/// up to `grace` to finish.
///
/// # Errors
///
/// Returns [`StartupError::Serve`] if the server fails.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace: Duration,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    let grace_elapsed = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = &mut server => result.map_err(StartupError::Serve),
        () = grace_elapsed => {
            warn!(grace_secs = grace.as_secs(), "Grace period elapsed with requests in flight");
            Ok(())
        }
    }
}

/// Run the service with `config` until a shutdown signal.
///
/// # Errors
///
/// Returns a [`StartupError`] if any startup step fails or the server stops
/// with an error.
pub async fn run(config: Config) -> Result<(), StartupError> {
    info!(
        brokers = %config.broker_url,
        stream = %config.stream_name,
        subject = %config.subject,
        environment = %config.environment,
        "Configuration loaded"
    );

    install_metrics(config.metrics_addr)?;

    let stream = Arc::new(
        RedpandaCommandStream::builder()
            .brokers(&config.broker_url)
            .ack_timeout(config.publish_ack_timeout)
            .build()?,
    );

    let outcome = provision(stream.clone(), &config).await?;
    info!(stream = %config.stream_name, ?outcome, "Command stream ready");

    let state = build_state(&config, stream.clone(), Arc::new(PrometheusObserver::new()));
    let app = router(state);

    let listener = TcpListener::bind(config.http_addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.http_addr,
            source,
        })?;
    info!(addr = %config.http_addr, "HTTP server listening");

    serve(listener, app, shutdown_signal(), config.shutdown_timeout).await?;

    let flush_timeout = config.publish_ack_timeout;
    match tokio::task::spawn_blocking(move || stream.flush(flush_timeout)).await {
        Ok(Ok(())) => info!("Producer flushed"),
        Ok(Err(e)) => warn!(error = %e, "Producer flush incomplete"),
        Err(e) => warn!(error = %e, "Producer flush task failed"),
    }

    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (on unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}

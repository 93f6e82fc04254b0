//! Command service binary.
//!
//! ```bash
//! BROKER_URL=localhost:9092 HTTP_ADDR=0.0.0.0:8080 \
//! LOG_LEVEL=info METRICS_ADDR=0.0.0.0:9090 \
//!     cargo run --bin command-service
//! ```

use std::process::ExitCode;
use todoflow_command_service::{Config, SERVICE_NAME, startup};
use tracing::Instrument;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{SERVICE_NAME}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = startup::init_tracing(&config.log_level) {
        eprintln!("{SERVICE_NAME}: {e}");
        return ExitCode::FAILURE;
    }

    let span = tracing::info_span!("service", service = SERVICE_NAME);
    match startup::run(config).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(service = SERVICE_NAME, error = %e, "Service failed");
            ExitCode::FAILURE
        }
    }
}

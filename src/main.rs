//! Workspace entry point: the `ems-run` server binary.
//!
//! Loads environment configuration, initialises tracing and serves the
//! dispatch REST API. Per-crate binaries exist for development (`ems-api-rest`
//! for the REST server alone, `ems` for the command line tools).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Starts the dispatch REST server.
///
/// # Environment Variables
/// - `EMS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `EMS_INCIDENT_PREFIX`: prefix for generated incident codes (default: "EMG")
/// - `EMS_STALE_AFTER_SECS`: position samples older than this are advisory-stale
/// - `EMS_ASSUMED_TRANSPORT_SECS`: assumed hospital transport time for the ETA heuristic
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("ems=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("EMS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Starting EMS dispatch REST on {}", rest_addr);

    let state = api_rest::state_from_env()?;
    api_rest::serve(&rest_addr, state).await
}

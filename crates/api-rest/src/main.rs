//! Standalone processing service binary.
//!
//! ## Purpose
//! Runs the HealthRecord processing service (REST, with OpenAPI/Swagger UI) on its own.
//!
//! ## Intended use
//! Useful during development when only the HTTP surface is needed. The workspace's
//! `healthrec-run` binary runs the same service with the workspace-wide log directives.

use healthrec_core::CoreConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the processing service.
///
/// # Environment Variables
/// - `HEALTHREC_REST_ADDR`: server address (default: "0.0.0.0:3000")
/// - `HEALTHREC_DATA_DIR`, `HEALTHREC_SIGNING_SECRET`, `API_KEY` and the other core settings
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the core configuration is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::from_lookup(|var| std::env::var(var).ok())?;
    let addr = std::env::var(api_rest::REST_ADDR_VAR)
        .unwrap_or_else(|_| api_rest::DEFAULT_REST_ADDR.into());

    api_rest::serve(&cfg, &addr).await
}

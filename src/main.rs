use healthrec_core::CoreConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the HealthRecord application
///
/// Starts the processing service that the upload pipeline calls after every upload, with
/// OpenAPI/Swagger UI, on port 3000 (configurable via `HEALTHREC_REST_ADDR`).
///
/// # Environment Variables
/// - `HEALTHREC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HEALTHREC_DATA_DIR`: directory for accounts, documents and stored files (default: "healthrec_data")
/// - `HEALTHREC_SIGNING_SECRET`: secret for signed download URLs (required)
/// - `API_KEY`: API key required on `POST /process` (optional)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("healthrec_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("healthrec_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::from_lookup(|var| std::env::var(var).ok())?;
    let rest_addr = std::env::var(api_rest::REST_ADDR_VAR)
        .unwrap_or_else(|_| api_rest::DEFAULT_REST_ADDR.into());

    tracing::info!("++ Starting HealthRecord on {}", rest_addr);

    api_rest::serve(&cfg, &rest_addr).await
}

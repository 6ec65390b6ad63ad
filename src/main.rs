use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use femcare_core::{CoreConfig, CoreServices};

/// Main entry point for the FemCare application
///
/// Resolves configuration, builds the core services, starts the session observer and
/// serves the REST API.
///
/// # Environment Variables
/// - `FEMCARE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FEMCARE_STORE`: `memory` or `file` (default: "file")
/// - `FEMCARE_DATA_DIR`: Directory for the file store (default: "femcare_data")
/// - `FEMCARE_BCRYPT_COST`, `FEMCARE_MAX_FAILED_SIGN_INS`, `FEMCARE_DASHBOARD_POLICY`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("femcare_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("femcare_run=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::resolve(|key| std::env::var(key).ok())?);
    let rest_addr =
        std::env::var("FEMCARE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!(
        store = ?cfg.store_backend(),
        data_dir = %cfg.data_dir().display(),
        dashboard_policy = %cfg.dashboard_policy(),
        "configuration resolved"
    );

    let services = CoreServices::build(cfg);
    let observer = tokio::spawn(services.session.clone().run());

    let app = router(AppState::new(services));

    tracing::info!("++ Starting FemCare REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    observer.abort();
    Ok(())
}

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::config::Config;
use api::db::create_pool;
use api::middleware::auth::AuthVerifier;
use api::middleware::metrics::HttpMetrics;
use api::routes::build_router;
use api::state::AppState;
use api::webhook::clerk::WebhookVerifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config).await?;

    // Verifiers fail here, not per request, when their key material is bad
    let auth = AuthVerifier::new(&config.clerk_jwt_key)?;
    let webhook = WebhookVerifier::new(&config.clerk_webhook_secret)?;

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        metrics: HttpMetrics::new(),
        auth,
        webhook,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!(event = "api.running", "Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

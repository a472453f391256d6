use sqlx::PgPool;

use crate::config::Config;
use crate::middleware::auth::AuthVerifier;
use crate::middleware::metrics::HttpMetrics;
use crate::webhook::clerk::WebhookVerifier;

/// Shared application state injected into all route handlers via Axum
/// extractors. Constructed once at startup and cloned per request; there is
/// no global state.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub metrics: HttpMetrics,
    pub auth: AuthVerifier,
    pub webhook: WebhookVerifier,
}

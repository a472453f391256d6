pub mod health;
pub mod metrics;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

use crate::middleware::{auth, metrics as http_metrics};
use crate::state::AppState;
use crate::users::handlers;
use crate::webhook::clerk;

/// Assembles the full application router.
///
/// `/health`, `/metrics` and the webhook endpoint stay outside the auth
/// chain; `/web` routes run authenticate → require_auth. The metrics
/// middleware wraps everything except CORS pre-flights (filtered inside).
pub fn build_router(state: AppState) -> Router {
    let web = Router::new()
        .route(
            "/web/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/web/users/:id",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route_layer(from_fn(auth::require_auth))
        .route_layer(from_fn_with_state(state.clone(), auth::authenticate));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/webhook/clerk", post(clerk::handle_clerk_webhook))
        .merge(web)
        .layer(from_fn_with_state(state.clone(), http_metrics::track_http))
        .with_state(state)
}

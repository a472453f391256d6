use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// GET /metrics: Prometheus text exposition.
///
/// When both metrics credentials are configured the endpoint demands HTTP
/// Basic auth; otherwise it is open (scraping from inside the network).
pub async fn metrics_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let (Some(username), Some(password)) = (
        state.config.metrics_username.as_deref(),
        state.config.metrics_password.as_deref(),
    ) {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        if !check_basic_auth(authorization, username, password) {
            return (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Metrics\"")],
                "Authentication required",
            )
                .into_response();
        }
    }

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(event = "metrics.encode.error", error = %e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error collecting metrics").into_response()
        }
    }
}

/// Parses an `Authorization: Basic <base64>` header and compares both
/// credentials in constant time.
fn check_basic_auth(authorization: Option<&str>, username: &str, password: &str) -> bool {
    let Some(encoded) = authorization.and_then(|value| value.strip_prefix("Basic ")) else {
        return false;
    };
    let Ok(decoded) = BASE64.decode(encoded) else {
        return false;
    };
    let Ok(credentials) = String::from_utf8(decoded) else {
        return false;
    };
    let Some((provided_user, provided_password)) = credentials.split_once(':') else {
        return false;
    };

    // Evaluate both comparisons so a username mismatch doesn't short-circuit.
    let user_ok = constant_time_eq(provided_user.as_bytes(), username.as_bytes());
    let password_ok = constant_time_eq(provided_password.as_bytes(), password.as_bytes());
    user_ok && password_ok
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        let _ = b.ct_eq(b);
        return false;
    }
    a.ct_eq(b).into()
}

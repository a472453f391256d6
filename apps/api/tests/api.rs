//! Router-level tests.
//!
//! The app is exercised through `tower::ServiceExt::oneshot` against a
//! lazily-connected pool, so every path that stops before the database
//! (health, metrics, validation failures, auth rejections, webhook
//! signature checks) runs without any external service.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

use api::config::Config;
use api::db::create_lazy_pool;
use api::middleware::auth::AuthVerifier;
use api::middleware::metrics::HttpMetrics;
use api::routes::build_router;
use api::state::AppState;
use api::webhook::clerk::WebhookVerifier;

const JWT_PRIVATE_KEY_PEM: &str = include_str!("../testdata/jwt_private.pem");
const JWT_PUBLIC_KEY_PEM: &str = include_str!("../testdata/jwt_public.pem");
const WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

fn test_config(metrics_credentials: bool) -> Config {
    Config {
        pg_host: "127.0.0.1".to_string(),
        // Nothing listens here; only paths that never reach the pool are
        // exercised against this config.
        pg_port: 1,
        pg_user: "api".to_string(),
        pg_password: "api".to_string(),
        pg_database: "api_test".to_string(),
        clerk_jwt_key: JWT_PUBLIC_KEY_PEM.to_string(),
        clerk_webhook_secret: WEBHOOK_SECRET.to_string(),
        metrics_username: metrics_credentials.then(|| "prom".to_string()),
        metrics_password: metrics_credentials.then(|| "scrape-secret".to_string()),
        port: 0,
        rust_log: "info".to_string(),
    }
}

fn test_app_with_config(config: Config) -> axum::Router {
    let state = AppState {
        db: create_lazy_pool(&config),
        metrics: HttpMetrics::new(),
        auth: AuthVerifier::new(&config.clerk_jwt_key).unwrap(),
        webhook: WebhookVerifier::new(&config.clerk_webhook_secret).unwrap(),
        config,
    };
    build_router(state)
}

fn test_app() -> axum::Router {
    test_app_with_config(test_config(false))
}

#[derive(Serialize)]
struct SessionClaims {
    sub: String,
    sid: String,
    exp: i64,
}

fn bearer_token() -> String {
    let claims = SessionClaims {
        sub: "user_2abcdef".to_string(),
        sid: "sess_2abcdef".to_string(),
        exp: Utc::now().timestamp() + 3600,
    };
    let key = EncodingKey::from_rsa_pem(JWT_PRIVATE_KEY_PEM.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
}

fn sign_webhook(msg_id: &str, timestamp: &str, body: &[u8]) -> String {
    let key = BASE64
        .decode(WEBHOOK_SECRET.strip_prefix("whsec_").unwrap())
        .unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
    mac.update(format!("{msg_id}.{timestamp}.").as_bytes());
    mac.update(body);
    format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// -- Health -------------------------------------------------------------------

#[tokio::test]
async fn test_health_returns_ok() {
    let response = test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

// -- Auth guard ---------------------------------------------------------------

#[tokio::test]
async fn test_guarded_route_without_token_returns_401() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/web/users")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Authentication required");
}

#[tokio::test]
async fn test_guarded_route_with_invalid_token_returns_401() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/web/users")
                .header(header::AUTHORIZATION, "Bearer not.a.valid.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_guarded_route_with_valid_token_passes_the_guard() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/web/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // The guard passed; the request then failed at the (unreachable)
    // database, which is the generic 500 path.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_is_not_guarded() {
    // No Authorization header at all, yet the route responds.
    let response = test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Validation ---------------------------------------------------------------

#[tokio::test]
async fn test_create_user_with_invalid_email_returns_400() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "name": "Jane", "email": "not-an-email" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid request data");
    assert_eq!(body["details"][0]["field"], "email");
}

#[tokio::test]
async fn test_create_user_with_empty_name_returns_400() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "name": "", "email": "jane@example.com" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"][0]["field"], "name");
}

#[tokio::test]
async fn test_create_user_with_malformed_json_returns_400() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_users_with_oversized_page_size_returns_400() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/web/users?pageSize=1000")
                .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"][0]["field"], "pageSize");
}

#[tokio::test]
async fn test_list_users_with_page_zero_returns_400() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/web/users?page=0")
                .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_user_with_malformed_id_returns_400() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/web/users/not-a-uuid")
                .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- Webhook ------------------------------------------------------------------

#[tokio::test]
async fn test_webhook_without_svix_headers_returns_400() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/clerk")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"type":"user.created","data":{}}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Missing svix headers");
}

#[tokio::test]
async fn test_webhook_with_tampered_signature_returns_400() {
    let body = r#"{"type":"user.created","data":{"id":"user_1"}}"#;
    let timestamp = Utc::now().timestamp().to_string();
    let signature = sign_webhook("msg_1", &timestamp, b"a different body entirely");

    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/clerk")
                .header(header::CONTENT_TYPE, "application/json")
                .header("svix-id", "msg_1")
                .header("svix-timestamp", &timestamp)
                .header("svix-signature", &signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_with_stale_timestamp_returns_400() {
    let body = r#"{"type":"user.created","data":{"id":"user_1"}}"#;
    let timestamp = (Utc::now().timestamp() - 3600).to_string();
    let signature = sign_webhook("msg_1", &timestamp, body.as_bytes());

    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/clerk")
                .header(header::CONTENT_TYPE, "application/json")
                .header("svix-id", "msg_1")
                .header("svix-timestamp", &timestamp)
                .header("svix-signature", &signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_with_valid_signature_and_unhandled_type_returns_200() {
    let body = r#"{"type":"session.created","data":{"id":"sess_1"}}"#;
    let timestamp = Utc::now().timestamp().to_string();
    let signature = sign_webhook("msg_1", &timestamp, body.as_bytes());

    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/clerk")
                .header(header::CONTENT_TYPE, "application/json")
                .header("svix-id", "msg_1")
                .header("svix-timestamp", &timestamp)
                .header("svix-signature", &signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "success": true }));
}

#[tokio::test]
async fn test_webhook_with_valid_signature_but_invalid_json_returns_400() {
    let body = "this is not json";
    let timestamp = Utc::now().timestamp().to_string();
    let signature = sign_webhook("msg_1", &timestamp, body.as_bytes());

    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/clerk")
                .header("svix-id", "msg_1")
                .header("svix-timestamp", &timestamp)
                .header("svix-signature", &signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- Metrics ------------------------------------------------------------------

#[tokio::test]
async fn test_metrics_exposes_tracked_requests() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_string(response).await;
    assert!(text.contains("boilerplate_http_requests_total"));
    assert!(text.contains("route=\"/health\""));
    assert!(text.contains("status_code=\"200\""));
}

#[tokio::test]
async fn test_metrics_use_route_patterns_not_concrete_paths() {
    let app = test_app();

    // 401 before any handler runs, but the request is still tracked.
    let id = "7b68a6fa-3f12-4e7e-a6ef-2f7d94f37c42";
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/web/users/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let text = body_string(response).await;
    assert!(text.contains("route=\"/web/users/:id\""));
    assert!(!text.contains(id));
}

#[tokio::test]
async fn test_metrics_with_credentials_requires_basic_auth() {
    let app = test_app_with_config(test_config(true));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"Metrics\""
    );

    let wrong = format!("Basic {}", BASE64.encode("prom:wrong"));
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, wrong)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let correct = format!("Basic {}", BASE64.encode("prom:scrape-secret"));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, correct)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_options_requests_are_not_tracked() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // No OPTIONS handler is mounted; only the tracking behavior matters here.
    assert_ne!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let text = body_string(response).await;
    assert!(!text.contains("method=\"OPTIONS\""));
}

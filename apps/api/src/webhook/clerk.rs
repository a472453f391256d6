//! Clerk webhook endpoint.
//!
//! Clerk delivers user lifecycle events signed with the svix scheme: the
//! `svix-id`, `svix-timestamp` and `svix-signature` headers accompany the
//! raw JSON body, and the signature is an HMAC-SHA256 over
//! `{id}.{timestamp}.{body}` with the shared `whsec_` secret. Anything that
//! fails to verify is a 400; a verified event that cannot be processed is a
//! 500 so the provider retries.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::state::AppState;
use crate::webhook::sync;

type HmacSha256 = Hmac<Sha256>;

/// Reject events whose timestamp is further than this from now, in either
/// direction (svix default tolerance).
const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

/// Verifies svix-signed webhook payloads with the shared endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    /// Decodes the `whsec_`-prefixed base64 endpoint secret. Fails at
    /// startup on a malformed secret rather than rejecting every delivery.
    pub fn new(secret: &str) -> Result<Self> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64
            .decode(encoded)
            .context("CLERK_WEBHOOK_SECRET is not valid base64")?;
        Ok(Self { key })
    }

    /// Verifies one delivery. The signed content is `{id}.{timestamp}.{body}`
    /// and the signature header carries space-separated `v1,<base64>`
    /// entries; any matching entry passes.
    pub fn verify(
        &self,
        msg_id: &str,
        timestamp: &str,
        signature_header: &str,
        body: &[u8],
    ) -> Result<(), AppError> {
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AppError::SignatureVerification("invalid svix-timestamp".to_string()))?;
        let now = Utc::now().timestamp();
        if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(AppError::SignatureVerification(
                "webhook timestamp outside of tolerance".to_string(),
            ));
        }

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| AppError::SignatureVerification("invalid webhook key".to_string()))?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        let expected = BASE64.encode(mac.finalize().into_bytes());

        let matched = signature_header
            .split_whitespace()
            .filter_map(|entry| entry.strip_prefix("v1,"))
            .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()));

        if matched {
            Ok(())
        } else {
            Err(AppError::SignatureVerification(
                "no signature matched".to_string(),
            ))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        // Dummy comparison to keep timing independent of the length check.
        let _ = b.ct_eq(b);
        return false;
    }
    a.ct_eq(b).into()
}

/// User payload carried by `user.created` / `user.updated` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ClerkUserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

/// Minimal event envelope; only `type` and `data` matter here.
#[derive(Debug, Deserialize)]
struct ClerkEvent {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

/// POST /webhook/clerk
///
/// Handles `user.created`, `user.updated` and `user.deleted`; other event
/// types are acknowledged and logged.
pub async fn handle_clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        event = "webhook.clerk.request",
        body_length = body.len(),
        "Webhook request received"
    );

    let svix_id = header_str(&headers, "svix-id");
    let svix_timestamp = header_str(&headers, "svix-timestamp");
    let svix_signature = header_str(&headers, "svix-signature");

    let (msg_id, timestamp, signature) = match (svix_id, svix_timestamp, svix_signature) {
        (Some(id), Some(ts), Some(sig)) => (id, ts, sig),
        _ => {
            tracing::error!(event = "webhook.clerk.error", "Missing svix headers");
            return Err(AppError::malformed("Missing svix headers"));
        }
    };

    state.webhook.verify(msg_id, timestamp, signature, &body)?;

    let event: ClerkEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::malformed(format!("invalid webhook payload: {e}")))?;

    tracing::info!(
        event = "webhook.clerk.received",
        kind = %event.kind,
        "Clerk webhook received"
    );

    let outcome = match event.kind.as_str() {
        "user.created" | "user.updated" => {
            let user: ClerkUserData = serde_json::from_value(event.data)
                .map_err(|e| AppError::malformed(format!("invalid user payload: {e}")))?;
            sync::sync_user(&state.db, &user).await
        }
        "user.deleted" => {
            let clerk_id = event
                .data
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| AppError::malformed("webhook data missing field: id"))?;
            sync::delete_user(&state.db, clerk_id).await
        }
        other => {
            tracing::warn!(
                event = "webhook.clerk.unhandled",
                kind = %other,
                "Unhandled webhook event type"
            );
            Ok(())
        }
    };

    if let Err(e) = outcome {
        tracing::error!(
            event = "webhook.clerk.processing.error",
            kind = %event.kind,
            error = ?e,
            "Failed to process webhook event"
        );
        return Err(AppError::Internal(e));
    }

    Ok(Json(json!({ "success": true })))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

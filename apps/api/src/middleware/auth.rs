//! Clerk session authentication.
//!
//! Three stages: [`authenticate`] verifies the bearer token and, on success,
//! populates an [`AuthContext`] in the request extensions; handlers and the
//! [`require_auth`] guard read that context; the guard rejects with 401 when
//! it is missing. Routes outside the guard stay reachable without
//! credentials even though token verification ran.

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;

/// Claims carried by a Clerk session token. Only the subset we consume.
#[derive(Debug, Deserialize)]
pub struct SessionClaims {
    /// Clerk user id.
    pub sub: String,
    /// Clerk session id.
    #[serde(default)]
    pub sid: Option<String>,
    pub exp: usize,
}

/// Verifies Clerk session tokens against the instance public key.
#[derive(Clone)]
pub struct AuthVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthVerifier {
    /// Builds a verifier from the PEM-encoded RSA public key Clerk issues
    /// for networkless token verification.
    pub fn new(public_key_pem: &str) -> Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .context("CLERK_JWT_KEY is not a valid RSA public key PEM")?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.leeway = 30; // clock skew tolerance in seconds

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

/// Per-request authentication context, available to downstream middleware
/// and handlers once [`authenticate`] has verified the session token.
///
/// Profile fields are placeholders; they are filled from the user record
/// where a handler needs them, not during token verification.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub session_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl AuthContext {
    fn from_claims(claims: SessionClaims) -> Self {
        AuthContext {
            user_id: claims.sub,
            session_id: claims.sid.unwrap_or_default(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

/// Verifies the bearer token when present and populates [`AuthContext`].
/// Never rejects on its own: unauthenticated requests simply proceed
/// without a context.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if let Some(token) = token {
        match state.auth.verify(token) {
            Ok(claims) => {
                let context = AuthContext::from_claims(claims);
                tracing::debug!(
                    event = "auth.clerk.success",
                    user_id = %context.user_id,
                    session_id = %context.session_id,
                    "User authenticated via Clerk"
                );
                request.extensions_mut().insert(context);
            }
            Err(e) => {
                tracing::debug!(event = "auth.clerk.invalid", error = %e, "Bearer token rejected");
            }
        }
    }

    next.run(request).await
}

/// Guard middleware: 401 for any request lacking a populated [`AuthContext`].
/// Must run after [`authenticate`].
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthContext>().is_none() {
        tracing::warn!(
            event = "auth.unauthorized",
            path = %request.uri().path(),
            method = %request.method(),
            "Unauthorized access attempt"
        );
        return AppError::Unauthorized.into_response();
    }

    next.run(request).await
}

//! Request and response validation.
//!
//! Every route declares its contract through typed extractors: path params,
//! query and body are checked in handler-argument order, and a failure
//! short-circuits with a 400 carrying field-level detail. Response payloads
//! go out through [`CheckedJson`], which re-validates the outbound shape; a
//! failure there is a server defect and becomes a logged 500, never a client
//! error.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{AppError, FieldError};

/// Structural validation applied after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

/// Checks the shape zod's `z.string().email()` accepts: a non-empty local
/// part, a domain with a dot, no whitespace, no consecutive dots.
pub fn validate_email(email: &str) -> Result<(), FieldError> {
    let invalid = || FieldError::new("email", "Invalid email address");

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.contains("..")
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}

/// Path params checked before the handler runs.
pub struct ValidatedPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::malformed(rejection.body_text()))?;
        Ok(ValidatedPath(value))
    }
}

/// Query string checked before the handler runs.
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::malformed(rejection.body_text()))?;
        value.validate().map_err(AppError::validation)?;
        Ok(ValidatedQuery(value))
    }
}

/// JSON body checked before the handler runs.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::malformed(rejection.body_text()))?;
        value.validate().map_err(AppError::validation)?;
        Ok(ValidatedJson(value))
    }
}

/// JSON responder that validates the payload before transmission.
///
/// An invalid outbound payload means a handler produced data that violates
/// its own contract; the client gets a generic 500 and the detail is logged.
pub struct CheckedJson<T>(pub T);

impl<T> IntoResponse for CheckedJson<T>
where
    T: Serialize + Validate,
{
    fn into_response(self) -> Response {
        if let Err(details) = self.0.validate() {
            tracing::error!(
                event = "response_validation_error",
                details = ?details,
                "Response payload failed contract validation"
            );
            return AppError::Internal(anyhow::anyhow!("response failed contract validation"))
                .into_response();
        }
        Json(self.0).into_response()
    }
}

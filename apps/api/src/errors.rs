use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// One field-level failure inside a validation error.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Wire shape for every error response: `{error, message, details?}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("Webhook signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Validation failure with structured field detail.
    pub fn validation(details: Vec<FieldError>) -> Self {
        AppError::Validation {
            message: "Invalid request data".to_string(),
            details,
        }
    }

    /// Validation failure where no field breakdown is available
    /// (e.g. the body was not valid JSON at all).
    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: vec![],
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found".to_string(), msg, None),
            AppError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                "Invalid request data".to_string(),
                message,
                Some(details),
            ),
            AppError::SignatureVerification(msg) => {
                tracing::warn!(event = "webhook.clerk.verification.failed", error = %msg);
                (
                    StatusCode::BAD_REQUEST,
                    "Webhook signature verification failed".to_string(),
                    msg,
                    None,
                )
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized".to_string(),
                "Authentication required".to_string(),
                None,
            ),
            AppError::Database(e) => {
                tracing::error!(event = "database.error", error = %e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!(event = "internal.error", error = ?e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorBody {
            error,
            message,
            details,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("User not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let response =
            AppError::validation(vec![FieldError::new("email", "Invalid email address")])
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_signature_failure_maps_to_400() {
        let response = AppError::SignatureVerification("bad signature".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_database_error_maps_to_500() {
        let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let response = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

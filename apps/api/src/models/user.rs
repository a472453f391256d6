use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::FieldError;
use crate::validate::{validate_email, Validate};

/// A row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Identity-provider linking id. Set only for users that arrived (or were
    /// later claimed) via a Clerk webhook.
    pub clerk_id: Option<String>,
}

/// API representation of a user. `clerk_id` is internal and never exposed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl Validate for User {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut details = Vec::new();
        if self.name.is_empty() {
            details.push(FieldError::new("name", "Name is required"));
        }
        if let Err(e) = validate_email(&self.email) {
            details.push(e);
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(details)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
}

impl Validate for CreateUserInput {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut details = Vec::new();
        if self.name.is_empty() {
            details.push(FieldError::new("name", "Name is required"));
        }
        if let Err(e) = validate_email(&self.email) {
            details.push(e);
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(details)
        }
    }
}

/// Partial update: absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Validate for UpdateUserInput {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut details = Vec::new();
        if matches!(self.name.as_deref(), Some("")) {
            details.push(FieldError::new("name", "Name is required"));
        }
        if let Some(email) = self.email.as_deref() {
            if let Err(e) = validate_email(email) {
                details.push(e);
            }
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(details)
        }
    }
}

//! Reconciles local user rows against Clerk user lifecycle events.

use anyhow::{bail, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::webhook::clerk::ClerkUserData;

/// Create or update a user from Clerk webhook data.
///
/// The row is keyed by `clerk_id`: a not-yet-seen id inserts, a known id
/// updates email/name and refreshes `updated_at`. Repeated events for the
/// same id therefore never duplicate rows.
pub async fn sync_user(pool: &PgPool, clerk_user: &ClerkUserData) -> Result<()> {
    let primary_email = clerk_user
        .email_addresses
        .first()
        .map(|entry| entry.email_address.as_str());

    let Some(primary_email) = primary_email else {
        tracing::error!(
            event = "webhook.user.sync.error",
            clerk_id = %clerk_user.id,
            "No email found for Clerk user"
        );
        bail!("no email found for user {}", clerk_user.id);
    };

    let name = display_name(
        clerk_user.first_name.as_deref(),
        clerk_user.last_name.as_deref(),
        primary_email,
    );

    let existing: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM users WHERE clerk_id = $1")
            .bind(&clerk_user.id)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some(user_id) => {
            sqlx::query(
                "UPDATE users SET email = $2, name = $3, updated_at = now() WHERE clerk_id = $1",
            )
            .bind(&clerk_user.id)
            .bind(primary_email)
            .bind(&name)
            .execute(pool)
            .await?;

            tracing::info!(
                event = "webhook.user.updated",
                user_id = %user_id,
                clerk_id = %clerk_user.id,
                email = %primary_email,
                "User updated from Clerk webhook"
            );
        }
        None => {
            let user_id: Uuid = sqlx::query_scalar(
                "INSERT INTO users (clerk_id, email, name) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(&clerk_user.id)
            .bind(primary_email)
            .bind(&name)
            .fetch_one(pool)
            .await?;

            tracing::info!(
                event = "webhook.user.created",
                user_id = %user_id,
                clerk_id = %clerk_user.id,
                email = %primary_email,
                "User created from Clerk webhook"
            );
        }
    }

    Ok(())
}

/// Delete a user by Clerk id. A missing row is logged, not an error.
pub async fn delete_user(pool: &PgPool, clerk_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE clerk_id = $1")
        .bind(clerk_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(
            event = "webhook.user.delete.notfound",
            clerk_id = %clerk_id,
            "User not found for deletion"
        );
    } else {
        tracing::info!(
            event = "webhook.user.deleted",
            clerk_id = %clerk_id,
            "User deleted from Clerk webhook"
        );
    }

    Ok(())
}

/// Display name: first + last joined with a space, skipping missing or empty
/// parts, falling back to the email's local part.
fn display_name(first: Option<&str>, last: Option<&str>, email: &str) -> String {
    let joined = [first, last]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        email.split('@').next().unwrap_or(email).to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_joins_with_space() {
        assert_eq!(
            display_name(Some("Jane"), Some("Doe"), "jane@x.com"),
            "Jane Doe"
        );
    }

    #[test]
    fn test_first_name_only() {
        assert_eq!(display_name(Some("Jane"), None, "jane@x.com"), "Jane");
    }

    #[test]
    fn test_last_name_only() {
        assert_eq!(display_name(None, Some("Doe"), "jane@x.com"), "Doe");
    }

    #[test]
    fn test_no_name_falls_back_to_email_local_part() {
        assert_eq!(display_name(None, None, "jane@x.com"), "jane");
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        assert_eq!(display_name(Some(""), Some(""), "jane@x.com"), "jane");
    }
}

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::{CreateUserInput, UpdateUserInput, UserRow};

/// Inserts a new user. Id and timestamps are generated by the database.
/// A duplicate email violates the unique constraint and surfaces as a
/// database error.
pub async fn create_user(pool: &PgPool, input: &CreateUserInput) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING *",
    )
    .bind(&input.name)
    .bind(&input.email)
    .fetch_one(pool)
    .await
}

pub async fn get_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Returns one page of users plus the total count matching the filter.
///
/// `search` is a case-insensitive substring match over name OR email; the
/// term is escaped so `%`, `_` and `\` match literally. `page` is 1-based.
pub async fn list_users(
    pool: &PgPool,
    page: u32,
    page_size: u32,
    search: Option<&str>,
) -> Result<(Vec<UserRow>, i64), sqlx::Error> {
    let pattern = search.map(|term| format!("%{}%", escape_like(term)));

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE $1::text IS NULL OR name ILIKE $1 OR email ILIKE $1",
    )
    .bind(&pattern)
    .fetch_one(pool)
    .await?;

    let offset = i64::from(page - 1) * i64::from(page_size);
    let users = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT * FROM users
        WHERE $1::text IS NULL OR name ILIKE $1 OR email ILIKE $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&pattern)
    .bind(i64::from(page_size))
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((users, total))
}

/// Partial update: only the provided fields change, `updated_at` always
/// refreshes. Returns `None` when no row has this id.
pub async fn update_user(
    pool: &PgPool,
    id: Uuid,
    input: &UpdateUserInput,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.name.as_deref())
    .bind(input.email.as_deref())
    .fetch_optional(pool)
    .await
}

/// Returns whether a row was actually removed.
pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Escapes LIKE metacharacters so a search term matches itself literally.
/// Postgres' default ESCAPE character is backslash.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

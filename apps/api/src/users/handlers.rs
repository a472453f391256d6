use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, FieldError};
use crate::models::user::{CreateUserInput, UpdateUserInput, User};
use crate::state::AppState;
use crate::users::queries;
use crate::validate::{CheckedJson, Validate, ValidatedJson, ValidatedPath, ValidatedQuery};

pub const MAX_PAGE_SIZE: u32 = 100;

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size", rename = "pageSize")]
    pub page_size: u32,
    #[serde(default)]
    pub search: Option<String>,
}

impl Validate for UserListQuery {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut details = Vec::new();
        if self.page < 1 {
            details.push(FieldError::new("page", "page must be a positive integer"));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            details.push(FieldError::new(
                "pageSize",
                format!("pageSize must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(details)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl Validate for UserListResponse {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        if self.total < 0 {
            return Err(vec![FieldError::new("total", "total must be nonnegative")]);
        }
        for user in &self.users {
            user.validate()?;
        }
        Ok(())
    }
}

/// GET /web/users: list users with pagination and search.
pub async fn list_users(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<UserListQuery>,
) -> Result<CheckedJson<UserListResponse>, AppError> {
    let (rows, total) =
        queries::list_users(&state.db, query.page, query.page_size, query.search.as_deref())
            .await?;

    Ok(CheckedJson(UserListResponse {
        users: rows.into_iter().map(User::from).collect(),
        total,
        page: query.page,
        page_size: query.page_size,
    }))
}

/// GET /web/users/:id: get a single user by id.
pub async fn get_user(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<CheckedJson<User>, AppError> {
    let row = queries::get_user_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(CheckedJson(User::from(row)))
}

/// POST /web/users: create a new user.
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<CreateUserInput>,
) -> Result<(StatusCode, CheckedJson<User>), AppError> {
    let row = queries::create_user(&state.db, &input).await?;
    Ok((StatusCode::CREATED, CheckedJson(User::from(row))))
}

/// PATCH /web/users/:id: partial update.
pub async fn update_user(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(input): ValidatedJson<UpdateUserInput>,
) -> Result<CheckedJson<User>, AppError> {
    let row = queries::update_user(&state.db, id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(CheckedJson(User::from(row)))
}

/// DELETE /web/users/:id: 204 on success, 404 when nothing was removed.
pub async fn delete_user(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = queries::delete_user(&state.db, id).await?;
    if !deleted {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

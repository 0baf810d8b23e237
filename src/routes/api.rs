use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;

use crate::models::User;
use crate::{AppState, UserState};

/// Errors for the fetch-facing JSON API. Unlike the page routes these answer
/// with a JSON body instead of a redirect, so the browser scripts can alert
/// on failure.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation(&'static str),
    Database,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "not logged in"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "not the author of this post"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found"),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Database => (StatusCode::INTERNAL_SERVER_ERROR, "internal server error"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database query failed");
        ApiError::Database
    }
}

fn session_user(user_state: &UserState) -> Result<&User, ApiError> {
    match user_state {
        UserState::ValidSession(user) => Ok(user),
        _ => Err(ApiError::Unauthorized),
    }
}

#[derive(serde::Deserialize)]
pub struct PostPayload {
    title: String,
    contents: String,
}

#[derive(serde::Deserialize)]
pub struct CommentPayload {
    blog_id: i32,
    text: String,
}

#[axum::debug_handler]
pub async fn create_post(
    app_state: State<Arc<AppState>>,
    Extension(user_state): Extension<UserState>,
    Json(payload): Json<PostPayload>,
) -> Result<Response, ApiError> {
    let user = session_user(&user_state)?;

    let title = payload.title.trim();
    let contents = payload.contents.trim();
    if title.is_empty() || contents.is_empty() {
        return Err(ApiError::Validation("title and contents are required"));
    }

    let blog_id: i32 = sqlx::query_scalar(
        "INSERT INTO blogs (title, contents, user_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(title)
    .bind(contents)
    .bind(user.id)
    .fetch_one(&app_state.db_pool)
    .await?;

    tracing::info!(blog_id, user_id = user.id, "blog created");
    Ok((StatusCode::CREATED, Json(json!({ "id": blog_id }))).into_response())
}

#[axum::debug_handler]
pub async fn update_post(
    app_state: State<Arc<AppState>>,
    Path(blog_id): Path<i32>,
    Extension(user_state): Extension<UserState>,
    Json(payload): Json<PostPayload>,
) -> Result<Response, ApiError> {
    let user = session_user(&user_state)?;

    let title = payload.title.trim();
    let contents = payload.contents.trim();
    if title.is_empty() || contents.is_empty() {
        return Err(ApiError::Validation("title and contents are required"));
    }

    check_ownership(&app_state, blog_id, user.id).await?;

    sqlx::query("UPDATE blogs SET title = $1, contents = $2 WHERE id = $3")
        .bind(title)
        .bind(contents)
        .bind(blog_id)
        .execute(&app_state.db_pool)
        .await?;

    tracing::info!(blog_id, user_id = user.id, "blog updated");
    Ok((StatusCode::OK, Json(json!({ "id": blog_id }))).into_response())
}

#[axum::debug_handler]
pub async fn delete_post(
    app_state: State<Arc<AppState>>,
    Path(blog_id): Path<i32>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, ApiError> {
    let user = session_user(&user_state)?;

    check_ownership(&app_state, blog_id, user.id).await?;

    sqlx::query("DELETE FROM blogs WHERE id = $1")
        .bind(blog_id)
        .execute(&app_state.db_pool)
        .await?;

    tracing::info!(blog_id, user_id = user.id, "blog deleted");
    Ok(StatusCode::OK.into_response())
}

#[axum::debug_handler]
pub async fn create_comment(
    app_state: State<Arc<AppState>>,
    Extension(user_state): Extension<UserState>,
    Json(payload): Json<CommentPayload>,
) -> Result<Response, ApiError> {
    let user = session_user(&user_state)?;

    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("comment text is required"));
    }

    // A single insert; a missing blog surfaces as a foreign key violation.
    let comment_id: i32 = match sqlx::query_scalar(
        "INSERT INTO comments (text, blog_id, user_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(text)
    .bind(payload.blog_id)
    .bind(user.id)
    .fetch_one(&app_state.db_pool)
    .await
    {
        Ok(id) => id,
        Err(err) if is_foreign_key_violation(&err) => return Err(ApiError::NotFound),
        Err(err) => return Err(err.into()),
    };

    tracing::info!(comment_id, blog_id = payload.blog_id, user_id = user.id, "comment created");
    Ok((StatusCode::CREATED, Json(json!({ "id": comment_id }))).into_response())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

/// 404 when the blog does not exist, 403 when it belongs to someone else.
async fn check_ownership(
    app_state: &AppState,
    blog_id: i32,
    user_id: i32,
) -> Result<(), ApiError> {
    let owner: Option<i32> = sqlx::query_scalar("SELECT user_id FROM blogs WHERE id = $1")
        .bind(blog_id)
        .fetch_optional(&app_state.db_pool)
        .await?;

    match owner {
        None => Err(ApiError::NotFound),
        Some(owner_id) if owner_id != user_id => Err(ApiError::Forbidden),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_database_errors_count_as_foreign_key_violations() {
        assert!(!is_foreign_key_violation(&sqlx::Error::RowNotFound));
        assert!(!is_foreign_key_violation(&sqlx::Error::PoolClosed));
    }
}

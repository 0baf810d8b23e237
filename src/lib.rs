use axum::{Router, middleware};
use axum_extra::extract::CookieJar;
use handlebars::{DirectorySourceOptions, Handlebars};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::{str::FromStr, sync::Arc};
use time::OffsetDateTime;
use tower_http::{services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::models::User;

pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub host: String,
    pub db_url: String,
    pub db_pool: PgPool,
    pub templates: Handlebars<'static>,
    pub session_timeout: i64,
}

impl AppState {
    pub async fn new() -> Self {
        let host: String = std::env::var("HOST").expect("No HOST Specified");

        let db_url: String = std::env::var("DATABASE_URL").expect("No DATABASE_URL Specified");

        let db_pool = PgPoolOptions::new()
            .connect(db_url.as_str())
            .await
            .expect("DB connection failed");

        let mut templates = Handlebars::new();
        templates.set_dev_mode(true);
        templates
            .register_templates_directory("templates/", DirectorySourceOptions::default())
            .expect("Failed to register templates");

        let session_timeout: i64 = std::env::var("SESSION_TIMEOUT")
            .expect("No SESSION_TIMEOUT Specified")
            .parse()
            .expect("SESSION_TIMEOUT must be a number of seconds");

        Self {
            host,
            db_url,
            db_pool,
            templates,
            session_timeout,
        }
    }
}

/// The full application router: server-rendered pages, the JSON posts API
/// consumed by the browser scripts, and static assets.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::get_web_router())
        .nest("/api", routes::get_api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::web::session_middleware,
        ))
        // STATIC CONTENT
        .nest_service("/static", ServeDir::new("./static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: i32,
    last_active: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub enum UserState {
    ValidSession(User),
    ExpiredToken,
    InvalidToken,
    NoToken,
}

impl UserState {
    pub fn logged_in(&self) -> bool {
        matches!(self, UserState::ValidSession(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            UserState::ValidSession(user) => Some(user),
            _ => None,
        }
    }
}

/// True exactly when the session belongs to the user owning the blog.
/// Anonymous, expired and invalid sessions are never the author.
pub fn is_author(user_state: &UserState, owner_id: i32) -> bool {
    matches!(user_state, UserState::ValidSession(user) if user.id == owner_id)
}

pub fn parse_session_token(cookie_jar: &CookieJar) -> Option<Uuid> {
    cookie_jar
        .get("token")
        .and_then(|v| {
            let trimmed = v.value_trimmed();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        })
        .and_then(|value| Uuid::from_str(value).ok())
}

pub fn validate_username(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Username cannot be empty");
    }
    if name.len() > 32 {
        return Err("Username cannot be longer than 32 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Username may only contain letters, numbers, '-' and '_'");
    }
    Ok(())
}

/// Resolves the `token` cookie into a session state. Live sessions get their
/// `last_active` refreshed; sessions idle past the timeout are deleted.
pub async fn get_user_session(
    app_state: &AppState,
    cookie_jar: &CookieJar,
) -> Result<UserState, sqlx::Error> {
    let token: Uuid = match parse_session_token(cookie_jar) {
        Some(token) => token,
        None => return Ok(UserState::NoToken),
    };

    let session = match sqlx::query_as::<_, SessionRow>(
        "SELECT user_id, last_active FROM sessions WHERE token = $1",
    )
    .bind(token)
    .fetch_optional(&app_state.db_pool)
    .await?
    {
        Some(s) => s,
        None => return Ok(UserState::InvalidToken),
    };

    let session_age: time::Duration = OffsetDateTime::now_utc() - session.last_active;
    let session_valid: bool = session_age.whole_seconds() < app_state.session_timeout;

    if !session_valid {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&app_state.db_pool)
            .await?;
        return Ok(UserState::ExpiredToken);
    }

    sqlx::query("UPDATE sessions SET last_active = now() WHERE token = $1")
        .bind(token)
        .execute(&app_state.db_pool)
        .await?;

    let user =
        sqlx::query_as::<_, User>("SELECT id, username, password_hash FROM users WHERE id = $1")
            .bind(session.user_id)
            .fetch_one(&app_state.db_pool)
            .await?;

    Ok(UserState::ValidSession(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Cookie;

    fn user(id: i32) -> User {
        User {
            id,
            username: format!("user{id}"),
            password_hash: String::new(),
        }
    }

    #[test]
    fn is_author_matches_session_user_against_owner() {
        assert!(is_author(&UserState::ValidSession(user(5)), 5));
        assert!(!is_author(&UserState::ValidSession(user(6)), 5));
    }

    #[test]
    fn is_author_is_false_without_a_session() {
        assert!(!is_author(&UserState::NoToken, 5));
        assert!(!is_author(&UserState::InvalidToken, 5));
        assert!(!is_author(&UserState::ExpiredToken, 5));
    }

    #[test]
    fn logged_in_only_for_valid_sessions() {
        assert!(UserState::ValidSession(user(1)).logged_in());
        assert!(!UserState::NoToken.logged_in());
        assert!(!UserState::ExpiredToken.logged_in());
    }

    #[test]
    fn parses_a_well_formed_token_cookie() {
        let token = Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let jar = CookieJar::new().add(Cookie::new("token", token.to_string()));
        assert_eq!(parse_session_token(&jar), Some(token));
    }

    #[test]
    fn rejects_missing_empty_and_garbage_tokens() {
        assert_eq!(parse_session_token(&CookieJar::new()), None);

        let empty = CookieJar::new().add(Cookie::new("token", ""));
        assert_eq!(parse_session_token(&empty), None);

        let garbage = CookieJar::new().add(Cookie::new("token", "not-a-uuid"));
        assert_eq!(parse_session_token(&garbage), None);
    }

    #[test]
    fn username_validation() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("alice-b_2").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has spaces").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }
}

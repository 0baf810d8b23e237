use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::Form;
use axum::body::Body;
use axum::extract::{Extension, Path, Request, State};
use axum::http::{Response as HttpResponse, StatusCode, header};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use serde_json::json;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{fetch_blog_cards, fetch_blog_detail, fetch_comments, fetch_dashboard_user};
use crate::{AppState, UserState, get_user_session, is_author, parse_session_token,
    validate_username};

/// Runs on every route: resolves the token cookie into a [`UserState`] and
/// hands it to the handler as a request extension. Expired sessions are sent
/// back to the login page with the cookie cleared before the handler runs;
/// invalid tokens just get the cookie cleared.
#[axum::debug_middleware]
pub async fn session_middleware(
    app_state: State<Arc<AppState>>,
    cookie_jar: CookieJar,
    mut req: Request,
    nxt: Next,
) -> Result<Response, WebError> {
    let user_state = get_user_session(&app_state, &cookie_jar).await?;

    if let Some(response) = expired_session_redirect(&user_state) {
        return Ok(response);
    }

    req.extensions_mut().insert(user_state.clone());

    let mut response = nxt.run(req).await;

    if matches!(user_state, UserState::InvalidToken) {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, CLEAR_TOKEN_COOKIE.parse().unwrap());
    }
    Ok(response)
}

/// An expired session never reaches the handler: the cookie is cleared and
/// the request answered with a login redirect.
fn expired_session_redirect(user_state: &UserState) -> Option<Response> {
    match user_state {
        UserState::ExpiredToken => Some(
            HttpResponse::builder()
                .status(StatusCode::SEE_OTHER)
                .header("Location", "/login")
                .header("Set-Cookie", CLEAR_TOKEN_COOKIE)
                .body(Body::from("Session expired, please log in again."))
                .unwrap(),
        ),
        _ => None,
    }
}

/// Gate for the dashboard routes: anything short of a valid session is
/// redirected to the login page before the handler runs. Handlers behind it
/// may trust the session user.
#[axum::debug_middleware]
pub async fn require_auth(
    Extension(user_state): Extension<UserState>,
    req: Request,
    nxt: Next,
) -> Response {
    match user_state {
        UserState::ValidSession(_) => nxt.run(req).await,
        _ => Redirect::to("/login").into_response(),
    }
}

const CLEAR_TOKEN_COOKIE: &str = "token=; Path=/; Max-Age=0";

#[derive(Debug)]
pub enum WebError {
    DatabaseError,
    RenderError,
    NotFound,
    Internal,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::DatabaseError => HttpResponse::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Database Error"))
                .unwrap(),
            WebError::RenderError => HttpResponse::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Error rendering page"))
                .unwrap(),
            WebError::NotFound => HttpResponse::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::from("Not Found"))
                .unwrap(),
            WebError::Internal => HttpResponse::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal Server Error"))
                .unwrap(),
        }
    }
}

// Failures are logged here and surfaced to the client as a generic message.
impl From<sqlx::Error> for WebError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database query failed");
        WebError::DatabaseError
    }
}

impl From<handlebars::RenderError> for WebError {
    fn from(err: handlebars::RenderError) -> Self {
        tracing::error!(error = %err, "template render failed");
        WebError::RenderError
    }
}

#[axum::debug_handler]
pub async fn view_home(
    app_state: State<Arc<AppState>>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, WebError> {
    let blogs = fetch_blog_cards(&app_state.db_pool).await?;

    let body = app_state.templates.render(
        "homepage",
        &json!({
            "blogs": blogs,
            "logged_in": user_state.logged_in(),
            "user": user_state.user(),
        }),
    )?;

    Ok(Html(body).into_response())
}

#[axum::debug_handler]
pub async fn view_blog(
    app_state: State<Arc<AppState>>,
    Path(blog_id): Path<i32>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, WebError> {
    let blog = fetch_blog_detail(&app_state.db_pool, blog_id)
        .await?
        .ok_or(WebError::NotFound)?;
    let comments = fetch_comments(&app_state.db_pool, blog_id).await?;

    let body = app_state.templates.render(
        "blog",
        &json!({
            "blog": blog,
            "comments": comments,
            "logged_in": user_state.logged_in(),
            "is_author": is_author(&user_state, blog.user_id),
            "user": user_state.user(),
        }),
    )?;

    Ok(Html(body).into_response())
}

#[axum::debug_handler]
pub async fn view_dashboard(
    app_state: State<Arc<AppState>>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, WebError> {
    let user = match &user_state {
        UserState::ValidSession(user) => user,
        _ => return Ok(Redirect::to("/login").into_response()),
    };

    let dashboard = fetch_dashboard_user(&app_state.db_pool, user.id)
        .await?
        .ok_or(WebError::NotFound)?;

    let body = app_state.templates.render(
        "dashboard",
        &json!({
            "id": dashboard.id,
            "username": dashboard.username,
            "blogs": dashboard.blogs,
            "logged_in": true,
            "user": user_state.user(),
        }),
    )?;

    Ok(Html(body).into_response())
}

#[axum::debug_handler]
pub async fn view_new_blog_form(
    app_state: State<Arc<AppState>>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, WebError> {
    let body = app_state.templates.render(
        "editblog",
        &json!({
            "logged_in": true,
            "user": user_state.user(),
        }),
    )?;

    Ok(Html(body).into_response())
}

#[axum::debug_handler]
pub async fn view_edit_blog_form(
    app_state: State<Arc<AppState>>,
    Path(blog_id): Path<i32>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, WebError> {
    let blog = fetch_blog_detail(&app_state.db_pool, blog_id)
        .await?
        .ok_or(WebError::NotFound)?;
    let comments = fetch_comments(&app_state.db_pool, blog_id).await?;

    let body = app_state.templates.render(
        "editblog",
        &json!({
            "blog": blog,
            "comments": comments,
            "logged_in": true,
            "is_author": is_author(&user_state, blog.user_id),
            "user": user_state.user(),
        }),
    )?;

    Ok(Html(body).into_response())
}

#[axum::debug_handler]
pub async fn login_view(
    app_state: State<Arc<AppState>>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, WebError> {
    if user_state.logged_in() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let body = app_state.templates.render("login", &json!({}))?;
    Ok(Html(body).into_response())
}

#[derive(serde::Deserialize, serde::Serialize)]
pub struct LoginFormData {
    username: String,
    password: String,
}

#[axum::debug_handler]
pub async fn login_handler(
    app_state: State<Arc<AppState>>,
    form: Form<LoginFormData>,
) -> Result<Response, WebError> {
    let db_user = match sqlx::query_as::<_, crate::models::User>(
        "SELECT id, username, password_hash FROM users WHERE username = $1",
    )
    .bind(&form.username)
    .fetch_optional(&app_state.db_pool)
    .await?
    {
        Some(user) => user,
        // Same message as a bad password, so usernames can't be probed
        None => {
            return Ok((StatusCode::UNAUTHORIZED, "Invalid username or password").into_response());
        }
    };

    let parsed_hash = PasswordHash::new(&db_user.password_hash).map_err(|err| {
        tracing::error!(error = %err, user_id = db_user.id, "stored password hash is malformed");
        WebError::Internal
    })?;

    if Argon2::default()
        .verify_password(form.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Ok((StatusCode::UNAUTHORIZED, "Invalid username or password").into_response());
    }

    let session_token = create_session(&app_state.db_pool, db_user.id).await?;

    Ok(redirect_with_cookie(
        "/dashboard",
        &format!("token={session_token}; Path=/; HttpOnly"),
    ))
}

#[axum::debug_handler]
pub async fn signup_view(
    app_state: State<Arc<AppState>>,
    Extension(user_state): Extension<UserState>,
) -> Result<Response, WebError> {
    if user_state.logged_in() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let body = app_state.templates.render("signup", &json!({}))?;
    Ok(Html(body).into_response())
}

#[axum::debug_handler]
pub async fn signup_handler(
    app_state: State<Arc<AppState>>,
    form: Form<LoginFormData>,
) -> Result<Response, WebError> {
    if let Err(reason) = validate_username(&form.username) {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, reason).into_response());
    }

    if form.password.trim().is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, "Password cannot be empty").into_response());
    }

    let taken: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(&form.username)
        .fetch_optional(&app_state.db_pool)
        .await?;
    if taken.is_some() {
        return Ok((StatusCode::CONFLICT, "Username is already taken").into_response());
    }

    let pw_salt = SaltString::generate(OsRng);
    let pw_hash = Argon2::default()
        .hash_password(form.password.as_bytes(), &pw_salt)
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing failed");
            WebError::Internal
        })?;

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(&form.username)
    .bind(pw_hash.to_string())
    .fetch_one(&app_state.db_pool)
    .await?;

    let session_token = create_session(&app_state.db_pool, user_id).await?;

    Ok(redirect_with_cookie(
        "/dashboard",
        &format!("token={session_token}; Path=/; HttpOnly"),
    ))
}

#[axum::debug_handler]
pub async fn logout_handler(
    app_state: State<Arc<AppState>>,
    cookie_jar: CookieJar,
) -> Result<Response, WebError> {
    if let Some(token) = parse_session_token(&cookie_jar) {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&app_state.db_pool)
            .await?;
    }

    Ok(redirect_with_cookie("/", CLEAR_TOKEN_COOKIE))
}

async fn create_session(pool: &PgPool, user_id: i32) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar("INSERT INTO sessions (user_id) VALUES ($1) RETURNING token")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

fn redirect_with_cookie(location: &str, cookie: &str) -> Response {
    HttpResponse::builder()
        .status(StatusCode::SEE_OTHER)
        .header("Location", location)
        .header("Set-Cookie", cookie)
        .body(Body::empty())
        .unwrap()
}

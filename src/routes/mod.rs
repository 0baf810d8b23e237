use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::AppState;

pub mod api;
pub mod web;

// Server-side rendered pages. The dashboard routes sit behind the auth gate;
// everything else renders for anonymous visitors too.
pub fn get_web_router() -> Router<Arc<AppState>> {
    let dashboard = Router::new()
        .route("/dashboard", get(web::view_dashboard))
        .route("/dashboard/blog", get(web::view_new_blog_form))
        .route("/dashboard/blog/{blog_id}", get(web::view_edit_blog_form))
        .route_layer(middleware::from_fn(web::require_auth));

    Router::new()
        // Front Page
        .route("/", get(web::view_home))
        .route("/blog/{blog_id}", get(web::view_blog))
        // Auth
        .route("/signup", get(web::signup_view).post(web::signup_handler))
        .route("/login", get(web::login_view).post(web::login_handler))
        .route("/logout", get(web::logout_handler))
        // Dashboard
        .merge(dashboard)
}

// JSON API used by the browser fetch scripts.
pub fn get_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", post(api::create_post))
        .route(
            "/posts/{blog_id}",
            put(api::update_post).delete(api::delete_post),
        )
        .route("/comments", post(api::create_comment))
}

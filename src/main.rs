use dotenvy::dotenv;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use quillpad::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("quillpad=info,tower_http=info")),
        )
        .init();

    let app_state: AppState = AppState::new().await;

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Failed to perform migrations");

    let listener = tokio::net::TcpListener::bind(&app_state.host)
        .await
        .unwrap();
    tracing::info!(host = %app_state.host, "server listening");

    let app = quillpad::app(Arc::new(app_state));

    axum::serve(listener, app).await.unwrap();
}

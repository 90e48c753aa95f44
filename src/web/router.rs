//! Router configuration.

use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{admin_delete, admin_login, admin_page, admin_rename, index, upload, AppState};
use super::middleware::{
    admin_login_rate_limit, create_cors_layer, reject_hidden_paths, security_headers,
};
use crate::config::ServerConfig;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the application router.
pub fn create_router(app_state: Arc<AppState>, config: &ServerConfig) -> Router {
    let limiter = app_state.login_limiter.clone();
    let login = admin_login.layer(middleware::from_fn(move |req, next| {
        let limiter = limiter.clone();
        admin_login_rate_limit(limiter, req, next)
    }));

    let admin_routes = Router::new()
        .route("/", get(admin_page).post(login))
        .route("/delete", post(admin_delete))
        .route("/rename", post(admin_rename));

    let body_limit = app_state.max_upload_size.saturating_add(MULTIPART_OVERHEAD);
    let uploads = ServiceBuilder::new()
        .layer(middleware::from_fn(reject_hidden_paths))
        .service(ServeDir::new(app_state.registry.root()));

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .nest("/admin", admin_routes)
        .nest_service("/uploads", uploads)
        .merge(create_health_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.cors_origins))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.request_timeout_secs,
                )))
                .layer(middleware::from_fn(security_headers)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let allowed_origin = state.config.allowed_origin.clone();

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
        .route("/readyz", get(ready))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/verify", post(handlers::auth::verify))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/status", get(handlers::auth::status))
        .route("/api/graphql", post(handlers::graphql::graphql_proxy))
        .route(
            "/api/upload/thumbnail",
            post(handlers::upload::upload_thumbnail),
        )
        .with_state(state);

    if let Some(origin) = allowed_origin {
        if let Some(cors) = cors_layer(&origin) {
            router = router.layer(cors);
        }
    }

    router
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = origin.parse::<HeaderValue>().ok()?;
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static("x-admin-email"),
            ])
            .allow_credentials(true),
    )
}

async fn root() -> &'static str {
    "15 Minutes Admin API"
}

async fn health() -> impl IntoResponse {
    "ok"
}

async fn ready() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use pixdrop_core::Config;
use pixdrop_infra::{get_request_id, request_id_middleware};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Headroom for JSON framing around a base64 payload.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let router = Router::new()
        .route("/upload", post(handlers::upload::upload_image))
        .route("/process", post(handlers::process::process_image))
        .route("/images", get(handlers::images::list_images))
        .route(
            "/images/{filename}",
            get(handlers::images::get_image).delete(handlers::images::delete_image),
        )
        .route("/images/{filename}/url", get(handlers::images::get_image_url))
        .route("/download/{filename}", get(handlers::images::download_image))
        .route("/limits/reset", post(handlers::limits::reset_limits))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes(config)))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %get_request_id(request).unwrap_or_default(),
                )
            }),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors);

    Ok(router)
}

/// Base64 inflates payloads by 4/3; oversized files must still reach the size check.
fn max_body_bytes(config: &Config) -> usize {
    let encoded = config.limits.max_file_size_bytes.saturating_mul(4) / 3;
    (encoded as usize)
        .saturating_mul(2)
        .saturating_add(BODY_OVERHEAD_BYTES)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    let cors = if config.base.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .base
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

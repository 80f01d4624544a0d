use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::error::HttpAppError;
use crate::state::AppState;

/// `GET /images`: processed images, newest first.
pub async fn list_images(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let images = state.media.list_images().await?;
    Ok(Json(json!({ "images": images })))
}

/// `GET /images/{filename}`: raw bytes of a processed image.
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let image = state.media.get_image(&filename).await?;
    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "private, max-age=300".to_string()),
        ],
        image.data,
    ))
}

/// `GET /images/{filename}/url`
pub async fn get_image_url(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let url = state.media.presigned_url(&filename).await?;
    Ok(Json(json!({ "url": url })))
}

/// `GET /download/{filename}`: redirect to a presigned URL.
pub async fn download_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let url = state.media.presigned_url(&filename).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]))
}

/// `DELETE /images/{filename}`: remove the upload, processed and thumbnail copies.
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.media.delete_image(&filename).await?;
    Ok(Json(json!({ "message": "Files deleted successfully" })))
}

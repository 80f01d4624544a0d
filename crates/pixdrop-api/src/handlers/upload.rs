use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use pixdrop_services::UploadRequest;
use serde_json::json;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::ClientIp;

/// `POST /upload`: gate and store a base64 image.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    ClientIp(client_id): ClientIp,
    ValidatedJson(request): ValidatedJson<UploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let uploaded = state.media.upload(&client_id, request, state.now()).await?;

    Ok(Json(json!({
        "message": "Image uploaded successfully",
        "key": uploaded.key,
        "uploadedFilename": uploaded.uploaded_filename,
    })))
}

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use pixdrop_services::ProcessRequest;
use serde_json::json;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

/// `POST /process`: apply a named transform and store the result.
pub async fn process_image(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ProcessRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let processed = state.media.process(request).await?;

    Ok(Json(json!({
        "message": "Image processed successfully",
        "url": processed.url,
        "name": processed.name,
    })))
}

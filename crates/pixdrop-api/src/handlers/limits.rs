use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::error::HttpAppError;
use crate::state::AppState;

/// `POST /limits/reset`: drop the whole quota ledger.
pub async fn reset_limits(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.ledger.reset().await?;
    Ok(Json(json!({ "message": "Rate limits reset successfully" })))
}

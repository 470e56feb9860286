use axum::{body::Bytes, extract::State, Json};
use service_core::error::AppError;

use crate::dtos::ApplyChangesResponse;
use crate::models::ChangeBatch;
use crate::AppState;

/// Apply one change batch, in order behind any batch already queued.
///
/// POST /changes
#[utoipa::path(
    post,
    path = "/changes",
    request_body(content = Object, description = "Change batch: {\"changes\": [...]}"),
    responses(
        (status = 200, description = "Batch committed", body = ApplyChangesResponse),
        (status = 400, description = "Malformed batch; nothing applied", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Storage fault; nothing applied", body = crate::dtos::ErrorResponse),
        (status = 503, description = "Change feed halted after an earlier failed batch", body = crate::dtos::ErrorResponse)
    ),
    tag = "Change Feed"
)]
pub async fn apply_changes(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApplyChangesResponse>, AppError> {
    let batch: ChangeBatch = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Undecodable change batch");
        AppError::BadRequest(anyhow::anyhow!("invalid change batch: {}", e))
    })?;

    let applied = match &state.feed {
        Some(feed) => feed.apply(batch).await?,
        None => state.processor.apply_batch(&batch).await?,
    };
    Ok(Json(ApplyChangesResponse { applied }))
}

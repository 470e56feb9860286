use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{VerifyApiKeyRequest, VerifyApiKeyResponse};
use crate::AppState;

/// Verify an API key for a resource and scope.
///
/// Denials are reported with status 200 and an `ErrorResult` body.
#[utoipa::path(
    post,
    path = "/verifiers/apikey",
    request_body = VerifyApiKeyRequest,
    responses(
        (status = 200, description = "Verification verdict", body = VerifyApiKeyResponse),
        (status = 400, description = "Malformed request", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Storage fault", body = crate::dtos::ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn verify_api_key(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VerifyApiKeyResponse>, AppError> {
    let request: VerifyApiKeyRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("invalid verify request: {}", e)))?;
    verify(state, request).await
}

/// Query-string form of [`verify_api_key`].
#[utoipa::path(
    get,
    path = "/verifiers/apikey",
    params(VerifyApiKeyRequest),
    responses(
        (status = 200, description = "Verification verdict", body = VerifyApiKeyResponse),
        (status = 400, description = "Malformed request", body = crate::dtos::ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn verify_api_key_query(
    State(state): State<AppState>,
    Query(request): Query<VerifyApiKeyRequest>,
) -> Result<Json<VerifyApiKeyResponse>, AppError> {
    verify(state, request).await
}

async fn verify(
    state: AppState,
    request: VerifyApiKeyRequest,
) -> Result<Json<VerifyApiKeyResponse>, AppError> {
    let outcome = state.verification.verify(&request).await?;
    Ok(Json(outcome.into()))
}

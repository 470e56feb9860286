pub mod changes;
pub mod entities;
pub mod verify;

pub use changes::{ApplyChangesResponse, HealthResponse};
pub use entities::*;
pub use verify::{ApiKeyContext, ErrorResult, VerifyApiKeyRequest, VerifyApiKeyResponse};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Documentation mirror of the error envelope written by `AppError`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "0")]
    pub response_code: String,
    #[schema(example = "invalid identifiers")]
    pub response_message: String,
}

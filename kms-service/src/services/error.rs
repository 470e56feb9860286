use service_core::error::AppError;
use thiserror::Error;

use super::identifiers::InvalidIdentifiers;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid identifiers: {0}")]
    InvalidIdentifiers(#[from] InvalidIdentifiers),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed change record #{index} ({table}): {reason}")]
    MalformedChange {
        index: usize,
        table: String,
        reason: String,
    },

    #[error("data error: {0}")]
    DataCorruption(String),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    /// The change feed stopped after a failed batch and accepts no more.
    #[error("change feed halted: {0}")]
    FeedHalted(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Faults in infrastructure that a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Storage(_))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidIdentifiers(_) => {
                AppError::BadRequest(anyhow::anyhow!("invalid identifiers"))
            }
            ServiceError::InvalidRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            e @ ServiceError::MalformedChange { .. } => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            ServiceError::DataCorruption(msg) => AppError::DataError(anyhow::anyhow!(msg)),
            ServiceError::Storage(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::FeedHalted(reason) => {
                tracing::error!(reason = %reason, "Change rejected by halted feed");
                AppError::ServiceUnavailable
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::http::StatusCode;

    #[test]
    fn taxonomy_maps_to_http_statuses() {
        let invalid: AppError = ServiceError::InvalidIdentifiers(InvalidIdentifiers::TooMany).into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.to_error_response().response_message, "invalid identifiers");

        let data: AppError = ServiceError::DataCorruption("bad quota".to_string()).into();
        assert_eq!(data.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(data.response_code(), 2);

        let storage: AppError = ServiceError::Storage(sqlx::Error::PoolTimedOut).into();
        assert_eq!(storage.response_code(), 1);

        let halted: AppError = ServiceError::FeedHalted("batch 3".to_string()).into();
        assert_eq!(halted.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn only_storage_faults_are_retryable() {
        assert!(ServiceError::Storage(sqlx::Error::PoolClosed).is_retryable());
        assert!(!ServiceError::DataCorruption("x".to_string()).is_retryable());
        assert!(!ServiceError::InvalidRequest("x".to_string()).is_retryable());
    }
}

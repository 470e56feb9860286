use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric codes carried in `response_code` of the error envelope.
pub mod codes {
    pub const INVALID_PARAMETERS: u16 = 0;
    pub const DB_ERROR: u16 = 1;
    pub const DATA_ERROR: u16 = 2;
    pub const INTERNAL_ERROR: u16 = 3;
    pub const NOT_FOUND: u16 = 4;
    pub const SERVICE_UNAVAILABLE: u16 = 5;
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(anyhow::Error),

    #[error("{0}")]
    NotFound(anyhow::Error),

    #[error("{0}")]
    DatabaseError(anyhow::Error),

    #[error("{0}")]
    DataError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

/// Wire shape of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub response_code: String,
    pub response_message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_)
            | AppError::DataError(_)
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn response_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => codes::INVALID_PARAMETERS,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::DatabaseError(_) => codes::DB_ERROR,
            AppError::DataError(_) => codes::DATA_ERROR,
            AppError::ServiceUnavailable => codes::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) | AppError::ConfigError(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let response_message = match self {
            AppError::InternalError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            response_code: self.response_code().to_string(),
            response_message,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.to_error_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_invalid_parameters() {
        let err = AppError::BadRequest(anyhow::anyhow!("invalid identifiers"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_error_response(),
            ErrorResponse {
                response_code: "0".to_string(),
                response_message: "invalid identifiers".to_string(),
            }
        );
    }

    #[test]
    fn data_error_is_a_server_error_with_its_own_code() {
        let err = AppError::DataError(anyhow::anyhow!("quota is not numeric"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_error_response().response_code, "2");
    }

    #[test]
    fn internal_error_hides_details() {
        let err = AppError::InternalError(anyhow::anyhow!("secret detail"));
        assert_eq!(err.to_error_response().response_message, "Internal server error");
    }
}

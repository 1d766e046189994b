pub mod health;
pub mod metrics;
pub mod transaction;
pub mod webhook;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use transaction::transaction_handler;
pub use webhook::webhook_handler;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use transfer_watch_domain::model::HashFormatError;
use transfer_watch_domain::storage::StorageError;
use transfer_watch_domain::AuthenticationError;
use transfer_watch_ingest::{IngestError, ValidationError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthenticationError),
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ValidationError),
    #[error("invalid transaction hash: {0}")]
    InvalidHash(#[from] HashFormatError),
    #[error("transaction not found")]
    NotFound,
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Unauthorized(inner) => ApiError::Unauthorized(inner),
            IngestError::Invalid(inner) => ApiError::InvalidPayload(inner),
            IngestError::Storage(inner) => ApiError::Storage(inner),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidPayload(_) | ApiError::InvalidHash(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

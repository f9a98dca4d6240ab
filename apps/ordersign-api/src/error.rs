//! Error types for the order approval API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("signature is empty")]
    EmptySignature,

    #[error("order has no document to sign")]
    MissingDocument,

    #[error("document is not a valid PDF: {0}")]
    MalformedDocument(String),

    #[error("signature image could not be decoded")]
    UnsupportedImage,

    #[error("storage key already exists: {0}")]
    KeyConflict(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("storage I/O failure: {0}")]
    TransientIo(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("this signer has already signed the order")]
    DuplicateSignature,

    #[error("order is already finalized")]
    OrderClosed,

    #[error("role is not permitted to perform this action")]
    Forbidden,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<order_pdf::StampError> for ApiError {
    fn from(err: order_pdf::StampError) -> Self {
        match err {
            order_pdf::StampError::MalformedDocument(msg) => ApiError::MalformedDocument(msg),
            order_pdf::StampError::UnsupportedImage(_) => ApiError::UnsupportedImage,
            order_pdf::StampError::Emit(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::EmptySignature
            | ApiError::MalformedDocument(_)
            | ApiError::UnsupportedImage => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ApiError::MissingDocument
            | ApiError::KeyConflict(_)
            | ApiError::DuplicateSignature
            | ApiError::OrderClosed => (StatusCode::CONFLICT, self.to_string()),
            ApiError::ArtifactNotFound(_)
            | ApiError::OrderNotFound(_)
            | ApiError::ProfileNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::TransientIo(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

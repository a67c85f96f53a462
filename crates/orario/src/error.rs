//! HTTP error handling and response bodies.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::types::BookingError;

/// Outcome carried in the `status` field of every API reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Conflict,
    Error,
}

/// `{status, message}` reply body.
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub status: Status,
    pub message: String,
}

impl StatusMessage {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Error returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(e) => {
                error!(error = ?e, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = StatusMessage::new(Status::Error, self.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let response = AppError::NotFound("Lesson not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Lesson not found");
    }

    #[tokio::test]
    async fn test_internal_response() {
        let err: AppError = anyhow::anyhow!("disk on fire").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "disk on fire");
    }

    #[test]
    fn test_booking_error_is_bad_request() {
        let err: AppError = BookingError::ZeroDuration.into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let body = StatusMessage::new(Status::Conflict, "busy");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "conflict");
    }
}

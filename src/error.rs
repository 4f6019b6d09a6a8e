use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("no rides available for assignment")]
    EmptyQueue,

    #[error("no drivers available")]
    NoDriver,

    #[error("container port pool exhausted")]
    ResourceExhausted,

    #[error("provisioning failed: {0}")]
    Provision(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::EmptyQueue => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NoDriver | AppError::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provision(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "detail": self.to_string()
        }));

        (status, body).into_response()
    }
}

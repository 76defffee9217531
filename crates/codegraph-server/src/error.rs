//! The error envelope every endpoint responds with on failure (spec §6/§7):
//! `{ error: { code, message, details? }, timestamp }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use codegraph_core::CoreError;
use serde::Serialize;

pub struct ApiError(CoreError);

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::ParseFailure { .. } => StatusCode::BAD_REQUEST,
            CoreError::StorageFailure(_) | CoreError::Fatal(_) | CoreError::DeleteFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::CancellationOrTimeout(_) => StatusCode::BAD_REQUEST,
            CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = ErrorBody {
            error: ErrorDetail { code: self.0.code(), message: self.0.to_string() },
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

//! HTTP error mapping
//!
//! Every failure leaves the service as `{"success": false, "error": "..."}`
//! with a machine-readable `code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use msgdesk_common::api::AuthError;
use serde_json::json;
use thiserror::Error;

use crate::export::ExportError;
use crate::filter::FilterError;
use crate::label::LabelError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Nothing to operate on (404)
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Filter(_) => (StatusCode::BAD_REQUEST, "INVALID_CRITERIA"),
            ApiError::Label(LabelError::NoData) => (StatusCode::NOT_FOUND, "NO_DATA"),
            ApiError::Label(LabelError::Conflict { .. }) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Label(LabelError::Persistence(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILURE")
            }
            ApiError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILURE"),
            ApiError::Auth(AuthError::MissingFields | AuthError::UserExists(_)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ApiError::Auth(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "code": code,
        });
        if let ApiError::Label(LabelError::Conflict { current, .. }) = &self {
            body["current_version"] = json!(current);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

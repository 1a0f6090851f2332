//! Relevant-subset export endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::engine::ExportAttempt;
use crate::error::{ApiError, ApiResult};
use crate::export::ExportOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub message: String,
    /// `nothing_to_export`, `local_only` or `mirrored`
    pub status: &'static str,
    pub count: usize,
}

impl From<&ExportOutcome> for ExportResponse {
    fn from(outcome: &ExportOutcome) -> Self {
        let (status, count) = match outcome {
            ExportOutcome::NothingToExport => ("nothing_to_export", 0),
            ExportOutcome::LocalOnly { count, .. } => ("local_only", *count),
            ExportOutcome::Mirrored { count, .. } => ("mirrored", *count),
        };
        Self {
            success: true,
            message: outcome.message(),
            status,
            count,
        }
    }
}

/// GET /api/export
pub async fn export_relevant(State(state): State<AppState>) -> ApiResult<Json<ExportResponse>> {
    match state.engine.export_relevant().await? {
        ExportAttempt::NoData => Err(ApiError::NotFound("No data available".to_string())),
        ExportAttempt::Done(outcome) => Ok(Json(ExportResponse::from(&outcome))),
    }
}

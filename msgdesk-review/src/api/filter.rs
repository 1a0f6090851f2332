//! Filtered listing: full pagination and the "load more" window

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::views::{cards, MessageCard};
use crate::error::{ApiError, ApiResult};
use crate::filter::Criteria;
use crate::pagination::Pagination;
use crate::record::{coerce, Version};
use crate::AppState;

/// Body of `POST /api/filter`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    #[serde(flatten)]
    pub criteria: Criteria,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(default, alias = "per_page")]
    pub per_page: Option<Value>,
}

impl FilterRequest {
    fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page.as_ref().and_then(coerce::input_i64),
            self.per_page.as_ref().and_then(coerce::input_i64),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    pub messages: Vec<MessageCard>,
    pub total_count: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub version: Option<Version>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub messages: Vec<MessageCard>,
    pub offset: usize,
    pub next_offset: usize,
    pub version: Option<Version>,
}

/// POST /api/filter
pub async fn filter_messages(
    State(state): State<AppState>,
    body: Result<Json<FilterRequest>, JsonRejection>,
) -> ApiResult<Json<FilterResponse>> {
    let Json(request) = body
        .map_err(|e| ApiError::BadRequest(format!("No filters provided: {}", e.body_text())))?;
    let pagination = request.pagination();

    let page = state
        .engine
        .filter_page(&request.criteria, pagination)
        .await?;

    Ok(Json(FilterResponse {
        messages: cards(&page.records.records),
        total_count: page.total,
        page: pagination.page,
        per_page: pagination.per_page,
        total_pages: pagination.total_pages(page.total),
        version: page.records.version,
    }))
}

/// Criteria from query parameters; every value arrives as a string
fn criteria_from_query(params: HashMap<String, String>) -> ApiResult<Criteria> {
    let object: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    serde_json::from_value(Value::Object(object))
        .map_err(|e| ApiError::BadRequest(format!("Invalid query parameters: {}", e)))
}

/// GET /api/page/:offset
///
/// 24 cards starting at `offset` under the same criteria as the filter
/// endpoint (as query parameters). 204 when nothing is left.
pub async fn get_page(
    State(state): State<AppState>,
    Path(offset): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let offset: usize = offset
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid offset: {}", offset)))?;
    let criteria = criteria_from_query(params)?;

    let window = state.engine.page(&criteria, offset).await?;
    if window.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let messages: Vec<MessageCard> = window
        .records
        .iter()
        .map(|r| MessageCard::from_record(r).rounded())
        .collect();
    Ok(Json(PageResponse {
        next_offset: offset + messages.len(),
        messages,
        offset,
        version: window.version,
    })
    .into_response())
}

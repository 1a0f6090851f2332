//! Read-only views of the current record set

use axum::{extract::State, Json};
use serde::Serialize;

use super::views::{cards, MessageCard, MessageRow};
use crate::record::Version;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageRow>,
    pub total: usize,
    /// Pass back with label requests
    pub version: Option<Version>,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub min: String,
    pub max: String,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub messages: Vec<MessageCard>,
    pub channels: Vec<String>,
    pub date_range: Option<DateRange>,
    pub version: Option<Version>,
}

/// GET /api/messages
pub async fn get_messages(State(state): State<AppState>) -> Json<MessagesResponse> {
    let set = state.engine.record_set().await;
    Json(MessagesResponse {
        messages: set.records.iter().map(MessageRow::from).collect(),
        total: set.len(),
        version: set.version,
    })
}

/// GET /api/overview
///
/// Top cards by score, channel list and the span of the `Date` column.
pub async fn get_overview(State(state): State<AppState>) -> Json<OverviewResponse> {
    let overview = state.engine.overview().await;
    Json(OverviewResponse {
        messages: cards(&overview.top.records),
        channels: overview.channels,
        date_range: overview.date_range.map(|(min, max)| DateRange {
            min: min.format("%Y-%m-%d").to_string(),
            max: max.format("%Y-%m-%d").to_string(),
        }),
        version: overview.top.version,
    })
}

/// GET /api/channels
pub async fn get_channels(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.channels().await)
}

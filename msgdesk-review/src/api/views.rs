//! Client-facing projections of records
//!
//! Keys keep the source column names so the UI can use the same field
//! names as the persisted documents.

use serde::Serialize;

use crate::record::{Label, Record};

/// Compact card used by filter, page and overview responses
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageCard {
    #[serde(rename = "Embed")]
    pub embed: Option<String>,
    #[serde(rename = "Score")]
    pub score: Option<f64>,
    #[serde(rename = "Message ID")]
    pub message_id: Option<i64>,
    #[serde(rename = "URL")]
    pub url: Option<String>,
    #[serde(rename = "Label")]
    pub label: Option<Label>,
}

impl MessageCard {
    pub fn from_record(record: &Record) -> Self {
        Self {
            embed: record.embed.clone(),
            score: record.score,
            message_id: record.message_id,
            url: record.url.clone(),
            label: record.label,
        }
    }

    /// Score rounded to two decimals for display
    pub fn rounded(mut self) -> Self {
        self.score = self.score.map(|s| (s * 100.0).round() / 100.0);
        self
    }
}

/// Row of the full record-set listing
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageRow {
    #[serde(rename = "Message ID")]
    pub message_id: Option<i64>,
    #[serde(rename = "Message Text")]
    pub message_text: Option<String>,
    #[serde(rename = "Title")]
    pub channel: Option<String>,
    #[serde(rename = "Views")]
    pub views: Option<f64>,
    #[serde(rename = "Average Views")]
    pub average_views: Option<f64>,
    #[serde(rename = "Label")]
    pub label: Option<Label>,
}

impl From<&Record> for MessageRow {
    fn from(record: &Record) -> Self {
        Self {
            message_id: record.message_id,
            message_text: record.message_text.clone(),
            channel: record.channel.clone(),
            views: record.views,
            average_views: record.average_views,
            label: record.label,
        }
    }
}

pub fn cards<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<MessageCard> {
    records.into_iter().map(MessageCard::from_record).collect()
}

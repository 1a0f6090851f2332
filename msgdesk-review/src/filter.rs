//! Criteria-based filtering of a record set
//!
//! Filtering is pure: it never touches storage and never reorders records.
//! A criterion only applies when the column it reads exists in the set's
//! schema; otherwise it is silently ignored. Applying the same criteria
//! twice yields the same result as applying them once.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::record::{coerce, dates, Column, Label, Record, RecordSet};

/// Rejected filter input
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("invalid {field}: '{value}' is not a date")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid label filter: '{0}' (expected 0 or 1)")]
    InvalidLabel(String),
}

/// One channel or several; a single string may hold a comma-separated list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChannelSelection {
    One(String),
    Many(Vec<String>),
}

impl ChannelSelection {
    /// Non-empty channel names in this selection
    pub fn names(&self) -> HashSet<String> {
        let raw: Vec<&str> = match self {
            ChannelSelection::One(s) => s.split(',').collect(),
            ChannelSelection::Many(list) => list.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Filter criteria as submitted by a client
///
/// Score bounds and the label accept numbers or numeric strings. Blank
/// values mean "not given".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Criteria {
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub channel: Option<ChannelSelection>,
    pub score_min: Option<Value>,
    pub score_max: Option<Value>,
    pub media_type: Option<String>,
    pub label: Option<Value>,
    pub sort_by: Option<String>,
}

/// Criteria resolved against one schema
#[derive(Debug, Default)]
struct Predicates {
    date_from: Option<NaiveDate>,
    /// Exclusive: the day after `dateEnd`
    date_until: Option<NaiveDate>,
    date_bounded: bool,
    channels: Option<HashSet<String>>,
    score_min: Option<f64>,
    score_max: Option<f64>,
    media_type: Option<String>,
    label: Option<Label>,
}

impl Predicates {
    fn compile(criteria: &Criteria, set: &RecordSet) -> Result<Self, FilterError> {
        let schema = &set.schema;
        let mut p = Predicates::default();

        if schema.has(Column::SentAt) {
            p.date_from = parse_bound("dateStart", criteria.date_start.as_deref())?;
            let end = parse_bound("dateEnd", criteria.date_end.as_deref())?;
            p.date_bounded = p.date_from.is_some() || end.is_some();
            // The last representable day has no successor; nothing lies beyond it
            p.date_until = end.and_then(|d| d.succ_opt());
        }

        if schema.has(Column::Channel) {
            p.channels = criteria
                .channel
                .as_ref()
                .map(ChannelSelection::names)
                .filter(|names| !names.is_empty());
        }

        if schema.has(Column::Score) {
            p.score_min = score_bound("scoreMin", criteria.score_min.as_ref());
            p.score_max = score_bound("scoreMax", criteria.score_max.as_ref());
        }

        if schema.has(Column::MediaType) {
            p.media_type = criteria
                .media_type
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_lowercase);
        }

        if schema.has(Column::Label) {
            p.label = match criteria.label.as_ref() {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.trim().is_empty() => None,
                Some(raw) => Some(
                    Label::from_raw(raw).ok_or_else(|| FilterError::InvalidLabel(display(raw)))?,
                ),
            };
        }

        Ok(p)
    }

    fn matches(&self, record: &Record) -> bool {
        if self.date_bounded {
            let Some(sent) = record.sent_at.map(|dt| dt.date()) else {
                return false;
            };
            if self.date_from.is_some_and(|from| sent < from) {
                return false;
            }
            if self.date_until.is_some_and(|until| sent >= until) {
                return false;
            }
        }

        if let Some(channels) = &self.channels {
            if !record.channel.as_ref().is_some_and(|c| channels.contains(c)) {
                return false;
            }
        }

        if self.score_min.is_some() || self.score_max.is_some() {
            let Some(score) = record.score else {
                return false;
            };
            if self.score_min.is_some_and(|min| score < min) {
                return false;
            }
            if self.score_max.is_some_and(|max| score > max) {
                return false;
            }
        }

        if let Some(media) = &self.media_type {
            if !record
                .media_type
                .as_ref()
                .is_some_and(|m| m.to_lowercase() == *media)
            {
                return false;
            }
        }

        if let Some(label) = self.label {
            if record.label != Some(label) {
                return false;
            }
        }

        true
    }
}

fn parse_bound(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, FilterError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => dates::parse_date_bound(s)
            .map(Some)
            .ok_or_else(|| FilterError::InvalidDate {
                field,
                value: s.to_string(),
            }),
    }
}

fn score_bound(field: &str, raw: Option<&Value>) -> Option<f64> {
    let raw = raw?;
    let bound = coerce::input_f64(raw);
    if bound.is_none() && !raw.is_null() {
        debug!(field, value = %raw, "Ignoring non-numeric score bound");
    }
    bound
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Records satisfying every applicable criterion, in original order
pub fn filter(set: &RecordSet, criteria: &Criteria) -> Result<RecordSet, FilterError> {
    let predicates = Predicates::compile(criteria, set)?;
    let records = set
        .records
        .iter()
        .filter(|r| predicates.matches(r))
        .cloned()
        .collect();
    Ok(set.with_records(records))
}

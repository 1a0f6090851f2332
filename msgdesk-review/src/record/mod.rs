//! Record model: one ingested message, the schema of a loaded set, and the
//! set itself
//!
//! Source documents are flat JSON objects with heterogeneous keys. Known
//! columns are coerced into typed fields; unknown keys and raw values that
//! failed coercion are kept in a passthrough map so a full-set persist
//! writes back everything that was read.

pub mod coerce;
pub mod dates;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Channel value substituted for null or empty `Title` cells
pub const UNKNOWN_CHANNEL: &str = "Unknown";

/// Known columns of a message document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    MessageId,
    Channel,
    Date,
    SentAt,
    CreatedAt,
    EditedAt,
    Score,
    Views,
    AverageViews,
    MediaType,
    Embed,
    Url,
    MessageText,
    Label,
}

impl Column {
    /// All known columns, in persisted order
    pub const ALL: [Column; 14] = [
        Column::MessageId,
        Column::Channel,
        Column::Date,
        Column::SentAt,
        Column::CreatedAt,
        Column::EditedAt,
        Column::Score,
        Column::Views,
        Column::AverageViews,
        Column::MediaType,
        Column::Embed,
        Column::Url,
        Column::MessageText,
        Column::Label,
    ];

    /// Date-like columns normalised on load
    pub const DATES: [Column; 4] = [
        Column::Date,
        Column::SentAt,
        Column::CreatedAt,
        Column::EditedAt,
    ];

    /// Key used for this column in source documents
    pub fn key(self) -> &'static str {
        match self {
            Column::MessageId => "Message ID",
            Column::Channel => "Title",
            Column::Date => "Date",
            Column::SentAt => "Date Sent",
            Column::CreatedAt => "Creation Date",
            Column::EditedAt => "Edit Date",
            Column::Score => "Score",
            Column::Views => "Views",
            Column::AverageViews => "Average Views",
            Column::MediaType => "Media Type",
            Column::Embed => "Embed",
            Column::Url => "URL",
            Column::MessageText => "Message Text",
            Column::Label => "Label",
        }
    }

    pub fn from_key(key: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Reviewer relevance annotation, persisted as 0 or 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Label {
    NotRelevant,
    Relevant,
}

impl Label {
    pub fn value(self) -> i64 {
        match self {
            Label::NotRelevant => 0,
            Label::Relevant => 1,
        }
    }

    /// Interpret a raw cell; anything numerically equal to 0 or 1 counts
    pub fn from_raw(value: &Value) -> Option<Label> {
        match coerce::to_f64(value)? {
            v if v == 1.0 => Some(Label::Relevant),
            v if v == 0.0 => Some(Label::NotRelevant),
            _ => None,
        }
    }
}

impl TryFrom<i64> for Label {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::NotRelevant),
            1 => Ok(Label::Relevant),
            other => Err(format!("label must be 0 or 1, got {}", other)),
        }
    }
}

impl From<Label> for i64 {
    fn from(label: Label) -> i64 {
        label.value()
    }
}

/// Content digest of the bytes a record set was read from or written to
///
/// Used as an optimistic-concurrency token by the label mutator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Version {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One message with its normalised fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub message_id: Option<i64>,
    pub channel: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub sent_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub edited_at: Option<NaiveDateTime>,
    pub score: Option<f64>,
    pub views: Option<f64>,
    pub average_views: Option<f64>,
    pub media_type: Option<String>,
    pub embed: Option<String>,
    pub url: Option<String>,
    pub message_text: Option<String>,
    pub label: Option<Label>,
    /// Unknown keys and uncoercible raw values, written back verbatim
    passthrough: Map<String, Value>,
    /// Source cells of coerced columns; reused on write while the typed
    /// field still matches, so untouched fields keep their encoding
    source: Map<String, Value>,
}

impl Record {
    /// Build a record from one source object. Never fails.
    ///
    /// Date-like columns are left raw in the passthrough map; they are
    /// parsed column-wide by [`RecordSet::from_rows`].
    pub fn from_json(object: Map<String, Value>) -> Self {
        let mut record = Record::default();

        for (key, value) in object {
            let Some(column) = Column::from_key(&key) else {
                record.passthrough.insert(key, value);
                continue;
            };
            if value.is_null() {
                continue;
            }

            let kept = match column {
                Column::MessageId => coerce::to_i64(&value).map(|v| record.message_id = Some(v)),
                Column::Channel => coerce::to_text(&value).map(|v| record.channel = Some(v)),
                Column::Date | Column::SentAt | Column::CreatedAt | Column::EditedAt => None,
                Column::Score => coerce::to_f64(&value).map(|v| record.score = Some(v)),
                Column::Views => coerce::to_f64(&value).map(|v| record.views = Some(v)),
                Column::AverageViews => {
                    coerce::to_f64(&value).map(|v| record.average_views = Some(v))
                }
                Column::MediaType => coerce::to_text(&value).map(|v| record.media_type = Some(v)),
                Column::Embed => coerce::to_text(&value).map(|v| record.embed = Some(v)),
                Column::Url => coerce::to_text(&value).map(|v| record.url = Some(v)),
                Column::MessageText => {
                    coerce::to_text(&value).map(|v| record.message_text = Some(v))
                }
                Column::Label => Label::from_raw(&value).map(|v| record.label = Some(v)),
            };

            match kept {
                Some(()) => {
                    record.source.insert(key, value);
                }
                None => {
                    record.passthrough.insert(key, value);
                }
            }
        }

        record
    }

    /// Serialise back to a flat source object: typed fields first, in
    /// [`Column::ALL`] order, then passthrough keys not already written
    pub fn to_json(&self) -> Map<String, Value> {
        let mut object = Map::new();

        for column in Column::ALL {
            if let Some(value) = self.typed_value(column) {
                object.insert(column.key().to_string(), value);
            }
        }
        for (key, value) in &self.passthrough {
            if !object.contains_key(key) {
                object.insert(key.clone(), value.clone());
            }
        }

        object
    }

    /// Typed value of a known column as JSON, if set
    ///
    /// The source cell is returned as long as it still coerces to the
    /// typed field; a changed field is encoded from its typed value.
    pub fn typed_value(&self, column: Column) -> Option<Value> {
        let encoded = self.encode(column)?;
        match self.source.get(column.key()) {
            Some(raw) if self.matches_source(column, raw) => Some(raw.clone()),
            _ => Some(encoded),
        }
    }

    fn matches_source(&self, column: Column, raw: &Value) -> bool {
        match column {
            Column::MessageId => coerce::to_i64(raw) == self.message_id,
            Column::Channel => coerce::to_text(raw) == self.channel,
            Column::Score => coerce::to_f64(raw) == self.score,
            Column::Views => coerce::to_f64(raw) == self.views,
            Column::AverageViews => coerce::to_f64(raw) == self.average_views,
            Column::MediaType => coerce::to_text(raw) == self.media_type,
            Column::Embed => coerce::to_text(raw) == self.embed,
            Column::Url => coerce::to_text(raw) == self.url,
            Column::MessageText => coerce::to_text(raw) == self.message_text,
            Column::Label => Label::from_raw(raw) == self.label,
            Column::Date | Column::SentAt | Column::CreatedAt | Column::EditedAt => false,
        }
    }

    fn encode(&self, column: Column) -> Option<Value> {
        let text = |v: &Option<String>| v.clone().map(Value::String);
        let stamp = |v: &Option<NaiveDateTime>| v.map(|dt| Value::String(dates::format_timestamp(&dt)));
        let number = |v: Option<f64>| v.and_then(serde_json::Number::from_f64).map(Value::Number);

        match column {
            Column::MessageId => self.message_id.map(Value::from),
            Column::Channel => text(&self.channel),
            Column::Date => stamp(&self.date),
            Column::SentAt => stamp(&self.sent_at),
            Column::CreatedAt => stamp(&self.created_at),
            Column::EditedAt => stamp(&self.edited_at),
            Column::Score => number(self.score),
            Column::Views => number(self.views),
            Column::AverageViews => number(self.average_views),
            Column::MediaType => text(&self.media_type),
            Column::Embed => text(&self.embed),
            Column::Url => text(&self.url),
            Column::MessageText => text(&self.message_text),
            Column::Label => self.label.map(|l| Value::from(l.value())),
        }
    }

    /// Raw value kept for `key`, if any
    pub fn passthrough(&self, key: &str) -> Option<&Value> {
        self.passthrough.get(key)
    }

    fn timestamp_mut(&mut self, column: Column) -> Option<&mut Option<NaiveDateTime>> {
        match column {
            Column::Date => Some(&mut self.date),
            Column::SentAt => Some(&mut self.sent_at),
            Column::CreatedAt => Some(&mut self.created_at),
            Column::EditedAt => Some(&mut self.edited_at),
            _ => None,
        }
    }
}

/// Which known columns a loaded set carries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeSet<Column>,
    dropped: BTreeSet<Column>,
}

impl Schema {
    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn insert(&mut self, column: Column) {
        self.columns.insert(column);
        self.dropped.remove(&column);
    }

    /// Drop a column for this load and remember why it is missing
    pub fn drop_column(&mut self, column: Column) {
        if self.columns.remove(&column) {
            self.dropped.insert(column);
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    /// Columns present in the source but discarded during normalisation
    pub fn dropped_columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.dropped.iter().copied()
    }
}

/// Persisted document could not be read as `{"messages": [...]}`
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document has no 'messages' array")]
    MissingMessages,
}

/// Wire shape of a persisted record set
#[derive(Debug, Serialize, Deserialize)]
struct Document {
    messages: Vec<Value>,
}

/// The full in-memory collection produced by one load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    pub records: Vec<Record>,
    pub schema: Schema,
    /// Digest of the source bytes; `None` for sets not read from storage
    pub version: Option<Version>,
}

impl RecordSet {
    /// Build and normalise a set from raw source objects
    ///
    /// - schema: a known column is present if any object carries its key
    /// - channel: null/empty/missing becomes [`UNKNOWN_CHANNEL`]
    /// - dates: each date column is parsed as a whole; one bad cell drops
    ///   the column for this load (raw values stay in passthrough)
    pub fn from_rows(rows: Vec<Map<String, Value>>) -> Self {
        let mut schema = Schema::default();
        for row in &rows {
            for key in row.keys() {
                if let Some(column) = Column::from_key(key) {
                    schema.insert(column);
                }
            }
        }

        let mut records: Vec<Record> = rows.into_iter().map(Record::from_json).collect();

        if schema.has(Column::Channel) {
            for record in &mut records {
                if record.channel.as_deref().map_or(true, str::is_empty) {
                    record.channel = Some(UNKNOWN_CHANNEL.to_string());
                }
            }
        }

        for column in Column::DATES {
            if schema.has(column) && !normalize_date_column(&mut records, column) {
                schema.drop_column(column);
            }
        }

        Self {
            records,
            schema,
            version: None,
        }
    }

    /// Parse a persisted `{"messages": [...]}` document
    ///
    /// Non-object entries are skipped with a warning.
    pub fn from_document_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let messages = match value {
            Value::Object(mut top) => match top.remove("messages") {
                Some(Value::Array(items)) => items,
                _ => return Err(DocumentError::MissingMessages),
            },
            _ => return Err(DocumentError::MissingMessages),
        };

        let total = messages.len();
        let rows: Vec<Map<String, Value>> = messages
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        if rows.len() != total {
            warn!(
                skipped = total - rows.len(),
                "Skipped non-object entries in messages array"
            );
        }

        let mut set = Self::from_rows(rows);
        set.version = Some(Version::of(bytes));
        Ok(set)
    }

    /// Serialise the whole set as a persisted document
    pub fn to_document_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let document = Document {
            messages: self
                .records
                .iter()
                .map(|r| Value::Object(r.to_json()))
                .collect(),
        };
        serde_json::to_vec(&document)
    }

    /// Same schema and version, different records (derived views)
    pub fn with_records(&self, records: Vec<Record>) -> Self {
        Self {
            records,
            schema: self.schema.clone(),
            version: self.version.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index of the first record with `message_id`
    pub fn position(&self, message_id: i64) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.message_id == Some(message_id))
    }

    /// Sorted unique channel names; empty when the column is absent
    pub fn channels(&self) -> Vec<String> {
        if !self.schema.has(Column::Channel) {
            return Vec::new();
        }
        let unique: BTreeSet<&str> = self
            .records
            .iter()
            .filter_map(|r| r.channel.as_deref())
            .collect();
        unique.into_iter().map(str::to_string).collect()
    }

    /// Column names across all records: known columns in [`Column::ALL`]
    /// order, then other keys in first-appearance order
    pub fn column_names(&self) -> Vec<String> {
        let objects: Vec<Map<String, Value>> = self.records.iter().map(Record::to_json).collect();

        let mut names: Vec<String> = Column::ALL
            .into_iter()
            .map(|c| c.key())
            .filter(|key| objects.iter().any(|o| o.contains_key(*key)))
            .map(str::to_string)
            .collect();
        let mut seen: HashSet<String> = names.iter().cloned().collect();

        for object in &objects {
            for key in object.keys() {
                if seen.insert(key.clone()) {
                    names.push(key.clone());
                }
            }
        }

        names
    }
}

/// Parse one date column across all records; all-or-nothing
fn normalize_date_column(records: &mut [Record], column: Column) -> bool {
    let key = column.key();
    let mut parsed = Vec::with_capacity(records.len());

    for record in records.iter() {
        let raw = record.passthrough.get(key).unwrap_or(&Value::Null);
        match dates::parse_timestamp_value(raw) {
            Ok(value) => parsed.push(value),
            Err(e) => {
                warn!(column = key, error = %e, "Dropping date column for this load");
                return false;
            }
        }
    }

    for (record, value) in records.iter_mut().zip(parsed) {
        if let Some(slot) = record.timestamp_mut(column) {
            *slot = value;
        }
        record.passthrough.shift_remove(key);
    }
    true
}

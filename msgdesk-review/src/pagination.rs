//! Sorting and page windows over a record set
//!
//! Both operations are deterministic and keep no cursor state: the same
//! inputs always produce the same window.

use std::cmp::Ordering;

use crate::record::{Column, Record, RecordSet};

/// Page size used when the client does not ask for one
pub const DEFAULT_PER_PAGE: usize = 24;

/// Largest page a client may request
pub const MAX_PER_PAGE: usize = 100;

/// Fixed window of the offset-based "load more" variant
pub const LOAD_MORE_WINDOW: usize = 24;

/// Requested sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Score descending (when the column exists)
    #[default]
    Score,
    /// Views descending, falling back to score without a Views column
    Views,
}

impl SortKey {
    /// Only the literal `"views"` selects views; anything else is score
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("views") => SortKey::Views,
            _ => SortKey::Score,
        }
    }

    /// Column actually used for `set`, if any
    fn column(self, set: &RecordSet) -> Option<Column> {
        if self == SortKey::Views && set.schema.has(Column::Views) {
            return Some(Column::Views);
        }
        set.schema.has(Column::Score).then_some(Column::Score)
    }
}

fn sort_value(record: &Record, column: Column) -> Option<f64> {
    match column {
        Column::Views => record.views,
        _ => record.score,
    }
}

/// Descending, absent values last
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort: ties keep their original relative order
pub fn sort(set: &RecordSet, key: SortKey) -> RecordSet {
    let mut records = set.records.clone();
    if let Some(column) = key.column(set) {
        records.sort_by(|a, b| descending(sort_value(a, column), sort_value(b, column)));
    }
    set.with_records(records)
}

/// Page request after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    /// Records per page, within `1..=MAX_PER_PAGE`
    pub per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Pagination {
    /// Clamp raw client input
    ///
    /// Missing values take their defaults; `page` is at least 1 and
    /// `per_page` is clamped into `1..=MAX_PER_PAGE`.
    ///
    /// # Examples
    /// ```
    /// use msgdesk_review::pagination::Pagination;
    ///
    /// let p = Pagination::new(Some(3), Some(500));
    /// assert_eq!(p.page, 3);
    /// assert_eq!(p.per_page, 100);
    /// assert_eq!(p.offset(), 200);
    ///
    /// let p = Pagination::new(Some(-4), None);
    /// assert_eq!(p.page, 1);
    /// assert_eq!(p.per_page, 24);
    /// ```
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        let page = page.map_or(1, |p| to_usize(p.max(1)));
        let per_page = per_page.map_or(DEFAULT_PER_PAGE, |n| {
            to_usize(n.max(1)).min(MAX_PER_PAGE)
        });
        Self { page, per_page }
    }

    /// Index of the first record on this page
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Number of pages needed for `total` records
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.per_page)
    }
}

fn to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Records `[offset, offset + len)`; empty when `offset` is past the end
pub fn window(set: &RecordSet, offset: usize, len: usize) -> RecordSet {
    let records = set.records.iter().skip(offset).take(len).cloned().collect();
    set.with_records(records)
}

/// One page of an already-sorted set
pub fn paginate(set: &RecordSet, pagination: Pagination) -> RecordSet {
    window(set, pagination.offset(), pagination.per_page)
}

/// Fixed-size continuation window starting at `offset`
pub fn load_more(set: &RecordSet, offset: usize) -> RecordSet {
    window(set, offset, LOAD_MORE_WINDOW)
}

//! Message query engine
//!
//! Read operations load a fresh record set on every call and run it
//! through filter, sort and pagination. Write operations go through the
//! label mutator and the export gateway.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::export::{ExportError, ExportOutcome, Gateway};
use crate::filter::{self, Criteria, FilterError};
use crate::label::{LabelError, LabelMutator, LabelOutcome};
use crate::loader::{LoadError, Loader};
use crate::pagination::{self, Pagination, SortKey};
use crate::record::{Label, RecordSet, Version};
use crate::store::BlobStore;

/// Cards shown on the landing view
pub const OVERVIEW_LIMIT: usize = 48;

/// One page of filtered, sorted records
#[derive(Debug, Clone)]
pub struct FilteredPage {
    pub records: RecordSet,
    /// Matching records before pagination
    pub total: usize,
    pub pagination: Pagination,
}

/// Landing view data
#[derive(Debug, Clone)]
pub struct Overview {
    pub top: RecordSet,
    pub channels: Vec<String>,
    /// Earliest and latest calendar day of the `Date` column
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Export attempt on the current data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportAttempt {
    NoData,
    Done(ExportOutcome),
}

pub struct ReviewEngine {
    loader: Arc<Loader>,
    gateway: Arc<Gateway>,
    labels: LabelMutator,
}

impl ReviewEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn BlobStore>) -> Result<Self, LoadError> {
        let loader = Arc::new(Loader::new(config.clone(), store.clone())?);
        let gateway = Arc::new(Gateway::new(config, store));
        let labels = LabelMutator::new(loader.clone(), gateway.clone());
        Ok(Self {
            loader,
            gateway,
            labels,
        })
    }

    /// Current full record set
    pub async fn record_set(&self) -> RecordSet {
        self.loader.load().await
    }

    /// Sorted unique channel names
    pub async fn channels(&self) -> Vec<String> {
        self.loader.load().await.channels()
    }

    pub async fn overview(&self) -> Overview {
        let set = self.loader.load().await;
        let sorted = pagination::sort(&set, SortKey::Score);
        let top = pagination::window(&sorted, 0, OVERVIEW_LIMIT);

        let mut days = set.records.iter().filter_map(|r| r.date.map(|d| d.date()));
        let date_range = days.next().map(|first| {
            days.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)))
        });

        Overview {
            top,
            channels: set.channels(),
            date_range,
        }
    }

    /// Filter, sort and paginate the current set
    pub async fn filter_page(
        &self,
        criteria: &Criteria,
        page: Pagination,
    ) -> Result<FilteredPage, FilterError> {
        let sorted = self.filtered_sorted(criteria).await?;
        Ok(FilteredPage {
            records: pagination::paginate(&sorted, page),
            total: sorted.len(),
            pagination: page,
        })
    }

    /// "Load more" window of 24 records starting at `offset`
    pub async fn page(&self, criteria: &Criteria, offset: usize) -> Result<RecordSet, FilterError> {
        let sorted = self.filtered_sorted(criteria).await?;
        Ok(pagination::load_more(&sorted, offset))
    }

    async fn filtered_sorted(&self, criteria: &Criteria) -> Result<RecordSet, FilterError> {
        let set = self.loader.load().await;
        let matching = filter::filter(&set, criteria)?;
        Ok(pagination::sort(
            &matching,
            SortKey::parse(criteria.sort_by.as_deref()),
        ))
    }

    pub async fn apply_label(
        &self,
        message_id: i64,
        label: Option<Label>,
        expected: &Version,
    ) -> Result<LabelOutcome, LabelError> {
        self.labels.apply_label(message_id, label, expected).await
    }

    /// Export the relevant subset of the current set
    pub async fn export_relevant(&self) -> Result<ExportAttempt, ExportError> {
        let set = self.loader.load().await;
        if set.is_empty() {
            return Ok(ExportAttempt::NoData);
        }
        Ok(ExportAttempt::Done(self.gateway.export_relevant(&set).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsBlobStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    async fn engine(document: Value) -> (TempDir, ReviewEngine) {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig {
            local_fallback_path: tmp.path().join("local.json"),
            export_path: tmp.path().join("relevant.csv"),
            ..EngineConfig::default()
        };
        std::fs::write(
            &config.local_fallback_path,
            serde_json::to_vec(&document).unwrap(),
        )
        .unwrap();
        let store = Arc::new(FsBlobStore::new(tmp.path().join("blobs"), "monitoria-data"));
        let engine = ReviewEngine::new(config, store).unwrap();
        (tmp, engine)
    }

    fn ids(set: &RecordSet) -> Vec<i64> {
        set.records.iter().filter_map(|r| r.message_id).collect()
    }

    fn scenario() -> Value {
        json!({"messages": [
            {"Message ID": 1, "Score": "5", "Title": "A", "Date Sent": "2024-01-01"},
            {"Message ID": 2, "Score": 3, "Title": "B", "Date Sent": "2024-01-03"}
        ]})
    }

    #[tokio::test]
    async fn test_filter_sort_paginate_scenario() {
        let (_tmp, engine) = engine(scenario()).await;

        let criteria: Criteria = serde_json::from_value(json!({"scoreMin": 4})).unwrap();
        let page = engine
            .filter_page(&criteria, Pagination::default())
            .await
            .unwrap();
        assert_eq!(ids(&page.records), vec![1]);
        assert_eq!(page.total, 1);

        let all = engine
            .filter_page(&Criteria::default(), Pagination::new(Some(1), Some(1)))
            .await
            .unwrap();
        assert_eq!(ids(&all.records), vec![1]);
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn test_date_window_scenario() {
        let (_tmp, engine) = engine(scenario()).await;
        let criteria: Criteria =
            serde_json::from_value(json!({"dateStart": "2024-01-02", "dateEnd": "2024-01-03"}))
                .unwrap();
        let page = engine
            .filter_page(&criteria, Pagination::default())
            .await
            .unwrap();
        assert_eq!(ids(&page.records), vec![2]);
    }

    #[tokio::test]
    async fn test_label_then_filter_then_export() {
        let (_tmp, engine) = engine(scenario()).await;
        let version = engine.record_set().await.version.unwrap();

        let outcome = engine
            .apply_label(2, Some(Label::Relevant), &version)
            .await
            .unwrap();
        assert!(matches!(outcome, LabelOutcome::Applied { .. }));

        let criteria: Criteria = serde_json::from_value(json!({"label": 1})).unwrap();
        let labelled = engine
            .filter_page(&criteria, Pagination::default())
            .await
            .unwrap();
        assert_eq!(ids(&labelled.records), vec![2]);

        let attempt = engine.export_relevant().await.unwrap();
        let ExportAttempt::Done(ExportOutcome::Mirrored { count, .. }) = attempt else {
            panic!("expected mirrored export, got {:?}", attempt);
        };
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_export_without_labels() {
        let (_tmp, engine) = engine(scenario()).await;
        assert_eq!(
            engine.export_relevant().await.unwrap(),
            ExportAttempt::Done(ExportOutcome::NothingToExport)
        );
    }

    #[tokio::test]
    async fn test_export_with_no_data() {
        let (_tmp, engine) = engine(json!({"messages": []})).await;
        assert_eq!(engine.export_relevant().await.unwrap(), ExportAttempt::NoData);
    }

    #[tokio::test]
    async fn test_overview() {
        let (_tmp, engine) = engine(json!({"messages": [
            {"Message ID": 1, "Score": 1, "Title": "b", "Date": "2024-02-01T10:00:00"},
            {"Message ID": 2, "Score": 7, "Title": "a", "Date": "2024-01-15"},
            {"Message ID": 3, "Score": 4, "Title": "b", "Date": "2024-03-02"}
        ]}))
        .await;

        let overview = engine.overview().await;
        assert_eq!(ids(&overview.top), vec![2, 3, 1]);
        assert_eq!(overview.channels, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            overview.date_range,
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
            ))
        );
    }

    #[tokio::test]
    async fn test_page_offsets() {
        let messages: Vec<Value> = (1..=30)
            .map(|i| json!({"Message ID": i, "Score": 100 - i}))
            .collect();
        let (_tmp, engine) = engine(json!({ "messages": messages })).await;

        let first = engine.page(&Criteria::default(), 0).await.unwrap();
        let second = engine.page(&Criteria::default(), 24).await.unwrap();
        assert_eq!(first.len(), 24);
        assert_eq!(ids(&second), (25..=30).collect::<Vec<_>>());
        assert!(engine.page(&Criteria::default(), 30).await.unwrap().is_empty());
    }
}

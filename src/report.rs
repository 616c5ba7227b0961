//! Admin report of ranked download counters.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::instrument;

use crate::catalog::Catalog;
use crate::stats::{CounterRecord, OrderField, Result, StatisticsStore};

/// One ranked report line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// 1-based position.
    pub rank: usize,
    /// Ranked resource.
    pub resource_id: i64,
    /// Display name, when the file is in the catalog.
    pub filename: Option<String>,
    /// Lifetime downloads.
    pub total_count: i64,
    /// Downloads since the last reset.
    pub day_count: i64,
    /// Unix time of the last download.
    pub last_timestamp: i64,
    /// Last downloading user.
    pub last_user_id: i64,
    /// Last downloading user's name, when known.
    pub last_username: Option<String>,
    /// `total_count` as a percentage of the busiest resource.
    pub share_percent: f64,
}

/// Ranked counters, ready to print.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadReport {
    /// Ranking column.
    pub order: OrderField,
    /// Highest lifetime count across all resources.
    pub max_total_count: i64,
    /// Ranked rows.
    pub rows: Vec<ReportRow>,
}

impl DownloadReport {
    /// Builds the report from the store and catalog.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if any lookup fails.
    #[instrument(skip(store, catalog))]
    pub async fn build(
        store: &StatisticsStore,
        catalog: &Catalog,
        order: OrderField,
        limit: u32,
    ) -> Result<Self> {
        let ids = store.fetch_all(order, limit).await?;
        let records = store.fetch_downloads(&ids).await?;
        let max_total_count = store.max_total_count().await?;

        let mut rows = Vec::with_capacity(ids.len());
        for (rank, record) in ranked_records(&ids, &records) {
            let filename = catalog
                .get_file(record.resource_id)
                .await?
                .map(|file| file.filename);
            let last_username = catalog.account_name(record.last_user_id).await?;

            rows.push(ReportRow {
                rank,
                resource_id: record.resource_id,
                filename,
                total_count: record.total_count,
                day_count: record.day_count,
                last_timestamp: record.last_timestamp,
                last_user_id: record.last_user_id,
                last_username,
                share_percent: share_percent(record.total_count, max_total_count),
            });
        }

        Ok(Self {
            order,
            max_total_count,
            rows,
        })
    }

    /// Renders an aligned plain-text table.
    #[must_use]
    pub fn to_table(&self) -> String {
        if self.rows.is_empty() {
            return "No downloads recorded.\n".to_string();
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>4}  {:>8}  {:<32}  {:>8}  {:>8}  {:>6}  {:<16}",
            "#", "id", "file", "total", "today", "share", "last user"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:>4}  {:>8}  {:<32}  {:>8}  {:>8}  {:>5.1}%  {:<16}",
                row.rank,
                row.resource_id,
                truncate(row.filename.as_deref().unwrap_or("-"), 32),
                row.total_count,
                row.day_count,
                row.share_percent,
                row.last_username
                    .clone()
                    .unwrap_or_else(|| row.last_user_id.to_string()),
            );
        }
        out
    }
}

/// Pairs ranked ids with their records and 1-based ranks.
///
/// Ids deleted between the ranking and the lookup are skipped without leaving
/// a gap in the ranks.
fn ranked_records<'a>(
    ids: &[i64],
    records: &'a HashMap<i64, CounterRecord>,
) -> Vec<(usize, &'a CounterRecord)> {
    ids.iter()
        .filter_map(|id| records.get(id))
        .enumerate()
        .map(|(index, record)| (index + 1, record))
        .collect()
}

fn share_percent(total: i64, max: i64) -> f64 {
    if max <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let share = total as f64 * 100.0 / max as f64;
    share
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

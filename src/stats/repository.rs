//! Repository seam for download statistics.
//!
//! The interceptor and presentation adapters depend on this trait rather than
//! on [`StatisticsStore`] directly, so they can run against any counter backend.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{CounterRecord, FilenameEntry, OrderField, Result, StatisticsStore};

/// Data-access contract for download counters.
#[async_trait]
pub trait StatisticsRepository: Send + Sync {
    /// Counts one download; returns `false` when counting failed.
    async fn record_download(&self, resource_id: i64, user_id: i64) -> bool;

    /// Bulk counter lookup; missing resources are absent.
    async fn fetch_downloads(&self, ids: &[i64]) -> Result<HashMap<i64, CounterRecord>>;

    /// Single counter lookup.
    async fn fetch_download(&self, resource_id: i64) -> Result<Option<CounterRecord>>;

    /// Top resource ids by `order`.
    async fn fetch_all(&self, order: OrderField, limit: u32) -> Result<Vec<i64>>;

    /// Highest lifetime count, 0 when empty.
    async fn max_total_count(&self) -> Result<i64>;

    /// Ranked resources with filename and last downloader.
    async fn filename_list(&self, order: OrderField, limit: u32) -> Result<Vec<FilenameEntry>>;

    /// Removes every counter row.
    async fn delete_all_downloads(&self) -> Result<u64>;
}

#[async_trait]
impl StatisticsRepository for StatisticsStore {
    async fn record_download(&self, resource_id: i64, user_id: i64) -> bool {
        StatisticsStore::record_download(self, resource_id, user_id).await
    }

    async fn fetch_downloads(&self, ids: &[i64]) -> Result<HashMap<i64, CounterRecord>> {
        StatisticsStore::fetch_downloads(self, ids).await
    }

    async fn fetch_download(&self, resource_id: i64) -> Result<Option<CounterRecord>> {
        StatisticsStore::fetch_download(self, resource_id).await
    }

    async fn fetch_all(&self, order: OrderField, limit: u32) -> Result<Vec<i64>> {
        StatisticsStore::fetch_all(self, order, limit).await
    }

    async fn max_total_count(&self) -> Result<i64> {
        StatisticsStore::max_total_count(self).await
    }

    async fn filename_list(&self, order: OrderField, limit: u32) -> Result<Vec<FilenameEntry>> {
        StatisticsStore::filename_list(self, order, limit).await
    }

    async fn delete_all_downloads(&self) -> Result<u64> {
        StatisticsStore::delete_all_downloads(self).await
    }
}

//! Download statistics persistence and ranking.
//!
//! This module provides `SQLite`-backed counters tracking how often each
//! downloadable resource was fetched, both over its lifetime and since the last
//! daily reset.
//!
//! # Overview
//!
//! - [`StatisticsStore`] - Main interface for counter operations
//! - [`CounterRecord`] - Per-resource counters
//! - [`OrderField`] - Counter column used for ranking
//! - [`StatsError`] - Operation error types
//!
//! # Example
//!
//! ```ignore
//! use download_counter_core::{Database, OrderField, StatisticsStore};
//!
//! let db = Database::new(Path::new("download_stats.db")).await?;
//! let store = StatisticsStore::new(db);
//!
//! store.record_download(42, 7).await;
//! let top = store.fetch_all(OrderField::TotalCount, 10).await?;
//! ```

mod error;
mod record;
mod repository;

pub use error::{StatsDbErrorKind, StatsError};
pub use record::{ANONYMOUS_USER_ID, CounterRecord, FilenameEntry, OrderField};
pub use repository::StatisticsRepository;

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::state::{self, DAY_TIMESTAMP_KEY};

/// Seconds that must elapse between two daily counter resets.
pub const DAY_RESET_INTERVAL_SECS: i64 = 86_400;

/// Upper bound on ids bound into a single `IN (...)` lookup.
const MAX_IDS_PER_QUERY: usize = 500;

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Authoritative persistence and aggregation for download counters.
#[derive(Debug, Clone)]
pub struct StatisticsStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl StatisticsStore {
    /// Creates a store using wall-clock time.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    /// Creates a store that reads request time from `clock`.
    #[must_use]
    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Returns the database this store writes to.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Counts one download of `resource_id` by `user_id`.
    ///
    /// Creates the counter row on first download, otherwise increments both
    /// counters and overwrites the last timestamp and user, all in one atomic
    /// upsert. Storage failures are logged and reported as `false`; they are
    /// never propagated because a download must not fail over bookkeeping.
    #[instrument(skip(self))]
    pub async fn record_download(&self, resource_id: i64, user_id: i64) -> bool {
        let now = self.clock.now();
        let result = sqlx::query(
            r"INSERT INTO download_counter
                (resource_id, total_count, day_count, last_timestamp, last_user_id)
              VALUES (?, 1, 1, ?, ?)
              ON CONFLICT(resource_id) DO UPDATE SET
                total_count = total_count + 1,
                day_count = day_count + 1,
                last_timestamp = excluded.last_timestamp,
                last_user_id = excluded.last_user_id",
        )
        .bind(resource_id)
        .bind(now)
        .bind(user_id)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                let kind = StatsDbErrorKind::from_sqlx(&err);
                warn!(resource_id, user_id, %kind, error = %err, "failed to record download");
                false
            }
        }
    }

    /// Looks up counters for many resources at once.
    ///
    /// Resources without a counter row are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the query fails.
    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    pub async fn fetch_downloads(&self, ids: &[i64]) -> Result<HashMap<i64, CounterRecord>> {
        let mut records = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "SELECT resource_id, total_count, day_count, last_timestamp, last_user_id
                 FROM download_counter WHERE resource_id IN (",
            );
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows = builder
                .build_query_as::<CounterRecord>()
                .fetch_all(self.db.pool())
                .await?;
            records.extend(rows.into_iter().map(|row| (row.resource_id, row)));
        }

        Ok(records)
    }

    /// Looks up counters for a single resource.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn fetch_download(&self, resource_id: i64) -> Result<Option<CounterRecord>> {
        let mut records = self.fetch_downloads(&[resource_id]).await?;
        Ok(records.remove(&resource_id))
    }

    /// Returns up to `limit` resource ids ranked by `order`, highest first.
    ///
    /// When ranking by [`OrderField::DayCount`], resources not downloaded since
    /// the last reset are left out. Order among equal values is unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, order: OrderField, limit: u32) -> Result<Vec<i64>> {
        let column = order.column();
        let filter = if order == OrderField::DayCount {
            "WHERE day_count > 0"
        } else {
            ""
        };
        let sql =
            format!("SELECT resource_id FROM download_counter {filter} ORDER BY {column} DESC LIMIT ?");

        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Deletes the counters of one resource.
    ///
    /// Returns whether a row was removed; a missing row is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_downloads(&self, resource_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM download_counter WHERE resource_id = ?")
            .bind(resource_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every counter row and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_all_downloads(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM download_counter")
            .execute(self.db.pool())
            .await?;

        info!(deleted = result.rows_affected(), "deleted all download counters");
        Ok(result.rows_affected())
    }

    /// Zeroes every daily counter when a full day has passed since the last reset.
    ///
    /// The elapsed-time check is repeated inside the write that claims the reset,
    /// so concurrent callers sweep at most once per window. Returns whether the
    /// sweep ran. Cheap to call on every request: the common no-op path is a
    /// single read.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if reading or writing fails.
    #[instrument(skip(self))]
    pub async fn reset_day_count(&self) -> Result<bool> {
        let now = self.clock.now();
        let last_reset = state::read_value(self.db.pool(), DAY_TIMESTAMP_KEY)
            .await?
            .unwrap_or(0);

        if now - last_reset < DAY_RESET_INTERVAL_SECS {
            debug!(now, last_reset, "daily reset not due");
            return Ok(false);
        }

        let mut tx = self.db.pool().begin().await?;

        let claimed = sqlx::query(
            r"INSERT INTO stats_state (name, value) VALUES (?, ?)
              ON CONFLICT(name) DO UPDATE SET value = excluded.value
              WHERE excluded.value - stats_state.value >= ?",
        )
        .bind(DAY_TIMESTAMP_KEY)
        .bind(now)
        .bind(DAY_RESET_INTERVAL_SECS)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(now, "daily reset already claimed by another caller");
            return Ok(false);
        }

        let zeroed = sqlx::query("UPDATE download_counter SET day_count = 0 WHERE day_count <> 0")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(now, zeroed = zeroed.rows_affected(), "reset daily download counters");
        Ok(true)
    }

    /// Returns the Unix time of the last daily reset, if one ever ran.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn last_day_reset(&self) -> Result<Option<i64>> {
        Ok(state::read_value(self.db.pool(), DAY_TIMESTAMP_KEY).await?)
    }

    /// Returns the highest lifetime count across all resources, 0 when empty.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn max_total_count(&self) -> Result<i64> {
        let (max,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(total_count), 0) FROM download_counter")
                .fetch_one(self.db.pool())
                .await?;

        Ok(max)
    }

    /// Returns ranked resources joined with their filename and last downloader.
    ///
    /// `field` names the ranking column (`total_count`, `day_count` or
    /// `last_timestamp`). Returns `Ok(None)` when it names none of them.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_filename_list(
        &self,
        field: &str,
        limit: u32,
    ) -> Result<Option<Vec<FilenameEntry>>> {
        let order = match field.parse::<OrderField>() {
            Ok(order) => order,
            Err(err) => {
                debug!(error = %err, "rejected filename list field");
                return Ok(None);
            }
        };

        self.filename_list(order, limit).await.map(Some)
    }

    /// Typed form of [`Self::get_filename_list`].
    ///
    /// Only resources with a nonzero value in `order` whose file is currently
    /// servable are listed. A last downloader without an account row gets an
    /// empty username.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn filename_list(&self, order: OrderField, limit: u32) -> Result<Vec<FilenameEntry>> {
        let column = order.column();
        let sql = format!(
            r"SELECT f.fid AS resource_id, f.filename, s.last_user_id AS user_id,
                     COALESCE(u.name, '') AS username
              FROM managed_file f
              INNER JOIN download_counter s ON f.fid = s.resource_id
              LEFT JOIN account u ON s.last_user_id = u.uid
              WHERE s.{column} <> 0 AND f.status = 1
              ORDER BY s.{column} DESC
              LIMIT ?"
        );

        let rows = sqlx::query_as::<_, FilenameEntry>(&sql)
            .bind(i64::from(limit))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows)
    }
}

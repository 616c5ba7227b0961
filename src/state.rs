//! Key-value store for scalar process-wide values.
//!
//! Holds values that live outside the counter table, such as the timestamp of
//! the last daily reset and the persisted feature flag.

use sqlx::{Executor, Sqlite};
use tracing::instrument;

use crate::db::Database;

/// State key holding the Unix time of the last daily counter reset.
pub const DAY_TIMESTAMP_KEY: &str = "download_statistics.day_timestamp";

/// State key holding the persisted "count downloads" flag (0 or 1).
pub const COUNT_DOWNLOADS_KEY: &str = "download_statistics.count_downloads";

/// Persisted scalar values keyed by name.
#[derive(Debug, Clone)]
pub struct StateStore {
    db: Database,
}

impl StateStore {
    /// Creates a state store over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Reads a value, `None` when the key was never written.
    ///
    /// # Errors
    ///
    /// Returns [`sqlx::Error`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> Result<Option<i64>, sqlx::Error> {
        read_value(self.db.pool(), name).await
    }

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`sqlx::Error`] if the write fails.
    #[instrument(skip(self))]
    pub async fn set(&self, name: &str, value: i64) -> Result<(), sqlx::Error> {
        write_value(self.db.pool(), name, value).await
    }

    /// Removes a value. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`sqlx::Error`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM stats_state WHERE name = ?")
            .bind(name)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

pub(crate) async fn read_value<'e, E>(executor: E, name: &str) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as("SELECT value FROM stats_state WHERE name = ?")
        .bind(name)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|(value,)| value))
}

pub(crate) async fn write_value<'e, E>(executor: E, name: &str, value: i64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"INSERT INTO stats_state (name, value) VALUES (?, ?)
          ON CONFLICT(name) DO UPDATE SET value = excluded.value",
    )
    .bind(name)
    .bind(value)
    .execute(executor)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_missing_key_is_none() {
        let state = StateStore::new(Database::new_in_memory().await.unwrap());
        assert_eq!(state.get(DAY_TIMESTAMP_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_state_set_overwrites_previous_value() {
        let state = StateStore::new(Database::new_in_memory().await.unwrap());

        state.set(DAY_TIMESTAMP_KEY, 10).await.unwrap();
        state.set(DAY_TIMESTAMP_KEY, 20).await.unwrap();

        assert_eq!(state.get(DAY_TIMESTAMP_KEY).await.unwrap(), Some(20));
    }

    #[tokio::test]
    async fn test_state_delete_missing_key_is_ok() {
        let state = StateStore::new(Database::new_in_memory().await.unwrap());
        state.delete("never.written").await.unwrap();

        state.set(COUNT_DOWNLOADS_KEY, 1).await.unwrap();
        state.delete(COUNT_DOWNLOADS_KEY).await.unwrap();
        assert_eq!(state.get(COUNT_DOWNLOADS_KEY).await.unwrap(), None);
    }

    #[test]
    fn test_state_keys_have_no_surrounding_whitespace() {
        assert_eq!(DAY_TIMESTAMP_KEY, DAY_TIMESTAMP_KEY.trim());
        assert_eq!(COUNT_DOWNLOADS_KEY, COUNT_DOWNLOADS_KEY.trim());
    }
}

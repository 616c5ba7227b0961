//! Resource metadata and user identity.
//!
//! Ranked filename listings join counters with the files they belong to and
//! the users who last downloaded them. The catalog owns those two tables.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{info, instrument};

use crate::db::Database;
use crate::stats::Result;

/// Whether a file is currently servable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Uploaded but not yet attached; not servable and not listed.
    Temporary,
    /// Attached and servable.
    Permanent,
}

impl FileStatus {
    /// Returns the database integer representation.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Temporary => 0,
            Self::Permanent => 1,
        }
    }

    /// Parses the database integer representation; unknown values are temporary.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            Self::Permanent
        } else {
            Self::Temporary
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Temporary => "temporary",
            Self::Permanent => "permanent",
        };
        write!(f, "{label}")
    }
}

/// A downloadable file known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ManagedFile {
    /// File id, also the counter resource id.
    pub fid: i64,
    /// Display name.
    pub filename: String,
    /// Stream URI such as `private://reports/q1.pdf`.
    pub uri: String,
    /// Stored status (parsed via `status()`).
    #[sqlx(rename = "status")]
    #[serde(rename = "status")]
    pub status_raw: i64,
}

impl ManagedFile {
    /// Creates a permanent file entry.
    #[must_use]
    pub fn new(fid: i64, filename: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            fid,
            filename: filename.into(),
            uri: uri.into(),
            status_raw: FileStatus::Permanent.as_i64(),
        }
    }

    /// Returns the parsed status.
    #[must_use]
    pub fn status(&self) -> FileStatus {
        FileStatus::from_i64(self.status_raw)
    }

    /// Returns a copy with the given status.
    #[must_use]
    pub fn with_status(mut self, status: FileStatus) -> Self {
        self.status_raw = status.as_i64();
        self
    }

    /// Whether this file may currently be served.
    #[must_use]
    pub fn is_servable(&self) -> bool {
        self.status() == FileStatus::Permanent
    }
}

/// Catalog of files and accounts.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    /// Creates a catalog over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts or replaces a file entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if the write fails.
    #[instrument(skip(self), fields(fid = file.fid))]
    pub async fn register_file(&self, file: &ManagedFile) -> Result<()> {
        sqlx::query(
            r"INSERT INTO managed_file (fid, filename, uri, status) VALUES (?, ?, ?, ?)
              ON CONFLICT(fid) DO UPDATE SET
                filename = excluded.filename,
                uri = excluded.uri,
                status = excluded.status",
        )
        .bind(file.fid)
        .bind(&file.filename)
        .bind(&file.uri)
        .bind(file.status_raw)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Changes a file's status. Returns whether the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if the update fails.
    #[instrument(skip(self))]
    pub async fn set_file_status(&self, fid: i64, status: FileStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE managed_file SET status = ? WHERE fid = ?")
            .bind(status.as_i64())
            .bind(fid)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Looks up a file entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_file(&self, fid: i64) -> Result<Option<ManagedFile>> {
        let file = sqlx::query_as::<_, ManagedFile>(
            "SELECT fid, filename, uri, status FROM managed_file WHERE fid = ?",
        )
        .bind(fid)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(file)
    }

    /// Removes a file together with its download counters.
    ///
    /// Returns whether the file existed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if the transaction fails.
    #[instrument(skip(self))]
    pub async fn remove_file(&self, fid: i64) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        let removed = sqlx::query("DELETE FROM managed_file WHERE fid = ?")
            .bind(fid)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM download_counter WHERE resource_id = ?")
            .bind(fid)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let existed = removed.rows_affected() > 0;
        if existed {
            info!(fid, "removed file and its download counters");
        }
        Ok(existed)
    }

    /// Inserts or renames an account.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if the write fails.
    #[instrument(skip(self))]
    pub async fn register_account(&self, uid: i64, name: &str) -> Result<()> {
        sqlx::query(
            r"INSERT INTO account (uid, name) VALUES (?, ?)
              ON CONFLICT(uid) DO UPDATE SET name = excluded.name",
        )
        .bind(uid)
        .bind(name)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Returns an account's name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if the query fails.
    #[instrument(skip(self))]
    pub async fn account_name(&self, uid: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM account WHERE uid = ?")
            .bind(uid)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|(name,)| name))
    }
}

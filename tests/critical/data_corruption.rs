//! Phase 1 (P0): corrupted database files.
//! Opening garbage must fail with a `DbError`, never panic.

use download_counter_core::{Database, DbError};
use tempfile::TempDir;

use crate::support::corrupted_database;

#[tokio::test]
async fn p0_corrupted_database_open_fails() {
    let temp_dir = TempDir::new().expect("temp dir");
    let path = corrupted_database(&temp_dir);

    let result = Database::new(path.as_path()).await;

    assert!(result.is_err(), "opening corrupted DB should fail");
    let err = result.unwrap_err();
    assert!(
        matches!(&err, DbError::Connection(_) | DbError::Migration(_)),
        "expected DbError::Connection or DbError::Migration, got {err:?}"
    );
}

#[tokio::test]
async fn p0_negative_counters_rejected_by_schema() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db = Database::new(&temp_dir.path().join("check.db"))
        .await
        .expect("create db");

    let result = sqlx::query(
        "INSERT INTO download_counter
            (resource_id, total_count, day_count, last_timestamp, last_user_id)
         VALUES (1, -1, 0, 0, 0)",
    )
    .execute(db.pool())
    .await;

    assert!(result.is_err(), "negative counts violate the CHECK constraint");
}

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use download_counter_core::{Database, ManualClock, StatisticsStore};
use tempfile::TempDir;

/// Unix time used as "now" by tests that drive a manual clock.
pub const START: i64 = 1_700_000_000;

/// Creates a file-backed database with migrations applied.
///
/// The returned `TempDir` must stay alive for the database path to remain valid.
pub async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("stats.db");

    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");

    (db, temp_dir)
}

/// Creates a store over a fresh file-backed database with a manual clock at [`START`].
pub async fn setup_store() -> (StatisticsStore, ManualClock, TempDir) {
    let (db, temp_dir) = setup_test_db().await;
    let clock = ManualClock::new(START);
    let store = StatisticsStore::with_clock(db, Arc::new(clock.clone()));
    (store, clock, temp_dir)
}

/// Writes a SQLite file with garbage content.
pub fn corrupted_database(temp_dir: &TempDir) -> std::path::PathBuf {
    let db_path = temp_dir.path().join("corrupted.db");
    std::fs::write(&db_path, b"not a valid sqlite file\x00\x00\x00")
        .expect("Failed to write corrupted db file");
    db_path
}

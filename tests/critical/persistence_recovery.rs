//! Phase 1 (P0): reopen the database after a normal close.
//! Counters, the last reset time and the counting flag must survive.

use download_counter_core::{
    Database, Settings, SettingsService, StateStore, StatisticsStore,
};
use tempfile::TempDir;

#[tokio::test]
async fn p0_counters_persist_after_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("persist.db");

    {
        let db = Database::new(&db_path).await.expect("create db");
        let store = StatisticsStore::new(db.clone());
        assert!(store.record_download(5, 2).await);
        assert!(store.record_download(5, 3).await);
        store.reset_day_count().await.expect("reset");
        db.close().await;
    }

    let db = Database::new(&db_path).await.expect("reopen db");
    let store = StatisticsStore::new(db);
    let record = store
        .fetch_download(5)
        .await
        .expect("fetch")
        .expect("row still there");
    assert_eq!(record.total_count, 2);
    assert_eq!(record.last_user_id, 3);
    assert!(store.last_day_reset().await.expect("read").is_some());
}

#[tokio::test]
async fn p0_counting_flag_persists_after_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("flag.db");

    {
        let db = Database::new(&db_path).await.expect("create db");
        let settings = SettingsService::load(StateStore::new(db.clone()), Settings::default())
            .await
            .expect("load");
        assert!(!settings.is_counting_enabled());
        settings
            .update(Settings {
                count_downloads: true,
            })
            .await
            .expect("update");
        db.close().await;
    }

    let db = Database::new(&db_path).await.expect("reopen db");
    let settings = SettingsService::load(StateStore::new(db), Settings::default())
        .await
        .expect("reload");
    assert!(settings.is_counting_enabled(), "saved flag beats the default");
}

#[tokio::test]
async fn p0_wal_mode_after_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("wal.db");

    let db = Database::new(&db_path).await.expect("create db");
    let wal1 = db.is_wal_enabled().await.expect("pragma");
    drop(db);

    let db = Database::new(&db_path).await.expect("reopen db");
    let wal2 = db.is_wal_enabled().await.expect("pragma");
    assert!(wal1 && wal2, "WAL should remain enabled after reopen");
}

//! Phase 1 (P0): concurrent downloads and concurrent reset callers.
//! Many tasks share one file-backed pool; no increment may be lost and the
//! daily sweep may run only once per window.

use std::sync::Arc;

use download_counter_core::{DAY_RESET_INTERVAL_SECS, ManualClock, OrderField, StatisticsStore};
use tokio::task::JoinSet;

use crate::support::{START, setup_store, setup_test_db};

#[tokio::test]
async fn p0_concurrent_downloads_lose_no_increment() {
    let (store, _clock, _temp_dir) = setup_store().await;
    let downloads = 64;

    let mut tasks = JoinSet::new();
    for user in 0..downloads {
        let store = store.clone();
        tasks.spawn(async move { store.record_download(42, user).await });
    }

    let mut recorded = 0;
    while let Some(result) = tasks.join_next().await {
        if result.expect("task panicked") {
            recorded += 1;
        }
    }
    assert_eq!(recorded, downloads, "every download should be recorded");

    let record = store
        .fetch_download(42)
        .await
        .expect("fetch")
        .expect("counter row exists");
    assert_eq!(record.total_count, downloads);
    assert_eq!(record.day_count, downloads);
}

#[tokio::test]
async fn p0_concurrent_downloads_across_resources() {
    let (store, _clock, _temp_dir) = setup_store().await;

    let mut tasks = JoinSet::new();
    for resource in 1..=4_i64 {
        for _ in 0..resource * 5 {
            let store = store.clone();
            tasks.spawn(async move { store.record_download(resource, 0).await });
        }
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.expect("task panicked"));
    }

    let ranked = store
        .fetch_all(OrderField::TotalCount, 10)
        .await
        .expect("rank");
    assert_eq!(ranked, vec![4, 3, 2, 1]);
    assert_eq!(store.max_total_count().await.expect("max"), 20);
}

#[tokio::test]
async fn p0_concurrent_reset_callers_sweep_once() {
    let (db, _temp_dir) = setup_test_db().await;
    let clock = ManualClock::new(START);

    // Independent store handles over one database, as separate workers would hold.
    let stores: Vec<StatisticsStore> = (0..8)
        .map(|_| StatisticsStore::with_clock(db.clone(), Arc::new(clock.clone())))
        .collect();

    assert!(stores[0].reset_day_count().await.expect("initial reset"));
    stores[0].record_download(1, 0).await;
    clock.advance(DAY_RESET_INTERVAL_SECS);

    let mut tasks = JoinSet::new();
    for store in stores.clone() {
        tasks.spawn(async move { store.reset_day_count().await });
    }

    let mut sweeps = 0;
    while let Some(result) = tasks.join_next().await {
        if result.expect("task panicked").expect("reset") {
            sweeps += 1;
        }
    }
    assert_eq!(sweeps, 1, "exactly one caller should claim the window");

    let record = stores[0]
        .fetch_download(1)
        .await
        .expect("fetch")
        .expect("row kept");
    assert_eq!(record.day_count, 0);
    assert_eq!(record.total_count, 1);
}

#[tokio::test]
async fn p0_downloads_racing_a_reset_keep_totals() {
    let (store, clock, _temp_dir) = setup_store().await;
    store.reset_day_count().await.expect("initial reset");
    clock.advance(DAY_RESET_INTERVAL_SECS);

    let mut tasks = JoinSet::new();
    for _ in 0..20 {
        let store = store.clone();
        tasks.spawn(async move {
            assert!(store.record_download(7, 0).await);
        });
    }
    let resetter = store.clone();
    tasks.spawn(async move {
        resetter.reset_day_count().await.expect("reset");
    });
    while let Some(result) = tasks.join_next().await {
        result.expect("task panicked");
    }

    let record = store
        .fetch_download(7)
        .await
        .expect("fetch")
        .expect("row exists");
    assert_eq!(record.total_count, 20);
    assert!(record.day_count <= 20);
}

//! Comment pre-load integration tests
//!
//! The pre-load stage runs comment fetches concurrently under a fixed
//! in-flight cap, skips failed and ineligible items, and never fails
//! the pass as a whole.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use gh_triage::config::Config;
use gh_triage::db::{self, comments, notifications};
use gh_triage::sync::{preload_comments, sync};
use helpers::{remote_comment, remote_other, remote_pr, StubApi};

/// Cache notifications without touching comments_loaded
async fn seed_cache(pool: &sqlx::SqlitePool, api: &StubApi, count: usize) {
    api.set_notifications(
        (0..count)
            .map(|i| remote_pr(&i.to_string(), "mention", "2026-02-09T07:00:00Z"))
            .collect(),
    );
    let config = Config { preload_count: 0, ..Config::default() };
    sync(pool, api, &config, None).await.unwrap();
}

#[tokio::test]
async fn in_flight_fetches_never_exceed_the_concurrency_cap() {
    let pool = db::open_memory_db().await.unwrap();
    let api = Arc::new(StubApi::new());
    seed_cache(&pool, &api, 20).await;
    // A per-call delay widens the window in which the cap could be
    // violated if the semaphore were missing.
    *api.comment_delay.lock().unwrap() = Some(Duration::from_millis(20));

    let loaded = preload_comments(&pool, api.as_ref(), 20, 5).await.unwrap();
    assert_eq!(loaded.len(), 20);
    assert_eq!(api.comment_calls.load(Ordering::SeqCst), 20);

    let peak = api.max_comments_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 5, "peak in-flight was {peak}");
}

#[tokio::test]
async fn failed_items_are_skipped_and_the_rest_load() {
    let pool = db::open_memory_db().await.unwrap();
    let api = Arc::new(StubApi::new());
    seed_cache(&pool, &api, 3).await;
    api.set_comments(vec![remote_comment("c1", "alice", "hello")]);
    api.failing_comment_urls.lock().unwrap().insert(
        "https://api.github.com/repos/NixOS/nixpkgs/issues/1/comments".to_string(),
    );

    let mut loaded = preload_comments(&pool, api.as_ref(), 10, 5).await.unwrap();
    loaded.sort();
    assert_eq!(loaded, vec!["0".to_string(), "2".to_string()]);

    // The failed item keeps its unloaded flag for a later retry
    assert!(!notifications::get_notification(&pool, "1").await.unwrap().unwrap().comments_loaded);
    assert!(comments::get_comments(&pool, "1").await.unwrap().is_empty());
}

#[tokio::test]
async fn subjects_without_a_comments_endpoint_are_not_fetched() {
    let pool = db::open_memory_db().await.unwrap();
    let api = Arc::new(StubApi::new());
    api.set_notifications(vec![
        remote_pr("1", "mention", "2026-02-09T07:00:00Z"),
        remote_other("2", "2026-02-09T07:00:00Z"),
    ]);
    let config = Config { preload_count: 0, ..Config::default() };
    sync(&pool, api.as_ref(), &config, None).await.unwrap();

    let loaded = preload_comments(&pool, api.as_ref(), 10, 5).await.unwrap();
    assert_eq!(loaded, vec!["1".to_string()]);
    assert_eq!(api.comment_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn already_loaded_items_are_not_refetched() {
    let pool = db::open_memory_db().await.unwrap();
    let api = Arc::new(StubApi::new());
    seed_cache(&pool, &api, 4).await;

    let first = preload_comments(&pool, api.as_ref(), 10, 5).await.unwrap();
    assert_eq!(first.len(), 4);

    let second = preload_comments(&pool, api.as_ref(), 10, 5).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(api.comment_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn preload_is_limited_to_the_top_n_by_priority() {
    let pool = db::open_memory_db().await.unwrap();
    let api = Arc::new(StubApi::new());
    api.set_notifications(vec![
        remote_pr("high", "review_requested", "2026-02-09T07:00:00Z"),
        remote_pr("low", "subscribed", "2026-02-09T07:00:00Z"),
    ]);
    let config = Config { preload_count: 0, ..Config::default() };
    sync(&pool, api.as_ref(), &config, None).await.unwrap();

    let loaded = preload_comments(&pool, api.as_ref(), 1, 5).await.unwrap();
    assert_eq!(loaded, vec!["high".to_string()]);
    assert!(!notifications::get_notification(&pool, "low").await.unwrap().unwrap().comments_loaded);
}

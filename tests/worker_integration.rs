//! Worker task integration tests
//!
//! The worker owns all cache writes and network calls; the front end
//! talks to it over channels. These tests check strict request
//! ordering, partial mark-done failure, and the error envelope.

mod helpers;

use std::sync::Arc;

use gh_triage::config::Config;
use gh_triage::db::{self, comments, notifications, pr};
use gh_triage::messages::{Request, Response};
use gh_triage::sync::sync;
use gh_triage::worker::Worker;
use helpers::{remote_comment, remote_pr, StubApi};

async fn seeded_worker(
    api: Arc<StubApi>,
    ids: &[&str],
) -> (sqlx::SqlitePool, gh_triage::worker::WorkerHandle, tokio::task::JoinHandle<()>) {
    let pool = db::open_memory_db().await.unwrap();
    api.set_notifications(
        ids.iter()
            .map(|id| remote_pr(id, "review_requested", "2026-02-09T07:00:00Z"))
            .collect(),
    );
    sync(&pool, api.as_ref(), &Config::default(), None).await.unwrap();

    let (handle, join) = Worker::spawn(pool.clone(), api, Config::default());
    (pool, handle, join)
}

#[tokio::test]
async fn responses_arrive_in_request_order() {
    let api = Arc::new(StubApi::new());
    let (_pool, mut handle, join) = seeded_worker(api, &["1", "2"]).await;

    handle.submit(Request::MarkDone { notification_ids: vec!["1".to_string()] }).unwrap();
    handle.submit(Request::FetchComments { notification_id: "2".to_string() }).unwrap();
    handle.submit(Request::PreloadComments { top_n: 5 }).unwrap();

    assert!(matches!(handle.recv().await, Some(Response::MarkDone { .. })));
    assert!(matches!(handle.recv().await, Some(Response::FetchComments { .. })));
    assert!(matches!(handle.recv().await, Some(Response::PreloadComplete { .. })));

    handle.shutdown();
    join.await.unwrap();
}

#[tokio::test]
async fn mark_done_collects_per_id_failures() {
    let api = Arc::new(StubApi::new());
    api.fail_mark_for("2");
    let (pool, mut handle, join) = seeded_worker(api, &["1", "2", "3"]).await;

    handle
        .submit(Request::MarkDone {
            notification_ids: vec!["1".to_string(), "2".to_string(), "3".to_string()],
        })
        .unwrap();

    let Some(Response::MarkDone { notification_ids, errors }) = handle.recv().await else {
        panic!("expected a MarkDone response");
    };
    assert_eq!(notification_ids, vec!["1".to_string(), "3".to_string()]);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("2:"));

    // The failed item stays cached; the succeeded ones are gone
    assert!(notifications::get_notification(&pool, "2").await.unwrap().is_some());
    assert!(notifications::get_notification(&pool, "1").await.unwrap().is_none());
    assert!(notifications::get_notification(&pool, "3").await.unwrap().is_none());

    handle.shutdown();
    join.await.unwrap();
}

#[tokio::test]
async fn fetch_comments_caches_and_flags_the_notification() {
    let api = Arc::new(StubApi::new());
    let (pool, mut handle, join) = seeded_worker(api.clone(), &["1"]).await;

    // Invalidate the sync-time pre-load, then fetch on demand
    sqlx::query("UPDATE notifications SET comments_loaded = 0")
        .execute(&pool)
        .await
        .unwrap();
    api.set_comments(vec![
        remote_comment("c1", "alice", "first"),
        remote_comment("c2", "bob", "second"),
    ]);

    handle.submit(Request::FetchComments { notification_id: "1".to_string() }).unwrap();
    let Some(Response::FetchComments { notification_id, comment_count }) = handle.recv().await
    else {
        panic!("expected a FetchComments response");
    };
    assert_eq!(notification_id, "1");
    assert_eq!(comment_count, 2);

    let cached = comments::get_comments(&pool, "1").await.unwrap();
    assert_eq!(cached.len(), 2);
    assert!(notifications::get_notification(&pool, "1").await.unwrap().unwrap().comments_loaded);

    handle.shutdown();
    join.await.unwrap();
}

#[tokio::test]
async fn fetch_pr_detail_replaces_all_cached_pr_data() {
    let api = Arc::new(StubApi::new());
    let (pool, mut handle, join) = seeded_worker(api, &["42"]).await;

    handle.submit(Request::FetchPrDetail { notification_id: "42".to_string() }).unwrap();
    assert!(matches!(handle.recv().await, Some(Response::FetchPrDetail { .. })));

    let details = pr::get_pr_details(&pool, "42").await.unwrap().unwrap();
    assert_eq!(details.pr_number, 42);
    assert_eq!(details.author, "jtojnar");

    let reviews = pr::get_pr_reviews(&pool, "42").await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].state, "CHANGES_REQUESTED");

    let threads = pr::get_review_threads(&pool, "42").await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].thread_id.as_deref(), Some("t1"));

    let files = pr::get_pr_files(&pool, "42").await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "pkgs/default.nix");

    handle.shutdown();
    join.await.unwrap();
}

#[tokio::test]
async fn failures_surface_as_error_responses_and_the_worker_continues() {
    let api = Arc::new(StubApi::new());
    let (_pool, mut handle, join) = seeded_worker(api, &["1"]).await;

    // No such notification, so the PR detail fetch cannot resolve a PR
    handle.submit(Request::FetchPrDetail { notification_id: "missing".to_string() }).unwrap();
    handle.submit(Request::MarkDone { notification_ids: vec!["1".to_string()] }).unwrap();

    let Some(Response::Error { request, .. }) = handle.recv().await else {
        panic!("expected an Error response");
    };
    assert_eq!(request, "fetch-pr-detail");

    // The worker is still serving requests afterwards
    assert!(matches!(handle.recv().await, Some(Response::MarkDone { .. })));

    handle.shutdown();
    join.await.unwrap();
}

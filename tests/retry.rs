//! Transient-fault query executor tests.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};

use common::*;
use soundpay::db::retry::{classify_transient, with_retry, TransientKind};
use soundpay::error::AppError;

fn busy_error() -> AppError {
    AppError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".to_string()),
    ))
}

#[tokio::test]
async fn test_transient_failure_makes_exactly_max_retries_plus_one_attempts() {
    let app = setup_test_app("retry_bounded");
    let attempts = AtomicU32::new(0);

    let max_retries = 2;
    let result: Result<(), _> = with_retry(&app.state.db, max_retries, |_conn| {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(busy_error())
    })
    .await;

    // Fails with the classified error after max_retries + 1 attempts, not
    // an unbounded loop.
    assert_eq!(attempts.load(Ordering::SeqCst), max_retries + 1);
    let err = result.expect_err("should exhaust retries");
    assert_eq!(classify_transient(&err), Some(TransientKind::Busy));
}

#[tokio::test]
async fn test_success_after_transient_failures() {
    let app = setup_test_app("retry_recovers");
    let attempts = AtomicU32::new(0);

    let result = with_retry(&app.state.db, 3, |_conn| {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            Err(busy_error())
        } else {
            Ok(n)
        }
    })
    .await;

    assert_eq!(result.expect("should eventually succeed"), 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let app = setup_test_app("retry_permanent");
    let attempts = AtomicU32::new(0);

    let result: Result<(), _> = with_retry(&app.state.db, 5, |_conn| {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::BadRequest("validation failed".to_string()))
    })
    .await;

    // A non-transient error propagates immediately.
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_constraint_violation_is_not_retried() {
    let app = setup_test_app("retry_constraint");
    let attempts = AtomicU32::new(0);

    let result: Result<(), _> = with_retry(&app.state.db, 5, |_conn| {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed: webhook_events".to_string()),
        )))
    })
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_zero_retries_means_single_attempt() {
    let app = setup_test_app("retry_zero");
    let attempts = AtomicU32::new(0);

    let result: Result<(), _> = with_retry(&app.state.db, 0, |_conn| {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(busy_error())
    })
    .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_real_queries_run_through_the_executor() {
    let app = setup_test_app("retry_real_queries");
    {
        let conn = app.state.db.get().unwrap();
        create_test_album(&conn);
    }

    let album = with_retry(&app.state.db, 3, |conn| {
        queries::get_album_by_id(conn, TEST_ALBUM_ID)
    })
    .await
    .expect("query failed")
    .expect("album should exist");

    assert_eq!(album.title, "Night Drive");
}

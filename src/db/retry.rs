//! Transient-fault query executor.
//!
//! Wraps database operations with bounded retry and linear backoff for the
//! closed set of failures that are worth retrying. With the connection pool
//! being effectively a single writer, retrying on saturation is what lets a
//! concurrent webhook delivery and a status poll serialize instead of one of
//! them failing outright.
//!
//! Callers must keep their statements idempotent (`ON CONFLICT`,
//! `INSERT OR IGNORE`, compare-and-swap updates) so that at-least-once
//! execution is safe.

use std::time::Duration;

use rusqlite::Connection;

use crate::db::DbPool;
use crate::error::{AppError, Result};

/// Default retry budget for request handlers.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Linear backoff base; attempt n sleeps `BACKOFF_BASE * n`.
const BACKOFF_BASE: Duration = Duration::from_millis(250);

/// The closed set of transient failure kinds. Anything not classified here
/// propagates immediately without retry (constraint violations in
/// particular must surface to their caller - they carry meaning).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// The bounded pool had no free connection.
    PoolSaturated,
    /// SQLite reported the database busy or locked by another writer.
    Busy,
    /// The database file could not be opened.
    ConnectFailed,
}

impl TransientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoolSaturated => "pool_saturated",
            Self::Busy => "busy",
            Self::ConnectFailed => "connect_failed",
        }
    }
}

/// Classify an error as transient, by variant - never by message text.
pub fn classify_transient(err: &AppError) -> Option<TransientKind> {
    match err {
        AppError::Pool(_) => Some(TransientKind::PoolSaturated),
        AppError::Database(rusqlite::Error::SqliteFailure(e, _)) => match e.code {
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                Some(TransientKind::Busy)
            }
            rusqlite::ErrorCode::CannotOpen => Some(TransientKind::ConnectFailed),
            _ => None,
        },
        _ => None,
    }
}

/// Run `op` against a pooled connection, retrying classified transient
/// failures up to `max_retries` times with linear backoff.
///
/// The pool checkout happens inside the loop, so pool saturation itself is
/// retried. After exhaustion the last classified error is returned; the
/// caller decides whether that is fatal to the surrounding request.
pub async fn with_retry<T, F>(pool: &DbPool, max_retries: u32, op: F) -> Result<T>
where
    F: Fn(&Connection) -> Result<T>,
{
    let mut attempt: u32 = 0;
    loop {
        let result = pool
            .get()
            .map_err(AppError::from)
            .and_then(|conn| op(&conn));

        match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!("Query succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(err) => match classify_transient(&err) {
                Some(kind) if attempt < max_retries => {
                    attempt += 1;
                    let delay = BACKOFF_BASE * attempt;
                    tracing::warn!(
                        "Transient {} error, retrying in {:?} (attempt {}/{})",
                        kind.as_str(),
                        delay,
                        attempt,
                        max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_error() -> AppError {
        AppError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        ))
    }

    #[test]
    fn test_classify_busy_as_transient() {
        assert_eq!(classify_transient(&busy_error()), Some(TransientKind::Busy));
    }

    #[test]
    fn test_classify_constraint_violation_as_permanent() {
        let err = AppError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed".to_string()),
        ));
        assert_eq!(classify_transient(&err), None);
    }

    #[test]
    fn test_classify_validation_errors_as_permanent() {
        assert_eq!(classify_transient(&AppError::AlreadyPaid), None);
        assert_eq!(
            classify_transient(&AppError::BadRequest("nope".into())),
            None
        );
    }
}

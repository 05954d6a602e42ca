use futures::future::BoxFuture;
use sea_orm::ConnectionTrait;
use tracing::warn;

use crate::errors::ServiceError;

/// How often a compare-and-swap cycle re-reads and retries before the
/// conflict is surfaced to the caller.
pub const MAX_CAS_ATTEMPTS: u32 = 3;

/// Outcome of a single compare-and-swap attempt.
pub enum CasOutcome<T> {
    /// The versioned update matched and wrote; carries the new state.
    Applied(T),
    /// Another writer bumped the version first; re-read and try again.
    Conflict,
}

/// Runs a read-validate-write cycle up to [`MAX_CAS_ATTEMPTS`] times.
///
/// The closure must do a fresh read on every call and report
/// [`CasOutcome::Conflict`] when its versioned update affected no rows.
/// Validation failures inside the closure (insufficient stock, broken
/// invariant) abort immediately; only version races are retried. Exhausting
/// the attempts surfaces as [`ServiceError::ConcurrentModification`], which
/// the caller may safely resubmit.
pub async fn run_with_cas_retries<'c, C, T, F>(
    conn: &'c C,
    operation: &str,
    attempt: F,
) -> Result<T, ServiceError>
where
    C: ConnectionTrait,
    F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<CasOutcome<T>, ServiceError>>,
{
    for round in 1..=MAX_CAS_ATTEMPTS {
        match attempt(conn).await? {
            CasOutcome::Applied(value) => return Ok(value),
            CasOutcome::Conflict => {
                warn!(
                    operation = operation,
                    attempt = round,
                    "optimistic update lost the version race"
                );
            }
        }
    }

    Err(ServiceError::ConcurrentModification(format!(
        "{} still conflicting after {} attempts",
        operation, MAX_CAS_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn mem_conn() -> sea_orm::DatabaseConnection {
        Database::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn returns_value_on_first_success() {
        let conn = mem_conn().await;
        let calls = AtomicU32::new(0);

        let result = run_with_cas_retries(&conn, "test.op", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(CasOutcome::Applied(7)) })
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_conflicts_then_succeeds() {
        let conn = mem_conn().await;
        let calls = AtomicU32::new(0);

        let result = run_with_cas_retries(&conn, "test.op", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n < 2 {
                    Ok(CasOutcome::Conflict)
                } else {
                    Ok(CasOutcome::Applied("done"))
                }
            })
        })
        .await
        .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_attempts_is_transient() {
        let conn = mem_conn().await;
        let calls = AtomicU32::new(0);

        let err = run_with_cas_retries::<_, (), _>(&conn, "stock.reserve", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(CasOutcome::Conflict) })
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), MAX_CAS_ATTEMPTS);
        assert!(err.is_transient());
        assert!(matches!(err, ServiceError::ConcurrentModification(_)));
    }

    #[tokio::test]
    async fn hard_failures_abort_without_retrying() {
        let conn = mem_conn().await;
        let calls = AtomicU32::new(0);

        let err = run_with_cas_retries::<_, (), _>(&conn, "stock.consume", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Err(ServiceError::InsufficientStock(
                    "available=0, required=1".into(),
                ))
            })
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ServiceError::InsufficientStock(_)));
    }
}

//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every dependency call with a deadline
//! - Turn an elapsed deadline into a retryable `StoreError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - A zero deadline disables enforcement

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Run `fut` under `limit`, mapping expiry to `StoreError::Timeout`.
pub async fn with_store_timeout<T, F>(
    dependency: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    if limit.is_zero() {
        return fut.await;
    }

    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                dependency = dependency,
                timeout_ms = limit.as_millis() as u64,
                "Dependency call timed out"
            );
            Err(StoreError::Timeout {
                dependency,
                elapsed_ms: limit.as_millis() as u64,
            })
        }
    }
}

/// Run `fut` under `limit`, returning `None` on expiry.
pub async fn enforce<T, F>(limit: Duration, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    if limit.is_zero() {
        return Some(fut.await);
    }
    tokio::time::timeout(limit, fut).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let result: Result<(), StoreError> =
            with_store_timeout("kv", Duration::from_millis(50), async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert_eq!(
            result,
            Err(StoreError::Timeout {
                dependency: "kv",
                elapsed_ms: 50
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fast_call_passes_through() {
        let result = with_store_timeout("kv", Duration::from_millis(50), async {
            Ok::<_, StoreError>(7)
        })
        .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_disables_deadline() {
        let value = enforce(Duration::ZERO, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            1
        })
        .await;
        assert_eq!(value, Some(1));
    }
}

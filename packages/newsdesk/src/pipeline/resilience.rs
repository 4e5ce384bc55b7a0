//! Timeout and single retry around external capability calls.

use std::future::Future;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::error::{CapabilityError, CapabilityResult};
use crate::types::config::ResilienceConfig;

/// Run `call` under the configured timeout, retrying once after a backoff.
///
/// Both timeouts and capability errors are retried. The second failure is
/// returned to the caller, which applies its stage's degradation.
pub async fn call_with_retry<T, F, Fut>(
    policy: &ResilienceConfig,
    operation: &'static str,
    mut call: F,
) -> CapabilityResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CapabilityResult<T>>,
{
    match attempt(policy, operation, &mut call).await {
        Ok(value) => Ok(value),
        Err(first) => {
            warn!(operation, error = %first, "Capability call failed, retrying once");
            sleep(policy.retry_backoff()).await;
            attempt(policy, operation, &mut call).await
        }
    }
}

async fn attempt<T, F, Fut>(
    policy: &ResilienceConfig,
    operation: &'static str,
    call: &mut F,
) -> CapabilityResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CapabilityResult<T>>,
{
    match timeout(policy.call_timeout(), call()).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout {
            operation,
            timeout_ms: policy.call_timeout_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn policy() -> ResilienceConfig {
        ResilienceConfig {
            call_timeout_ms: 100,
            retry_backoff_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_success_needs_one_call() {
        let calls = &AtomicUsize::new(0);
        let result = call_with_retry(&policy(), "op", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, CapabilityError>(7)
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_once_after_error() {
        let calls = &AtomicUsize::new(0);
        let result = call_with_retry(&policy(), "op", move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(CapabilityError::unavailable("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_failure() {
        let calls = &AtomicUsize::new(0);
        let result: CapabilityResult<()> = call_with_retry(&policy(), "op", move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::unavailable("down")) }
        })
        .await;

        assert_eq!(result, Err(CapabilityError::unavailable("down")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let result: CapabilityResult<()> = call_with_retry(&policy(), "embed", || async {
            sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result,
            Err(CapabilityError::Timeout {
                operation: "embed",
                timeout_ms: 100
            })
        );
    }
}

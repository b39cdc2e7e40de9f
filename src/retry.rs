//! Bounded fixed-interval polling.
//!
//! One combinator for every "probe until it works" need in the pipeline.
//! Deliberately simple: a fixed attempt budget with a fixed sleep between
//! attempts, no backoff, no jitter.

use std::future::Future;
use std::time::Duration;

/// Attempt budget and spacing for [`poll_until`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

/// Result of a single poll attempt.
pub enum Attempt<T> {
    Ready(T),
    Pending,
}

/// Run `op` up to `policy.max_attempts` times, sleeping `policy.interval`
/// between attempts. The attempt number (1-based) is passed to `op`.
///
/// Returns `None` once the budget is exhausted; the caller decides what
/// timeout error that maps to.
pub async fn poll_until<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    for attempt in 1..=policy.max_attempts {
        if let Attempt::Ready(value) = op(attempt).await {
            return Some(value);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn exhausts_exactly_the_attempt_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_attempts: 5,
            interval: Duration::from_secs(3),
        };

        let start = tokio::time::Instant::now();
        let counter = Arc::clone(&calls);
        let result: Option<()> = poll_until(&policy, move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Attempt::Pending
            }
        })
        .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // Four sleeps between five attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_success() {
        let policy = RetryPolicy {
            max_attempts: 10,
            interval: Duration::from_secs(60),
        };

        let start = tokio::time::Instant::now();
        let result = poll_until(&policy, |attempt| async move {
            if attempt == 3 {
                Attempt::Ready(attempt)
            } else {
                Attempt::Pending
            }
        })
        .await;

        assert_eq!(result, Some(3));
        assert_eq!(start.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn single_attempt_budget_never_sleeps() {
        let policy = RetryPolicy {
            max_attempts: 1,
            interval: Duration::from_secs(3600),
        };
        // Would hang the test if the combinator slept after the last attempt.
        let result: Option<()> = poll_until(&policy, |_| async { Attempt::Pending }).await;
        assert!(result.is_none());
    }
}

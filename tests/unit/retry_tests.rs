/*!
 * Tests for the retry policy
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use scriptreel::errors::{AdapterError, AdapterFamily};
use scriptreel::retry::RetryPolicy;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, 5, 20, Duration::from_secs(5))
}

/// Test a transient failure that clears before the budget runs out
#[tokio::test]
async fn test_run_withTwoTransientFailures_shouldSucceedOnThirdAttempt() {
    let policy = fast_policy(3);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let outcome = policy
        .run(AdapterFamily::Audio, "unit under test", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AdapterError::transient(AdapterFamily::Audio, "flaky"))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

    assert_eq!(outcome.result.unwrap(), 42);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Test budget exhaustion on a persistent transient failure
#[tokio::test]
async fn test_run_withPersistentTransientFailure_shouldStopAtBudget() {
    let policy = fast_policy(3);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let outcome = policy
        .run(AdapterFamily::Image, "unit under test", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AdapterError::transient(AdapterFamily::Image, "still down"))
            }
        })
        .await;

    assert!(outcome.result.is_err());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Test permanent failures never consume the remaining budget
#[tokio::test]
async fn test_run_withPermanentFailure_shouldReturnAfterOneAttempt() {
    let policy = fast_policy(3);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let outcome = policy
        .run(AdapterFamily::Bgm, "unit under test", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AdapterError::permanent(AdapterFamily::Bgm, "bad request"))
            }
        })
        .await;

    assert!(matches!(outcome.result, Err(AdapterError::Permanent { .. })));
    assert_eq!(outcome.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Test the service-suggested wait overrides the backoff schedule
#[tokio::test]
async fn test_run_withRateLimitRetryAfter_shouldHonorSuggestedWait() {
    // Backoff schedule would wait 5ms; the service asks for 150ms
    let policy = fast_policy(2);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let started = Instant::now();
    let outcome = policy
        .run(AdapterFamily::Stock, "unit under test", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AdapterError::rate_limited(
                        AdapterFamily::Stock,
                        "slow down",
                        Some(Duration::from_millis(150)),
                    ))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(outcome.result.is_ok());
    assert_eq!(outcome.attempts, 2);
    assert!(
        started.elapsed() >= Duration::from_millis(150),
        "wait was shorter than the service asked for: {:?}",
        started.elapsed()
    );
}

/// Test per-call timeout expiry is a retryable error
#[tokio::test]
async fn test_run_withHangingCall_shouldTimeOutAndRetry() {
    let policy = RetryPolicy::new(2, 5, 20, Duration::from_millis(50));
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let outcome = policy
        .run(AdapterFamily::Audio, "unit under test", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    // First attempt hangs past the per-call timeout
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok(7u32)
            }
        })
        .await;

    assert_eq!(outcome.result.unwrap(), 7);
    assert_eq!(outcome.attempts, 2);
}

/// Test the retry observer fires once per wait-and-retry
#[tokio::test]
async fn test_runObserved_withRetries_shouldNotifyBeforeEachRetry() {
    let policy = fast_policy(3);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut observed = Vec::new();

    let outcome = policy
        .run_observed(
            AdapterFamily::Audio,
            "unit under test",
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AdapterError::transient(AdapterFamily::Audio, "flaky"))
                    } else {
                        Ok(())
                    }
                }
            },
            |attempt, _err| observed.push(attempt),
        )
        .await;

    assert!(outcome.result.is_ok());
    // Two failed attempts, so the observer fired after attempts 1 and 2
    assert_eq!(observed, vec![1, 2]);
}

/// Test a widened per-call timeout lets a long-running call finish
#[tokio::test]
async fn test_withCallTimeout_onLongCall_shouldReplaceDefaultBudget() {
    // Under the base 20ms timeout every attempt would expire
    let policy = RetryPolicy::new(2, 5, 20, Duration::from_millis(20))
        .with_call_timeout(Duration::from_secs(5));

    let outcome = policy
        .run(AdapterFamily::Bgm, "unit under test", || async {
            tokio::time::sleep(Duration::from_millis(80)).await;
            Ok::<_, AdapterError>(3u8)
        })
        .await;

    assert_eq!(outcome.result.unwrap(), 3);
    assert_eq!(outcome.attempts, 1);
}

/// Test a zero attempt budget is clamped to one
#[tokio::test]
async fn test_new_withZeroAttempts_shouldStillAttemptOnce() {
    let policy = RetryPolicy::new(0, 5, 20, Duration::from_secs(1));

    let outcome = policy
        .run(AdapterFamily::Image, "unit under test", || async { Ok::<_, AdapterError>(1u8) })
        .await;

    assert_eq!(outcome.attempts, 1);
    assert!(outcome.result.is_ok());
}

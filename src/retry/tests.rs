//! Unit tests for the bounded retry loop.

use std::sync::atomic::{AtomicU32, Ordering};

use super::*;
use rstest::rstest;

fn policy(budget: Duration) -> RetryPolicy {
    RetryPolicy {
        budget,
        backoff: Backoff::fixed(Duration::from_secs(1)),
    }
}

#[rstest]
#[case(0, Duration::from_millis(500))]
#[case(1, Duration::from_secs(1))]
#[case(3, Duration::from_secs(4))]
#[case(5, Duration::from_secs(10))]
#[case(40, Duration::from_secs(10))]
fn default_backoff_doubles_up_to_the_cap(#[case] retry: u32, #[case] expected: Duration) {
    assert_eq!(Backoff::default().delay_for(retry), expected);
}

#[rstest]
fn fixed_backoff_never_grows() {
    let backoff = Backoff::fixed(Duration::from_secs(2));
    assert_eq!(backoff.delay_for(0), Duration::from_secs(2));
    assert_eq!(backoff.delay_for(7), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn succeeds_after_a_retryable_failure() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let outcome = retry_within_budget(
        &policy(Duration::from_secs(60)),
        &CancellationToken::new(),
        || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(Attempt::Retryable("busy"))
                } else {
                    Ok(call)
                }
            }
        },
    )
    .await
    .expect("second attempt should succeed");

    assert_eq!(outcome, RetryOutcome { value: 1, attempts: 2 });
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn terminal_failures_stop_immediately() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let err = retry_within_budget(
        &policy(Duration::from_secs(60)),
        &CancellationToken::new(),
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Attempt::Terminal("forbidden")) }
        },
    )
    .await
    .expect_err("terminal failure should surface");

    assert_eq!(
        err,
        RetryError::Terminal {
            error: "forbidden",
            attempts: 1
        }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn budget_exhaustion_aborts_with_last_error() {
    let started = Instant::now();

    let err = retry_within_budget(
        &policy(Duration::from_secs(5)),
        &CancellationToken::new(),
        || async { Err::<(), _>(Attempt::Retryable("still busy")) },
    )
    .await
    .expect_err("budget should run out");

    let RetryError::Aborted {
        cause,
        attempts,
        last_error,
    } = err
    else {
        panic!("expected Aborted, got {err:?}");
    };
    assert_eq!(cause, AbortCause::Deadline);
    assert_eq!(last_error, Some("still busy"));
    // One attempt at t=0 and one after every 1s delay up to t=5.
    assert_eq!(attempts, 6);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn final_delay_is_clipped_to_the_deadline() {
    let started = Instant::now();
    let slow = RetryPolicy {
        budget: Duration::from_secs(3),
        backoff: Backoff::fixed(Duration::from_secs(10)),
    };

    let err = retry_within_budget(&slow, &CancellationToken::new(), || async {
        Err::<(), _>(Attempt::Retryable("busy"))
    })
    .await
    .expect_err("budget should run out");

    assert!(matches!(err, RetryError::Aborted { attempts: 2, .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn cancellation_before_start_makes_no_attempt() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let calls = AtomicU32::new(0);

    let err = retry_within_budget(&policy(Duration::from_secs(60)), &cancel, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<(), Attempt<&str>>(()) }
    })
    .await
    .expect_err("cancelled loop should abort");

    assert_eq!(
        err,
        RetryError::Aborted {
            cause: AbortCause::Cancelled,
            attempts: 0,
            last_error: None
        }
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_backoff() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(1500)).await;
        trigger.cancel();
    });
    let started = Instant::now();

    let err = retry_within_budget(&policy(Duration::from_secs(60)), &cancel, || async {
        Err::<(), _>(Attempt::Retryable("busy"))
    })
    .await
    .expect_err("cancelled loop should abort");

    let RetryError::Aborted { cause, .. } = err else {
        panic!("expected Aborted, got {err:?}");
    };
    assert_eq!(cause, AbortCause::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn pending_attempt_is_dropped_at_the_deadline() {
    let started = Instant::now();

    let err = retry_within_budget(
        &policy(Duration::from_secs(10)),
        &CancellationToken::new(),
        || async {
            sleep(Duration::from_secs(3600)).await;
            Err::<(), _>(Attempt::Retryable("stalled"))
        },
    )
    .await
    .expect_err("budget should cut the attempt short");

    assert_eq!(
        err,
        RetryError::Aborted {
            cause: AbortCause::Deadline,
            attempts: 1,
            last_error: None
        }
    );
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_pending_attempt() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });
    let started = Instant::now();

    let err = retry_within_budget(&policy(Duration::from_secs(300)), &cancel, || async {
        sleep(Duration::from_secs(3600)).await;
        Ok::<(), Attempt<&str>>(())
    })
    .await
    .expect_err("cancelled loop should abort");

    assert_eq!(
        err,
        RetryError::Aborted {
            cause: AbortCause::Cancelled,
            attempts: 1,
            last_error: None
        }
    );
    assert_eq!(started.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn deadline_keeps_the_last_retryable_error() {
    let calls = AtomicU32::new(0);

    let err = retry_within_budget(&policy(Duration::from_secs(5)), &CancellationToken::new(), || {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if call > 0 {
                sleep(Duration::from_secs(3600)).await;
            }
            Err::<(), _>(Attempt::Retryable("busy"))
        }
    })
    .await
    .expect_err("budget should run out");

    assert_eq!(
        err,
        RetryError::Aborted {
            cause: AbortCause::Deadline,
            attempts: 2,
            last_error: Some("busy")
        }
    );
}

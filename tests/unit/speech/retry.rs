use std::sync::Mutex;

use super::*;

#[derive(Default)]
struct RecordingSleep {
    delays: Mutex<Vec<Duration>>,
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TestErr {
    TooManyRequests,
    Broken,
}

fn is_rate_limit(e: &TestErr) -> bool {
    *e == TestErr::TooManyRequests
}

#[test]
fn exponential_backoff_schedule() {
    let b = Backoff::Exponential { base_secs: 2.0 };
    assert_eq!(b.delay(1), Duration::from_secs(2));
    assert_eq!(b.delay(2), Duration::from_secs(4));
    assert_eq!(b.delay(3), Duration::from_secs(8));
    assert_eq!(b.delay(40), MAX_DELAY);
    assert_eq!(Backoff::None.delay(5), Duration::ZERO);
}

#[test]
fn two_rate_limits_then_success() {
    let sleeper = RecordingSleep::default();
    let mut calls = 0u32;
    let out = RetryPolicy::default().run(&sleeper, is_rate_limit, |attempt| {
        calls += 1;
        assert_eq!(attempt, calls);
        if attempt <= 2 {
            Err(TestErr::TooManyRequests)
        } else {
            Ok(attempt * 10)
        }
    });

    assert_eq!(out, Ok(30));
    assert_eq!(calls, 3);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[test]
fn four_rate_limits_exhaust_three_retries() {
    let sleeper = RecordingSleep::default();
    let mut calls = 0u32;
    let out: Result<(), _> = RetryPolicy::default().run(&sleeper, is_rate_limit, |_| {
        calls += 1;
        Err(TestErr::TooManyRequests)
    });

    assert_eq!(
        out,
        Err(RetryError::Exhausted {
            attempts: 4,
            last: TestErr::TooManyRequests
        })
    );
    assert_eq!(calls, 4);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8)
        ]
    );
}

#[test]
fn non_retryable_error_propagates_immediately() {
    let sleeper = RecordingSleep::default();
    let mut calls = 0u32;
    let out: Result<(), _> = RetryPolicy::default().run(&sleeper, is_rate_limit, |_| {
        calls += 1;
        Err(TestErr::Broken)
    });

    let err = out.unwrap_err();
    assert_eq!(err.attempts(), 1);
    assert_eq!(err.into_inner(), TestErr::Broken);
    assert_eq!(calls, 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

#[test]
fn zero_retries_means_single_attempt() {
    let sleeper = RecordingSleep::default();
    let policy = RetryPolicy {
        max_retries: 0,
        backoff: Backoff::Fixed(Duration::from_millis(5)),
    };
    let out: Result<(), _> = policy.run(&sleeper, is_rate_limit, |_| Err(TestErr::TooManyRequests));
    assert_eq!(out.unwrap_err().attempts(), 1);
    assert!(sleeper.delays.lock().unwrap().is_empty());
}

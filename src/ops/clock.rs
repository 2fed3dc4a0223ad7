//! Injected time capability.
//!
//! Direct use of the host time API is forbidden outside [`SystemClock`];
//! everything that waits, sleeps, or timestamps goes through a `Clock`
//! handle so tests run sleep-free with a [`FakeClock`].

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{ErkError, ErrorCategory};

pub trait Clock: Send + Sync {
    /// Current wall-clock time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Block for the given duration.
    fn sleep(&self, duration: Duration);
}

/// The real clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests. Sleeping advances `now` without blocking;
/// every sleep is recorded.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for FakeClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Retry a fallible operation with exponential backoff.
///
/// Only remote failures are retried; every other error category returns
/// immediately. The backoff doubles from `base` and is driven entirely by
/// the injected clock.
pub fn retry_with_backoff<T>(
    clock: &dyn Clock,
    attempts: u32,
    base: Duration,
    mut operation: impl FnMut() -> Result<T, ErkError>,
) -> Result<T, ErkError> {
    let mut delay = base;
    let mut last_err = None;
    for attempt in 0..attempts.max(1) {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if err.category() == ErrorCategory::Remote => {
                log::debug!("remote failure on attempt {}: {}", attempt + 1, err.summary());
                last_err = Some(err);
                if attempt + 1 < attempts {
                    clock.sleep(delay);
                    delay *= 2;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or(ErkError::Internal {
        identifier: "retry-no-attempts".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fake() -> FakeClock {
        FakeClock::new(Utc.with_ymd_and_hms(2025, 11, 26, 14, 30, 0).unwrap())
    }

    #[test]
    fn fake_clock_advances_on_sleep() {
        let clock = fake();
        let before = clock.now_utc();
        clock.sleep(Duration::from_secs(90));
        assert_eq!((clock.now_utc() - before).num_seconds(), 90);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(90)]);
    }

    #[test]
    fn retry_succeeds_after_transient_remote_failures() {
        let clock = fake();
        let mut calls = 0;
        let result = retry_with_backoff(&clock, 3, Duration::from_millis(500), || {
            calls += 1;
            if calls < 3 {
                Err(ErkError::Host {
                    operation: "list runs".into(),
                    details: "503".into(),
                })
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
        // Backoff doubles: 500ms then 1000ms
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[test]
    fn retry_does_not_retry_user_errors() {
        let clock = fake();
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(&clock, 3, Duration::from_millis(500), || {
            calls += 1;
            Err(ErkError::IssueNotFound { number: 1 })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn retry_exhausts_attempts() {
        let clock = fake();
        let result: Result<(), _> = retry_with_backoff(&clock, 3, Duration::from_millis(500), || {
            Err(ErkError::Host {
                operation: "x".into(),
                details: "500".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(clock.sleeps().len(), 2);
    }
}

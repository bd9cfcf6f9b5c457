//! Retry policy and circuit breaker for feed calls.
//!
//! Transient errors (connection, timeout) are retried with exponential
//! backoff; everything else fails fast. A shared circuit breaker trips
//! after consecutive failures and blocks calls for a cooldown window so a
//! dead feed is not hammered.

use super::SourceError;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const TRIP_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open { until_elapsed: bool },
}

struct BreakerInner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Trips open after `TRIP_THRESHOLD` consecutive failures; half-opens after
/// the cooldown so the next call probes the feed.
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                consecutive_failures: 0,
                opened_at: None,
            }),
            cooldown,
        }
    }

    fn state(&self) -> BreakerState {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match inner.opened_at {
            Some(at) => BreakerState::Open {
                until_elapsed: at.elapsed() >= self.cooldown,
            },
            None => BreakerState::Closed,
        }
    }

    /// Whether a call may proceed right now.
    pub fn allows_request(&self) -> bool {
        !matches!(
            self.state(),
            BreakerState::Open {
                until_elapsed: false
            }
        )
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= TRIP_THRESHOLD {
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn is_open(&self) -> bool {
        !self.allows_request()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Exponential backoff policy: attempt `n` sleeps `base_delay * 2^n`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    /// Run `op`, retrying retryable errors up to `max_attempts` times and
    /// consulting `breaker` before each attempt. Non-retryable errors
    /// return immediately without touching the breaker's failure count.
    pub fn run<T, F>(&self, breaker: &CircuitBreaker, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Result<T, SourceError>,
    {
        let mut last_err = None;
        for attempt in 0..self.max_attempts.max(1) {
            if !breaker.allows_request() {
                return Err(SourceError::CircuitBreakerTripped);
            }
            match op() {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    breaker.record_failure();
                    tracing::warn!(attempt, error = %err, "feed call failed, retrying");
                    if attempt + 1 < self.max_attempts {
                        std::thread::sleep(self.delay_for(attempt));
                    }
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| SourceError::Connection("no attempts made".into())))
    }
}

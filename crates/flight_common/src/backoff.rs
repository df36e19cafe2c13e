//! Delay policy between attempts against the inference provider.

use std::sync::Mutex;
use std::time::Duration;

/// Decides how long to wait before retry number `retry` (1-based).
pub trait BackoffStrategy: Send + Sync {
    fn delay(&self, retry: u32) -> Duration;

    /// Block the calling thread for the delay of `retry`
    fn pause(&self, retry: u32) {
        let delay = self.delay(retry);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// `initial * multiplier^(retry-1)`: 1000ms, 2000ms, 4000ms, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub multiplier: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, multiplier: u32) -> Self {
        Self { initial, multiplier }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 2)
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial.saturating_mul(factor)
    }
}

/// Zero delay, for tests and local tooling
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl BackoffStrategy for NoBackoff {
    fn delay(&self, _retry: u32) -> Duration {
        Duration::ZERO
    }
}

/// Wraps a strategy and records the delays it was asked for without sleeping
#[derive(Debug, Default)]
pub struct RecordingBackoff<B> {
    inner: B,
    recorded: Mutex<Vec<Duration>>,
}

impl<B: BackoffStrategy> RecordingBackoff<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl<B: BackoffStrategy> BackoffStrategy for RecordingBackoff<B> {
    fn delay(&self, retry: u32) -> Duration {
        self.inner.delay(retry)
    }

    fn pause(&self, retry: u32) {
        let delay = self.inner.delay(retry);
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(delay);
        }
    }
}

//! Liveness watchdog: warns when the queue has been silent for too long.
//!
//! The pipeline loop is the only writer of the receipt timestamp and the
//! watchdog task is its only reader, so a single atomic is enough. If more
//! writers are ever added, updates must become a read-modify-write on the
//! atomic (or move behind a mutex).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

/// Default maximum silence between two received messages (30 minutes).
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(1800);

/// Upper bound of the interval between two checks.
const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Lower bound of the interval between two checks.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Time of the last successful receive, in milliseconds since epoch.
#[derive(Debug, Clone)]
pub struct ReceiptClock {
    last_received_ms: Arc<AtomicI64>,
}

impl Default for ReceiptClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptClock {
    /// A clock whose last receipt is the moment of construction.
    pub fn new() -> Self {
        Self {
            last_received_ms: Arc::new(AtomicI64::new(Utc::now().timestamp_millis())),
        }
    }

    /// Record a receipt now.
    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    pub fn touch_at(&self, at: DateTime<Utc>) {
        self.last_received_ms
            .store(at.timestamp_millis(), Ordering::Release);
    }

    pub fn last_received(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_received_millis()).unwrap_or_default()
    }

    fn last_received_millis(&self) -> i64 {
        self.last_received_ms.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Messages are arriving within the allowed gap.
    Idle,
    /// The gap since the last receipt exceeds the threshold.
    Alerting,
}

#[derive(Debug, Clone)]
pub struct LivenessWatchdog {
    clock: ReceiptClock,
    max_elapsed: Duration,
    check_interval: Duration,
}

impl LivenessWatchdog {
    pub fn new(clock: ReceiptClock, max_elapsed: Duration) -> Self {
        Self {
            clock,
            max_elapsed,
            check_interval: max_elapsed.clamp(MIN_CHECK_INTERVAL, MAX_CHECK_INTERVAL),
        }
    }

    /// Check more often than the default. The interval never exceeds
    /// `max_elapsed`.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval
            .min(self.max_elapsed)
            .max(MIN_CHECK_INTERVAL);
        self
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// State of the watchdog as of `now`, compared at millisecond resolution.
    pub fn check_at(&self, now: DateTime<Utc>) -> WatchdogState {
        let gap_ms = now
            .timestamp_millis()
            .saturating_sub(self.clock.last_received_millis());
        let max_ms = i64::try_from(self.max_elapsed.as_millis()).unwrap_or(i64::MAX);
        if gap_ms > max_ms {
            WatchdogState::Alerting
        } else {
            WatchdogState::Idle
        }
    }

    /// Run the watchdog on a background task until `token` is cancelled.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token).in_current_span())
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = WatchdogState::Idle;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let current = self.check_at(Utc::now());
            match current {
                WatchdogState::Alerting => warn!(
                    max_elapsed_secs = self.max_elapsed.as_secs(),
                    "No message received since {} UTC",
                    self.clock.last_received().format("%Y-%m-%d %H:%M:%S")
                ),
                WatchdogState::Idle if state == WatchdogState::Alerting => {
                    info!("Message reception resumed");
                }
                WatchdogState::Idle => {}
            }
            state = current;
        }
    }
}

//! Time-related abstractions.
//!
//! Sleeps and intervals come from `tokio::time`, so tests running under
//! `#[tokio::test(start_paused = true)]` can advance them deterministically.
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(20)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(20));
//! }
//! ```

pub use tokio::time::{
    interval, interval_at, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior,
    Sleep, Timeout,
};

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Builds an interval whose first tick fires after `delay` and then every
/// `period`, skipping ticks that were missed while the task was busy.
pub fn delayed_interval(delay: Duration, period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Returns the current wall-clock time as milliseconds since UNIX_EPOCH.
///
/// A clock set before the epoch yields zero.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Returns the current wall-clock time as seconds since UNIX_EPOCH.
pub fn now_secs() -> u64 {
    now_millis() / 1000
}

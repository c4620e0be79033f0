//! Small shared utilities.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in nanoseconds since the Unix epoch.
///
/// Order and trade timestamps are stamped with this value at the moment the
/// dispatcher accepts the action, so timestamps are monotonic per book as
/// long as the system clock is.
#[must_use]
pub fn current_time_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

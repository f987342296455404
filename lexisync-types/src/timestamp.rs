//! Wall-clock timestamps in milliseconds since the Unix epoch.
//!
//! The relationship analysis in the sync engine works on wall-clock
//! proximity windows (hours to days), so a plain millisecond value is
//! enough; there is no causal-ordering requirement that would call for a
//! logical clock.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        Self(ms)
    }

    /// Creates a timestamp from raw milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Absolute distance between two timestamps.
    #[must_use]
    pub const fn abs_diff(&self, other: &Self) -> Duration {
        Duration::from_millis(self.0.abs_diff(other.0))
    }

    /// Returns this timestamp advanced by a duration, saturating on overflow.
    #[must_use]
    pub fn saturating_add(&self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_millis() as u64))
    }

    /// True if `self` is more than `window` older than `other`.
    #[must_use]
    pub fn is_older_than(&self, other: &Self, window: Duration) -> bool {
        other.0.saturating_sub(self.0) > window.as_millis() as u64
    }
}

impl From<u64> for Timestamp {
    fn from(ms: u64) -> Self {
        Self(ms)
    }
}

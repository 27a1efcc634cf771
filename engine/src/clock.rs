//! Time sources for auto-generated keys.
//!
//! Members stored without a preferred key get a timestamp key. The unit
//! decides where those keys enumerate: second timestamps (~1.7e9) are index
//! keys and sort numerically, millisecond timestamps (~1.7e12) are too large
//! and become named keys in insertion order.

use crate::Key;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unit used when turning the current time into a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimestampUnit {
    /// Milliseconds since the Unix epoch
    #[default]
    Millis,
    /// Whole seconds since the Unix epoch
    Seconds,
}

impl TimestampUnit {
    /// Map the `based_on_second` flag to a unit.
    pub fn from_based_on_second(based_on_second: bool) -> Self {
        if based_on_second {
            TimestampUnit::Seconds
        } else {
            TimestampUnit::Millis
        }
    }

    /// Convert epoch milliseconds to this unit.
    pub fn convert(self, millis: u64) -> u64 {
        match self {
            TimestampUnit::Millis => millis,
            TimestampUnit::Seconds => millis / 1000,
        }
    }
}

/// A source of wall-clock time.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// A fresh key for the current time.
    fn timestamp_key(&self, unit: TimestampUnit) -> Key {
        Key::from(unit.convert(self.now_millis()))
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock stopped at `millis`.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `millis`.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

//! Monotonic time base shared by firmware and host targets.
//!
//! Every timing decision in the core keys off a free-running counter whose
//! epoch survives the lowest power state. [`Instant`] wraps that counter as
//! microseconds since the first cold boot; wall-clock time never enters the
//! crate. Targets supply readings through the [`Clock`] capability and
//! bounded pauses through [`Delay`].

use core::fmt;
use core::ops::Add;
use core::time::Duration;

/// Microsecond reading taken from the free-running, sleep-surviving counter.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Instant {
    micros: u64,
}

impl Instant {
    /// The counter value at the first cold boot.
    pub const EPOCH: Self = Self { micros: 0 };

    /// Constructs an instant from raw microseconds.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self { micros }
    }

    /// Constructs an instant from whole seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            micros: secs * 1_000_000,
        }
    }

    /// Returns the raw microsecond count.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.micros
    }

    /// Duration elapsed since `earlier`, clamped to zero when `earlier` is in
    /// the future.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.micros.saturating_sub(earlier.micros))
    }
}

impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        #[allow(clippy::cast_possible_truncation)]
        let rhs_micros = rhs.as_micros() as u64;
        Self {
            micros: self.micros.saturating_add(rhs_micros),
        }
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}s",
            self.micros / 1_000_000,
            self.micros % 1_000_000
        )
    }
}

/// Capability producing [`Instant`] readings.
///
/// Implementations must source the value from a counter that keeps running
/// through the lowest power state; a clock that restarts at each wake would
/// make every persisted deadline report as fully elapsed or fully pending.
pub trait Clock {
    /// Returns the current counter reading.
    fn now(&self) -> Instant;
}

/// Capability for bounded blocking pauses.
pub trait Delay {
    /// Blocks the single logical thread for `duration`.
    fn sleep(&mut self, duration: Duration);
}

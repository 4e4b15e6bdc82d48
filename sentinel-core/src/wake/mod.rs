//! Wake cause classification and wake source selection types.
//!
//! The sleep controller reports a raw cause code explaining why execution
//! resumed. [`classify`] folds that open-ended code into the closed
//! [`WakeReason`] set the dispatcher branches on, evaluated once per process
//! lifetime. The module also owns [`WakeSourceSelection`], the single wake
//! source armed immediately before every power-down.

use core::fmt;
use core::time::Duration;

/// Raw wake cause code reported by the sleep controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeCause {
    /// No wake source recorded; first boot or return from total power loss.
    Undefined,
    /// Sustained level observed on the armed trigger input.
    TriggerLevel,
    /// The armed wake timer elapsed.
    Timer,
    /// Any other platform-specific cause code.
    Other(u8),
}

/// Reason the device woke, derived once from the raw cause code.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeReason {
    /// Cold boot; the retained region starts zeroed.
    PowerOn,
    /// The trigger input fired while level-wake was armed.
    Trigger,
    /// The cooldown timer elapsed while timer-wake was armed.
    TimerExpired,
    /// Defensive fallback for cause codes the classifier does not know.
    Unknown,
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeReason::PowerOn => f.write_str("power-on"),
            WakeReason::Trigger => f.write_str("trigger"),
            WakeReason::TimerExpired => f.write_str("timer-expired"),
            WakeReason::Unknown => f.write_str("unknown"),
        }
    }
}

/// Maps a raw cause code onto the closed reason set.
///
/// Total over every possible cause; `Unknown` is the fallback and the
/// dispatcher treats it as "no action, straight to power-down".
#[must_use]
pub const fn classify(cause: WakeCause) -> WakeReason {
    match cause {
        WakeCause::Undefined => WakeReason::PowerOn,
        WakeCause::TriggerLevel => WakeReason::Trigger,
        WakeCause::Timer => WakeReason::TimerExpired,
        WakeCause::Other(_) => WakeReason::Unknown,
    }
}

/// Identifier for the level-wake trigger input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriggerPin(u8);

impl TriggerPin {
    /// Wraps a platform pin number.
    #[must_use]
    pub const fn new(pin: u8) -> Self {
        Self(pin)
    }

    /// Returns the raw pin number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for TriggerPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin{}", self.0)
    }
}

/// The single wake source armed before a power-down.
///
/// Exactly one variant is ever selected per cycle; arming both or neither
/// would either defeat the cooldown or strand the device asleep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeSourceSelection {
    /// Arm the sustained-level trigger input.
    LevelWake(TriggerPin),
    /// Arm the wake timer for the given duration.
    TimerWake(Duration),
}

impl fmt::Display for WakeSourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeSourceSelection::LevelWake(pin) => write!(f, "level-wake {pin}"),
            WakeSourceSelection::TimerWake(duration) => {
                write!(f, "timer-wake {}s", duration.as_secs())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_the_reason_set() {
        assert_eq!(classify(WakeCause::Undefined), WakeReason::PowerOn);
        assert_eq!(classify(WakeCause::TriggerLevel), WakeReason::Trigger);
        assert_eq!(classify(WakeCause::Timer), WakeReason::TimerExpired);
        assert_eq!(classify(WakeCause::Other(0)), WakeReason::Unknown);
        assert_eq!(classify(WakeCause::Other(0xFF)), WakeReason::Unknown);
    }

    #[test]
    fn selection_display_names_the_source() {
        let mut rendered = heapless::String::<32>::new();
        core::fmt::write(
            &mut rendered,
            format_args!("{}", WakeSourceSelection::LevelWake(TriggerPin::new(3))),
        )
        .unwrap();
        assert_eq!(rendered.as_str(), "level-wake pin3");

        rendered.clear();
        core::fmt::write(
            &mut rendered,
            format_args!(
                "{}",
                WakeSourceSelection::TimerWake(Duration::from_secs(3600))
            ),
        )
        .unwrap();
        assert_eq!(rendered.as_str(), "timer-wake 3600s");
    }
}

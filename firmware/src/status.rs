#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics track the current process lifetime so a debug probe
//! can read the wake reason, pipeline progress, and the armed wake source
//! without touching shared mutable state directly. Nothing here survives
//! power-down; the retained cooldown record is the only persistent state.

use portable_atomic::{AtomicU8, AtomicU16, AtomicU32, Ordering};

use sentinel_core::telemetry::TelemetryEventKind;
use sentinel_core::wake::{WakeReason, WakeSourceSelection};

const REASON_UNSET: u8 = 0xFF;
const SOURCE_NONE: u8 = 0;
const SOURCE_LEVEL: u8 = 1;
const SOURCE_TIMER: u8 = 2;

/// Wake reason resolved at boot (0xFF until classified).
static WAKE_REASON: AtomicU8 = AtomicU8::new(REASON_UNSET);
/// Code of the most recent telemetry event.
static LAST_EVENT_CODE: AtomicU16 = AtomicU16::new(0);
/// Number of telemetry events emitted this lifetime.
static EVENT_COUNT: AtomicU32 = AtomicU32::new(0);
/// Armed wake source once power-down is planned.
static ARMED_SOURCE: AtomicU8 = AtomicU8::new(SOURCE_NONE);

fn encode_reason(reason: WakeReason) -> u8 {
    match reason {
        WakeReason::PowerOn => 0,
        WakeReason::Trigger => 1,
        WakeReason::TimerExpired => 2,
        WakeReason::Unknown => 3,
    }
}

fn decode_reason(raw: u8) -> Option<WakeReason> {
    match raw {
        0 => Some(WakeReason::PowerOn),
        1 => Some(WakeReason::Trigger),
        2 => Some(WakeReason::TimerExpired),
        3 => Some(WakeReason::Unknown),
        _ => None,
    }
}

/// Records the classified wake reason.
pub fn record_wake(reason: WakeReason) {
    WAKE_REASON.store(encode_reason(reason), Ordering::Relaxed);
}

/// Returns the classified wake reason, if the boot path has run.
pub fn wake_reason() -> Option<WakeReason> {
    decode_reason(WAKE_REASON.load(Ordering::Relaxed))
}

/// Mirrors a telemetry event into the probe-visible counters.
pub fn record_event(event: &TelemetryEventKind) {
    LAST_EVENT_CODE.store(event.code(), Ordering::Relaxed);
    EVENT_COUNT.fetch_add(1, Ordering::Relaxed);
    if let TelemetryEventKind::SleepPlanned(selection) = event {
        let encoded = match selection {
            WakeSourceSelection::LevelWake(_) => SOURCE_LEVEL,
            WakeSourceSelection::TimerWake(_) => SOURCE_TIMER,
        };
        ARMED_SOURCE.store(encoded, Ordering::Relaxed);
    }
}

/// Code of the most recent telemetry event (0 before the first).
pub fn last_event_code() -> u16 {
    LAST_EVENT_CODE.load(Ordering::Relaxed)
}

/// Number of telemetry events emitted this lifetime.
pub fn event_count() -> u32 {
    EVENT_COUNT.load(Ordering::Relaxed)
}

/// Returns `true` once a wake source has been armed for power-down.
pub fn sleep_planned() -> bool {
    ARMED_SOURCE.load(Ordering::Relaxed) != SOURCE_NONE
}

//! Persistent cooldown state and wake-source arbitration.
//!
//! Exactly one timestamp survives the lowest power state: the instant after
//! which a new trigger-handling cycle may run. [`CooldownStore`] serializes
//! that timestamp through a fixed-size record in a retained memory cell and
//! answers every query against a caller-supplied monotonic reading; the
//! store never consults a clock on its own. [`select_wake_source`] turns the
//! persisted state into the single wake source armed before power-down.

use core::time::Duration;

use crate::time::Instant;
use crate::wake::{TriggerPin, WakeSourceSelection};

/// Size of the serialized cooldown record in the retained region.
pub const COOLDOWN_RECORD_LEN: usize = 16;

/// Marker identifying a record written by this firmware generation.
const RECORD_MAGIC: u32 = 0x534E_544C; // "SNTL"

/// Suppression window state persisted across power-down.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CooldownState {
    allowed_after: Instant,
}

impl CooldownState {
    /// The zeroed state a true cold start begins from.
    #[must_use]
    pub const fn cold() -> Self {
        Self {
            allowed_after: Instant::EPOCH,
        }
    }

    /// Constructs a state that suppresses triggers until `allowed_after`.
    #[must_use]
    pub const fn until(allowed_after: Instant) -> Self {
        Self { allowed_after }
    }

    /// Returns the instant after which triggers are honored again.
    #[must_use]
    pub const fn allowed_after(self) -> Instant {
        self.allowed_after
    }

    /// Returns `true` while `now` sits inside the suppression window.
    #[must_use]
    pub fn is_cooling_down(self, now: Instant) -> bool {
        now < self.allowed_after
    }

    /// Time left in the suppression window, zero once it has elapsed.
    #[must_use]
    pub fn remaining(self, now: Instant) -> Duration {
        self.allowed_after.saturating_duration_since(now)
    }

    /// Serializes the state into the fixed retained record layout.
    ///
    /// Layout, little-endian: magic `u32`, `allowed_after` microseconds
    /// `u64`, checksum `u32` over the preceding words.
    #[must_use]
    pub fn encode(self) -> [u8; COOLDOWN_RECORD_LEN] {
        let micros = self.allowed_after.as_micros();
        let mut record = [0u8; COOLDOWN_RECORD_LEN];
        record[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        record[4..12].copy_from_slice(&micros.to_le_bytes());
        record[12..16].copy_from_slice(&checksum(micros).to_le_bytes());
        record
    }

    /// Deserializes a retained record, falling back to the cold state when
    /// the magic or checksum does not verify (zeroed region on first boot,
    /// garbage after total power loss).
    #[must_use]
    pub fn decode(record: &[u8; COOLDOWN_RECORD_LEN]) -> Self {
        let mut word = [0u8; 4];
        word.copy_from_slice(&record[0..4]);
        if u32::from_le_bytes(word) != RECORD_MAGIC {
            return Self::cold();
        }

        let mut stamp = [0u8; 8];
        stamp.copy_from_slice(&record[4..12]);
        let micros = u64::from_le_bytes(stamp);

        word.copy_from_slice(&record[12..16]);
        if u32::from_le_bytes(word) != checksum(micros) {
            return Self::cold();
        }

        Self::until(Instant::from_micros(micros))
    }
}

/// Mixes the magic and both timestamp halves so a partially written record
/// fails verification.
#[allow(clippy::cast_possible_truncation)]
const fn checksum(micros: u64) -> u32 {
    let low = micros as u32;
    let high = (micros >> 32) as u32;
    RECORD_MAGIC ^ low.rotate_left(1) ^ high.rotate_left(17)
}

/// Byte-level access to the retained region sized for one cooldown record.
///
/// Implementations back this with whatever memory the platform keeps powered
/// in its lowest power state; the emulator backs it with a plain array that
/// outlives simulated restarts.
pub trait RetainedCell {
    /// Reads the current record bytes.
    fn load(&mut self) -> [u8; COOLDOWN_RECORD_LEN];

    /// Overwrites the record bytes.
    fn store(&mut self, record: &[u8; COOLDOWN_RECORD_LEN]);
}

/// Cooldown store bound to its retained cell.
///
/// The in-memory state is authoritative for the current process lifetime and
/// is written through to the cell on every mutation, so the persisted record
/// is always current when power is cut.
pub struct CooldownStore<R: RetainedCell> {
    cell: R,
    state: CooldownState,
}

impl<R: RetainedCell> CooldownStore<R> {
    /// Loads the persisted state, treating an unreadable record as cold.
    pub fn load(mut cell: R) -> Self {
        let state = CooldownState::decode(&cell.load());
        Self { cell, state }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CooldownState {
        self.state
    }

    /// Returns `true` while `now` sits inside the suppression window.
    #[must_use]
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.state.is_cooling_down(now)
    }

    /// Time left in the suppression window, zero once it has elapsed.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.state.remaining(now)
    }

    /// Starts (or replaces) the suppression window and persists it.
    ///
    /// Last writer wins: windows never stack or extend additively.
    pub fn start(&mut self, now: Instant, cooldown: Duration) {
        self.state = CooldownState::until(now + cooldown);
        self.cell.store(&self.state.encode());
    }
}

/// Chooses the single wake source to arm before the next power-down.
///
/// Cooling down → timer-wake for the remaining window, trigger input left
/// disarmed. Otherwise → level-wake on the trigger input, timer left
/// disarmed. Total and mutually exclusive by construction.
#[must_use]
pub fn select_wake_source<R: RetainedCell>(
    store: &CooldownStore<R>,
    now: Instant,
    trigger_pin: TriggerPin,
) -> WakeSourceSelection {
    if store.is_cooling_down(now) {
        WakeSourceSelection::TimerWake(store.remaining(now))
    } else {
        WakeSourceSelection::LevelWake(trigger_pin)
    }
}

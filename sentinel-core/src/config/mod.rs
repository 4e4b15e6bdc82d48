//! Tunables consumed by the dispatcher and pipeline sequencer.
//!
//! Values arrive from the startup configuration layer as plain inputs; the
//! defaults below match the deployed sentinel node. None of these are derived
//! constants; the stabilization threshold in particular is a field-tuned
//! heuristic and stays adjustable.

use core::time::Duration;

use crate::wake::TriggerPin;

/// Default suppression window after a confident detection.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3_600);
/// Default warmup granted to the trigger sensor after a cold boot.
pub const DEFAULT_SENSOR_WARMUP: Duration = Duration::from_millis(3_000);
/// Default discard-capture budget during exposure stabilization.
pub const DEFAULT_STABILIZE_BUDGET: u8 = 25;
/// Default number of quality frames required out of the budget.
pub const DEFAULT_STABILIZE_MIN_VALID: u8 = 20;
/// Default pause between discard-captures.
pub const DEFAULT_STABILIZE_FRAME_DELAY: Duration = Duration::from_millis(35);
/// Default minimum byte length for an acceptable capture.
pub const DEFAULT_MIN_FRAME_LEN: usize = 1_024;
/// Default confidence floor for a positive detection.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
/// Default trigger input pin.
pub const DEFAULT_TRIGGER_PIN: TriggerPin = TriggerPin::new(3);

/// Stabilization sweep parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StabilizePolicy {
    /// Total discard-captures performed per sweep.
    pub budget: u8,
    /// Quality frames required for the sweep to pass.
    pub min_valid: u8,
    /// Pause between successive discard-captures.
    pub frame_delay: Duration,
}

impl StabilizePolicy {
    /// Creates a policy from explicit values.
    #[must_use]
    pub const fn new(budget: u8, min_valid: u8, frame_delay: Duration) -> Self {
        Self {
            budget,
            min_valid,
            frame_delay,
        }
    }

    /// Returns `true` when `valid_frames` satisfies the policy.
    #[must_use]
    pub const fn met_by(&self, valid_frames: u8) -> bool {
        valid_frames >= self.min_valid
    }
}

impl Default for StabilizePolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_STABILIZE_BUDGET,
            DEFAULT_STABILIZE_MIN_VALID,
            DEFAULT_STABILIZE_FRAME_DELAY,
        )
    }
}

/// Complete tunable set for one node.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SentinelConfig {
    /// Warmup pause after a cold boot before the trigger sensor is trusted.
    pub sensor_warmup: Duration,
    /// Suppression window started after a confident detection.
    pub cooldown: Duration,
    /// Stabilization sweep parameters.
    pub stabilize: StabilizePolicy,
    /// Minimum byte length for an acceptable capture.
    pub min_frame_len: usize,
    /// Confidence floor for treating a detection as positive.
    pub min_confidence: f32,
    /// Input pin armed for level-wake.
    pub trigger_pin: TriggerPin,
}

impl SentinelConfig {
    /// Creates a configuration from explicit values.
    #[must_use]
    pub const fn new(
        sensor_warmup: Duration,
        cooldown: Duration,
        stabilize: StabilizePolicy,
        min_frame_len: usize,
        min_confidence: f32,
        trigger_pin: TriggerPin,
    ) -> Self {
        Self {
            sensor_warmup,
            cooldown,
            stabilize,
            min_frame_len,
            min_confidence,
            trigger_pin,
        }
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_SENSOR_WARMUP,
            DEFAULT_COOLDOWN,
            StabilizePolicy::default(),
            DEFAULT_MIN_FRAME_LEN,
            DEFAULT_MIN_CONFIDENCE,
            DEFAULT_TRIGGER_PIN,
        )
    }
}

//! Telemetry event catalog shared by firmware and host targets.
//!
//! Every observable step of a wake cycle emits one strongly typed event.
//! Events carry compact numeric payloads (confidence as permille, sizes as
//! plain integers) so they can be mirrored over diagnostics channels without
//! formatting machinery, and remain `no_std` compatible. Targets decide where
//! events go by implementing [`TelemetrySink`]; [`CycleRecorder`] offers a
//! bounded in-memory history for hosts that want to inspect a cycle after
//! the fact.

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::time::Instant;
use crate::wake::{WakeReason, WakeSourceSelection};

/// Number of records retained by the default cycle recorder.
pub const CYCLE_RECORDER_CAPACITY: usize = 32;

/// Discriminated events emitted across one wake cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// Wake reason resolved at process start.
    WakeObserved(WakeReason),
    /// Defensive re-check found an active suppression window.
    CooldownGate { remaining: Duration },
    /// Storage session opened.
    StorageMounted,
    /// Storage session could not be opened.
    StorageMountFailed,
    /// Imaging session initialized.
    ImagingReady,
    /// Imaging session could not be initialized.
    ImagingInitFailed,
    /// Stabilization sweep passed with the given quality count.
    StabilizationComplete { valid_frames: u8 },
    /// Stabilization sweep exhausted its budget below the minimum.
    StabilizationFailed { valid_frames: u8, budget: u8 },
    /// A frame of the given byte length was accepted.
    FrameCaptured { len: usize },
    /// Capture produced no usable frame.
    CaptureFailed,
    /// Detection finished; confidence reported as permille.
    DetectionComplete { detected: bool, confidence_pm: u16 },
    /// Notification handed to the transport.
    NotifyDelivered,
    /// Transport connect failed; the alert was abandoned.
    NotifyConnectFailed,
    /// Transport send failed after a successful connect.
    NotifySendFailed,
    /// Suppression window started.
    CooldownStarted { cooldown: Duration },
    /// Acquired hardware sessions released.
    ResourcesReleased,
    /// Wake source chosen for the imminent power-down.
    SleepPlanned(WakeSourceSelection),
}

impl TelemetryEventKind {
    /// Compact numeric code for diagnostics transports.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            TelemetryEventKind::WakeObserved(_) => 0x01,
            TelemetryEventKind::CooldownGate { .. } => 0x02,
            TelemetryEventKind::StorageMounted => 0x10,
            TelemetryEventKind::StorageMountFailed => 0x11,
            TelemetryEventKind::ImagingReady => 0x12,
            TelemetryEventKind::ImagingInitFailed => 0x13,
            TelemetryEventKind::StabilizationComplete { .. } => 0x14,
            TelemetryEventKind::StabilizationFailed { .. } => 0x15,
            TelemetryEventKind::FrameCaptured { .. } => 0x16,
            TelemetryEventKind::CaptureFailed => 0x17,
            TelemetryEventKind::DetectionComplete { .. } => 0x20,
            TelemetryEventKind::NotifyDelivered => 0x30,
            TelemetryEventKind::NotifyConnectFailed => 0x31,
            TelemetryEventKind::NotifySendFailed => 0x32,
            TelemetryEventKind::CooldownStarted { .. } => 0x40,
            TelemetryEventKind::ResourcesReleased => 0x41,
            TelemetryEventKind::SleepPlanned(_) => 0x42,
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::WakeObserved(reason) => write!(f, "wake-observed {reason}"),
            TelemetryEventKind::CooldownGate { remaining } => {
                write!(f, "cooldown-gate {}s remaining", remaining.as_secs())
            }
            TelemetryEventKind::StorageMounted => f.write_str("storage-mounted"),
            TelemetryEventKind::StorageMountFailed => f.write_str("storage-mount-failed"),
            TelemetryEventKind::ImagingReady => f.write_str("imaging-ready"),
            TelemetryEventKind::ImagingInitFailed => f.write_str("imaging-init-failed"),
            TelemetryEventKind::StabilizationComplete { valid_frames } => {
                write!(f, "stabilization-complete {valid_frames} valid")
            }
            TelemetryEventKind::StabilizationFailed {
                valid_frames,
                budget,
            } => write!(f, "stabilization-failed {valid_frames}/{budget} valid"),
            TelemetryEventKind::FrameCaptured { len } => write!(f, "frame-captured {len}B"),
            TelemetryEventKind::CaptureFailed => f.write_str("capture-failed"),
            TelemetryEventKind::DetectionComplete {
                detected,
                confidence_pm,
            } => write!(
                f,
                "detection-complete detected={detected} confidence={confidence_pm}pm"
            ),
            TelemetryEventKind::NotifyDelivered => f.write_str("notify-delivered"),
            TelemetryEventKind::NotifyConnectFailed => f.write_str("notify-connect-failed"),
            TelemetryEventKind::NotifySendFailed => f.write_str("notify-send-failed"),
            TelemetryEventKind::CooldownStarted { cooldown } => {
                write!(f, "cooldown-started {}s", cooldown.as_secs())
            }
            TelemetryEventKind::ResourcesReleased => f.write_str("resources-released"),
            TelemetryEventKind::SleepPlanned(selection) => {
                write!(f, "sleep-planned {selection}")
            }
        }
    }
}

/// Converts a `[0, 1]` confidence into the permille payload carried by
/// [`TelemetryEventKind::DetectionComplete`].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn confidence_permille(confidence: f32) -> u16 {
    (confidence.clamp(0.0, 1.0) * 1_000.0) as u16
}

/// Sink receiving events as a cycle progresses.
pub trait TelemetrySink {
    /// Records one event stamped with the monotonic reading it occurred at.
    fn record(&mut self, at: Instant, event: TelemetryEventKind);
}

/// Timestamped record kept by [`CycleRecorder`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub at: Instant,
    pub event: TelemetryEventKind,
}

/// Bounded recorder retaining the most recent events of a cycle.
pub struct CycleRecorder<const N: usize = CYCLE_RECORDER_CAPACITY> {
    records: HistoryBuf<TelemetryRecord, N>,
}

impl<const N: usize> CycleRecorder<N> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: HistoryBuf::new(),
        }
    }

    /// Iterates records oldest first.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.records.oldest_ordered()
    }

    /// Returns the most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.records.recent()
    }

    /// Number of records currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every retained record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<const N: usize> Default for CycleRecorder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TelemetrySink for CycleRecorder<N> {
    fn record(&mut self, at: Instant, event: TelemetryEventKind) {
        self.records.write(TelemetryRecord { at, event });
    }
}

/// Sink that drops every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&mut self, _: Instant, _: TelemetryEventKind) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_retains_newest_records() {
        let mut recorder: CycleRecorder<4> = CycleRecorder::new();
        for second in 0..6u64 {
            recorder.record(
                Instant::from_secs(second),
                TelemetryEventKind::StorageMounted,
            );
        }

        assert_eq!(recorder.len(), 4);
        let oldest = recorder.oldest_first().next().expect("recorder populated");
        assert_eq!(oldest.at, Instant::from_secs(2));
        assert_eq!(
            recorder.latest().expect("recorder populated").at,
            Instant::from_secs(5)
        );
    }

    #[test]
    fn confidence_permille_clamps_and_scales() {
        assert_eq!(confidence_permille(0.0), 0);
        assert_eq!(confidence_permille(0.5), 500);
        assert_eq!(confidence_permille(1.5), 1_000);
        assert_eq!(confidence_permille(-0.3), 0);
    }

    #[test]
    fn display_names_are_stable() {
        let mut rendered = heapless::String::<64>::new();
        core::fmt::write(
            &mut rendered,
            format_args!(
                "{}",
                TelemetryEventKind::StabilizationFailed {
                    valid_frames: 12,
                    budget: 25,
                }
            ),
        )
        .unwrap();
        assert_eq!(rendered.as_str(), "stabilization-failed 12/25 valid");
    }
}

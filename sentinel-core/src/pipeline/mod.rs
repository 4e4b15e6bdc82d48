//! Trigger-handling pipeline.
//!
//! One strictly ordered pass per trigger wake: re-check the cooldown, mount
//! storage, bring up imaging, stabilize exposure, capture a frame, run
//! detection, optionally notify, then release everything in reverse
//! acquisition order. Every acquired session is an ownership token returned
//! by its port and consumed by the matching release exactly once, on every
//! exit path. Failures short-circuit to release with no cooldown started, so
//! the node re-arms for an immediate retry on the next trigger.

use core::fmt;
use core::time::Duration;

use crate::config::SentinelConfig;
use crate::cooldown::{CooldownStore, RetainedCell};
use crate::telemetry::{TelemetryEventKind, TelemetrySink, confidence_permille};
use crate::time::{Clock, Delay};

/// Rectangle reported by the detector, pixel coordinates.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Outcome of one synchronous detection pass.
///
/// A negative is a legitimate result, not an error: the detector ran and saw
/// nothing worth reporting.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DetectionOutcome {
    pub detected: bool,
    pub confidence: f32,
    pub region: Option<Region>,
}

impl DetectionOutcome {
    /// The "nothing there" outcome.
    #[must_use]
    pub const fn negative() -> Self {
        Self {
            detected: false,
            confidence: 0.0,
            region: None,
        }
    }

    /// Returns `true` when the outcome is positive at or above `threshold`.
    #[must_use]
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.detected && self.confidence >= threshold
    }
}

/// Read-only view of a captured frame.
pub trait FrameData {
    /// Encoded byte length.
    fn len(&self) -> usize;

    /// Returns `true` for an empty frame.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel width.
    fn width(&self) -> u32;

    /// Pixel height.
    fn height(&self) -> u32;

    /// Encoded payload.
    fn bytes(&self) -> &[u8];
}

/// Storage capability holding the detection model assets.
pub trait StoragePort {
    /// Ownership token for a mounted session.
    type Session;
    /// Transport-specific failure detail.
    type Error;

    /// Opens the storage session.
    fn mount(&mut self) -> Result<Self::Session, Self::Error>;

    /// Closes the session, consuming its token.
    fn unmount(&mut self, session: Self::Session);
}

/// Imaging capability wrapping the sensing hardware.
pub trait ImagingPort {
    /// Ownership token for an initialized session.
    type Session;
    /// Captured frame handle.
    type Frame: FrameData;
    /// Hardware-specific failure detail.
    type Error;

    /// Powers up and configures the sensor.
    fn init(&mut self) -> Result<Self::Session, Self::Error>;

    /// Performs one discard-capture and reports whether it met quality.
    fn stabilize(&mut self, session: &mut Self::Session) -> bool;

    /// Takes one frame, or `None` when the hardware produced nothing usable.
    fn capture(&mut self, session: &mut Self::Session) -> Option<Self::Frame>;

    /// Returns a frame to the driver's buffer pool.
    fn release_frame(&mut self, session: &mut Self::Session, frame: Self::Frame);

    /// Powers the sensor down, consuming the session token.
    fn shutdown(&mut self, session: Self::Session);
}

/// Detection capability; blocks until the pass completes.
pub trait DetectionPort<F: FrameData> {
    /// Runs one synchronous detection pass over `frame`.
    fn detect(&mut self, frame: &F) -> DetectionOutcome;
}

/// Notification transport capability.
pub trait NotifyPort {
    /// Transport-specific failure detail.
    type Error;

    /// Brings the transport up.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Delivers the frame payload and detection details.
    fn send(&mut self, payload: &[u8], outcome: &DetectionOutcome) -> Result<(), Self::Error>;

    /// Tears the transport down.
    fn disconnect(&mut self);
}

/// Failure classes that end a cycle early.
///
/// Delivery failures are absent deliberately: notify is best-effort and never
/// changes the cycle outcome.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StageFailure {
    /// Storage session could not be opened.
    StorageMount,
    /// Imaging hardware failed to initialize.
    ImagingInit,
    /// Stabilization budget exhausted below the quality minimum.
    Stabilization { valid_frames: u8, budget: u8 },
    /// No usable frame was produced.
    Capture,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageFailure::StorageMount => f.write_str("storage mount failed"),
            StageFailure::ImagingInit => f.write_str("imaging init failed"),
            StageFailure::Stabilization {
                valid_frames,
                budget,
            } => write!(f, "stabilization failed ({valid_frames}/{budget} valid)"),
            StageFailure::Capture => f.write_str("capture failed"),
        }
    }
}

/// Result of one trigger-handling cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PipelineOutcome {
    /// The defensive re-check found an active suppression window; nothing
    /// was acquired and nothing needs releasing.
    Suppressed { remaining: Duration },
    /// The pipeline ran through the decision stage.
    Completed {
        outcome: DetectionOutcome,
        notified: bool,
        cooldown_started: bool,
    },
    /// A stage failed; resources were released and no cooldown started.
    Failed(StageFailure),
}

/// Verdict carried out of the imaging stages.
struct Decision {
    outcome: DetectionOutcome,
    notified: bool,
    cooldown_started: bool,
}

/// Drives the ordered trigger-handling workflow over the injected ports.
///
/// The sequencer owns no hardware itself; it borrows each capability for the
/// duration of one cycle and guarantees that every session it opens is closed
/// before [`run`](Self::run) returns.
pub struct PipelineSequencer<'a, S, I, D, N, DL, T>
where
    S: StoragePort,
    I: ImagingPort,
    D: DetectionPort<I::Frame>,
    N: NotifyPort,
    DL: Delay,
    T: TelemetrySink,
{
    storage: &'a mut S,
    imaging: &'a mut I,
    detector: &'a mut D,
    notifier: &'a mut N,
    delay: &'a mut DL,
    telemetry: &'a mut T,
    config: &'a SentinelConfig,
}

impl<'a, S, I, D, N, DL, T> PipelineSequencer<'a, S, I, D, N, DL, T>
where
    S: StoragePort,
    I: ImagingPort,
    D: DetectionPort<I::Frame>,
    N: NotifyPort,
    DL: Delay,
    T: TelemetrySink,
{
    /// Borrows the capabilities for one cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: &'a mut S,
        imaging: &'a mut I,
        detector: &'a mut D,
        notifier: &'a mut N,
        delay: &'a mut DL,
        telemetry: &'a mut T,
        config: &'a SentinelConfig,
    ) -> Self {
        Self {
            storage,
            imaging,
            detector,
            notifier,
            delay,
            telemetry,
            config,
        }
    }

    /// Runs one trigger-handling cycle to completion.
    pub fn run<R: RetainedCell, C: Clock>(
        &mut self,
        store: &mut CooldownStore<R>,
        clock: &C,
    ) -> PipelineOutcome {
        let now = clock.now();

        // Defensive re-check: a trigger can race an already-armed cooldown
        // timer. Abort before touching any hardware.
        if store.is_cooling_down(now) {
            let remaining = store.remaining(now);
            self.telemetry
                .record(now, TelemetryEventKind::CooldownGate { remaining });
            return PipelineOutcome::Suppressed { remaining };
        }

        let storage_session = match self.storage.mount() {
            Ok(session) => {
                self.telemetry
                    .record(clock.now(), TelemetryEventKind::StorageMounted);
                session
            }
            Err(_) => {
                self.telemetry
                    .record(clock.now(), TelemetryEventKind::StorageMountFailed);
                return PipelineOutcome::Failed(StageFailure::StorageMount);
            }
        };

        let verdict = match self.imaging.init() {
            Ok(mut imaging_session) => {
                self.telemetry
                    .record(clock.now(), TelemetryEventKind::ImagingReady);
                let verdict = self.detect_and_decide(&mut imaging_session, store, clock);
                self.imaging.shutdown(imaging_session);
                verdict
            }
            Err(_) => {
                self.telemetry
                    .record(clock.now(), TelemetryEventKind::ImagingInitFailed);
                Err(StageFailure::ImagingInit)
            }
        };

        // Reverse acquisition order: imaging went down above, storage last.
        self.storage.unmount(storage_session);
        self.telemetry
            .record(clock.now(), TelemetryEventKind::ResourcesReleased);

        match verdict {
            Ok(decision) => PipelineOutcome::Completed {
                outcome: decision.outcome,
                notified: decision.notified,
                cooldown_started: decision.cooldown_started,
            },
            Err(failure) => PipelineOutcome::Failed(failure),
        }
    }

    /// Stages that need a live imaging session: stabilize, capture, detect,
    /// decide. The caller owns the session token and releases it regardless
    /// of what this returns.
    fn detect_and_decide<R: RetainedCell, C: Clock>(
        &mut self,
        session: &mut I::Session,
        store: &mut CooldownStore<R>,
        clock: &C,
    ) -> Result<Decision, StageFailure> {
        let policy = self.config.stabilize;

        // Full discard budget every time; the sensor needs the settling
        // iterations even when early frames already look good.
        let mut valid_frames: u8 = 0;
        for _ in 0..policy.budget {
            if self.imaging.stabilize(session) {
                valid_frames += 1;
            }
            self.delay.sleep(policy.frame_delay);
        }
        if !policy.met_by(valid_frames) {
            self.telemetry.record(
                clock.now(),
                TelemetryEventKind::StabilizationFailed {
                    valid_frames,
                    budget: policy.budget,
                },
            );
            return Err(StageFailure::Stabilization {
                valid_frames,
                budget: policy.budget,
            });
        }
        self.telemetry.record(
            clock.now(),
            TelemetryEventKind::StabilizationComplete { valid_frames },
        );

        let frame = match self.imaging.capture(session) {
            Some(frame) => frame,
            None => {
                self.telemetry
                    .record(clock.now(), TelemetryEventKind::CaptureFailed);
                return Err(StageFailure::Capture);
            }
        };
        if frame.len() < self.config.min_frame_len {
            // Undersized frames go back to the pool before the stage fails.
            self.imaging.release_frame(session, frame);
            self.telemetry
                .record(clock.now(), TelemetryEventKind::CaptureFailed);
            return Err(StageFailure::Capture);
        }
        self.telemetry.record(
            clock.now(),
            TelemetryEventKind::FrameCaptured { len: frame.len() },
        );

        // Synchronous by design: nothing else runs while inference holds
        // the only thread.
        let outcome = self.detector.detect(&frame);
        self.telemetry.record(
            clock.now(),
            TelemetryEventKind::DetectionComplete {
                detected: outcome.detected,
                confidence_pm: confidence_permille(outcome.confidence),
            },
        );

        let mut notified = false;
        let mut cooldown_started = false;
        if outcome.is_confident(self.config.min_confidence) {
            notified = self.deliver_alert(&frame, &outcome, clock);
            // Best-effort notify, guaranteed suppression: the window starts
            // whether or not the alert got out.
            store.start(clock.now(), self.config.cooldown);
            self.telemetry.record(
                clock.now(),
                TelemetryEventKind::CooldownStarted {
                    cooldown: self.config.cooldown,
                },
            );
            cooldown_started = true;
        }

        self.imaging.release_frame(session, frame);
        Ok(Decision {
            outcome,
            notified,
            cooldown_started,
        })
    }

    /// Connect, send, disconnect. Returns `true` when the payload went out.
    fn deliver_alert<C: Clock>(
        &mut self,
        frame: &I::Frame,
        outcome: &DetectionOutcome,
        clock: &C,
    ) -> bool {
        match self.notifier.connect() {
            Ok(()) => {
                let delivered = self.notifier.send(frame.bytes(), outcome).is_ok();
                let event = if delivered {
                    TelemetryEventKind::NotifyDelivered
                } else {
                    TelemetryEventKind::NotifySendFailed
                };
                self.telemetry.record(clock.now(), event);
                self.notifier.disconnect();
                delivered
            }
            Err(_) => {
                self.telemetry
                    .record(clock.now(), TelemetryEventKind::NotifyConnectFailed);
                false
            }
        }
    }
}

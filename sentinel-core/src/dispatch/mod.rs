//! Top-level wake dispatcher.
//!
//! Runs once per process lifetime: take the classified wake reason, run the
//! matching branch, then hand the chosen wake source to the power-down
//! primitive. Power-down never returns and every sleeping state is re-entered
//! through a full restart, so the dispatcher is a straight-line state-machine
//! driver rather than a loop.

use crate::config::SentinelConfig;
use crate::cooldown::{self, CooldownStore, RetainedCell};
use crate::pipeline::{
    DetectionPort, ImagingPort, NotifyPort, PipelineOutcome, PipelineSequencer, StoragePort,
};
use crate::telemetry::{TelemetryEventKind, TelemetrySink};
use crate::time::{Clock, Delay};
use crate::wake::{WakeReason, WakeSourceSelection};

/// Platform power primitive: arms exactly one wake source and cuts power.
pub trait PowerControl {
    /// Terminal. Implementations must not return control.
    fn power_down(&mut self, selection: WakeSourceSelection) -> !;
}

/// Summary of one completed wake cycle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CycleReport {
    /// Reason the cycle ran.
    pub reason: WakeReason,
    /// Pipeline result when the cycle was a trigger wake.
    pub pipeline: Option<PipelineOutcome>,
    /// Wake source to arm before power-down.
    pub selection: WakeSourceSelection,
}

/// Owns the capability borrows for one process lifetime and routes the wake.
pub struct Dispatcher<'a, S, I, D, N, DL, C, T>
where
    S: StoragePort,
    I: ImagingPort,
    D: DetectionPort<I::Frame>,
    N: NotifyPort,
    DL: Delay,
    C: Clock,
    T: TelemetrySink,
{
    storage: &'a mut S,
    imaging: &'a mut I,
    detector: &'a mut D,
    notifier: &'a mut N,
    delay: &'a mut DL,
    clock: &'a C,
    telemetry: &'a mut T,
    config: &'a SentinelConfig,
}

impl<'a, S, I, D, N, DL, C, T> Dispatcher<'a, S, I, D, N, DL, C, T>
where
    S: StoragePort,
    I: ImagingPort,
    D: DetectionPort<I::Frame>,
    N: NotifyPort,
    DL: Delay,
    C: Clock,
    T: TelemetrySink,
{
    /// Borrows the capabilities for the process lifetime.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: &'a mut S,
        imaging: &'a mut I,
        detector: &'a mut D,
        notifier: &'a mut N,
        delay: &'a mut DL,
        clock: &'a C,
        telemetry: &'a mut T,
        config: &'a SentinelConfig,
    ) -> Self {
        Self {
            storage,
            imaging,
            detector,
            notifier,
            delay,
            clock,
            telemetry,
            config,
        }
    }

    /// Runs one wake cycle and reports the wake source to arm.
    ///
    /// Split from [`dispatch`](Self::dispatch) so hosts and tests can observe
    /// the plan without diverging control flow.
    pub fn run_cycle<R: RetainedCell>(
        &mut self,
        reason: WakeReason,
        store: &mut CooldownStore<R>,
    ) -> CycleReport {
        self.telemetry
            .record(self.clock.now(), TelemetryEventKind::WakeObserved(reason));

        let pipeline = match reason {
            WakeReason::PowerOn => {
                // Cold boot: give the trigger sensor its settling time before
                // the first arming.
                self.delay.sleep(self.config.sensor_warmup);
                None
            }
            // Cooldown elapsed; nothing to do beyond re-arming below.
            WakeReason::TimerExpired => None,
            // Defensive fallback: no action, straight to power-down.
            WakeReason::Unknown => None,
            WakeReason::Trigger => {
                let mut sequencer = PipelineSequencer::new(
                    &mut *self.storage,
                    &mut *self.imaging,
                    &mut *self.detector,
                    &mut *self.notifier,
                    &mut *self.delay,
                    &mut *self.telemetry,
                    self.config,
                );
                Some(sequencer.run(store, self.clock))
            }
        };

        let now = self.clock.now();
        let selection = cooldown::select_wake_source(store, now, self.config.trigger_pin);
        self.telemetry
            .record(now, TelemetryEventKind::SleepPlanned(selection));

        CycleReport {
            reason,
            pipeline,
            selection,
        }
    }

    /// Runs one wake cycle and transfers control to the power primitive.
    pub fn dispatch<R: RetainedCell, P: PowerControl>(
        &mut self,
        reason: WakeReason,
        store: &mut CooldownStore<R>,
        power: &mut P,
    ) -> ! {
        let report = self.run_cycle(reason, store);
        power.power_down(report.selection)
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::*;
    use crate::cooldown::COOLDOWN_RECORD_LEN;
    use crate::pipeline::{DetectionOutcome, FrameData};
    use crate::telemetry::NullSink;
    use crate::time::Instant;

    struct FixedClock(Instant);

    impl Clock for FixedClock {
        fn now(&self) -> Instant {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        slept: Option<Duration>,
    }

    impl Delay for RecordingDelay {
        fn sleep(&mut self, duration: Duration) {
            self.slept = Some(duration);
        }
    }

    #[derive(Default)]
    struct MemoryCell {
        bytes: [u8; COOLDOWN_RECORD_LEN],
    }

    impl RetainedCell for MemoryCell {
        fn load(&mut self) -> [u8; COOLDOWN_RECORD_LEN] {
            self.bytes
        }

        fn store(&mut self, record: &[u8; COOLDOWN_RECORD_LEN]) {
            self.bytes = *record;
        }
    }

    struct IdleStorage {
        mounts: usize,
    }

    impl StoragePort for IdleStorage {
        type Session = ();
        type Error = ();

        fn mount(&mut self) -> Result<(), ()> {
            self.mounts += 1;
            Ok(())
        }

        fn unmount(&mut self, _: ()) {}
    }

    struct NoFrame;

    impl FrameData for NoFrame {
        fn len(&self) -> usize {
            0
        }

        fn width(&self) -> u32 {
            0
        }

        fn height(&self) -> u32 {
            0
        }

        fn bytes(&self) -> &[u8] {
            &[]
        }
    }

    struct IdleImaging;

    impl ImagingPort for IdleImaging {
        type Session = ();
        type Frame = NoFrame;
        type Error = ();

        fn init(&mut self) -> Result<(), ()> {
            Err(())
        }

        fn stabilize(&mut self, _: &mut ()) -> bool {
            false
        }

        fn capture(&mut self, _: &mut ()) -> Option<NoFrame> {
            None
        }

        fn release_frame(&mut self, _: &mut (), _: NoFrame) {}

        fn shutdown(&mut self, _: ()) {}
    }

    struct IdleDetector;

    impl DetectionPort<NoFrame> for IdleDetector {
        fn detect(&mut self, _: &NoFrame) -> DetectionOutcome {
            DetectionOutcome::negative()
        }
    }

    struct IdleNotifier;

    impl NotifyPort for IdleNotifier {
        type Error = ();

        fn connect(&mut self) -> Result<(), ()> {
            Err(())
        }

        fn send(&mut self, _: &[u8], _: &DetectionOutcome) -> Result<(), ()> {
            Err(())
        }

        fn disconnect(&mut self) {}
    }

    struct Rig {
        storage: IdleStorage,
        imaging: IdleImaging,
        detector: IdleDetector,
        notifier: IdleNotifier,
        delay: RecordingDelay,
        telemetry: NullSink,
        config: SentinelConfig,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                storage: IdleStorage { mounts: 0 },
                imaging: IdleImaging,
                detector: IdleDetector,
                notifier: IdleNotifier,
                delay: RecordingDelay::default(),
                telemetry: NullSink,
                config: SentinelConfig::default(),
            }
        }

        fn run(
            &mut self,
            reason: WakeReason,
            store: &mut CooldownStore<MemoryCell>,
            now: Instant,
        ) -> CycleReport {
            let clock = FixedClock(now);
            let mut dispatcher = Dispatcher::new(
                &mut self.storage,
                &mut self.imaging,
                &mut self.detector,
                &mut self.notifier,
                &mut self.delay,
                &clock,
                &mut self.telemetry,
                &self.config,
            );
            dispatcher.run_cycle(reason, store)
        }
    }

    #[test]
    fn power_on_warms_up_then_arms_level_wake() {
        let mut store = CooldownStore::load(MemoryCell::default());
        let mut rig = Rig::new();

        let report = rig.run(WakeReason::PowerOn, &mut store, Instant::from_secs(0));

        assert_eq!(rig.delay.slept, Some(rig.config.sensor_warmup));
        assert_eq!(report.pipeline, None);
        assert_eq!(
            report.selection,
            WakeSourceSelection::LevelWake(rig.config.trigger_pin)
        );
        assert_eq!(rig.storage.mounts, 0);
    }

    #[test]
    fn unknown_reason_takes_no_action() {
        let mut store = CooldownStore::load(MemoryCell::default());
        let mut rig = Rig::new();

        let report = rig.run(WakeReason::Unknown, &mut store, Instant::from_secs(9));

        assert_eq!(report.pipeline, None);
        assert_eq!(rig.delay.slept, None);
        assert_eq!(rig.storage.mounts, 0);
        assert_eq!(
            report.selection,
            WakeSourceSelection::LevelWake(rig.config.trigger_pin)
        );
    }

    #[test]
    fn timer_expiry_rearms_the_trigger() {
        let mut store = CooldownStore::load(MemoryCell::default());
        store.start(Instant::from_secs(0), Duration::from_secs(100));
        let mut rig = Rig::new();

        // Woken exactly when the window lapses: not cooling down any more.
        let report = rig.run(
            WakeReason::TimerExpired,
            &mut store,
            Instant::from_secs(100),
        );

        assert_eq!(report.pipeline, None);
        assert_eq!(
            report.selection,
            WakeSourceSelection::LevelWake(rig.config.trigger_pin)
        );
    }

    #[test]
    fn trigger_runs_the_pipeline() {
        let mut store = CooldownStore::load(MemoryCell::default());
        let mut rig = Rig::new();

        let report = rig.run(WakeReason::Trigger, &mut store, Instant::from_secs(5));

        // IdleImaging refuses init, so the run fails after mounting storage.
        assert_eq!(rig.storage.mounts, 1);
        assert!(matches!(report.pipeline, Some(PipelineOutcome::Failed(_))));
        assert_eq!(
            report.selection,
            WakeSourceSelection::LevelWake(rig.config.trigger_pin)
        );
    }

    #[test]
    fn every_reason_arms_exactly_one_source() {
        for reason in [
            WakeReason::PowerOn,
            WakeReason::Trigger,
            WakeReason::TimerExpired,
            WakeReason::Unknown,
        ] {
            let mut store = CooldownStore::load(MemoryCell::default());
            let mut rig = Rig::new();
            let report = rig.run(reason, &mut store, Instant::from_secs(3));
            match report.selection {
                WakeSourceSelection::LevelWake(_) | WakeSourceSelection::TimerWake(_) => {}
            }
        }
    }
}

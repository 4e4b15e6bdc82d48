//! Simulated collaborators shared by the integration suites.
//!
//! The rig models the node faithfully enough to replay whole wake cycles on
//! the host: a free-running clock that only advances when the device sleeps
//! or pauses, a retained cell that outlives simulated restarts, and counting
//! port implementations with per-stage fault injection.

// Not every suite touches every helper.
#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use core::time::Duration;

use sentinel_core::config::SentinelConfig;
use sentinel_core::cooldown::{COOLDOWN_RECORD_LEN, CooldownStore, RetainedCell};
use sentinel_core::dispatch::{CycleReport, Dispatcher};
use sentinel_core::pipeline::{
    DetectionOutcome, DetectionPort, FrameData, ImagingPort, NotifyPort, Region, StoragePort,
};
use sentinel_core::telemetry::CycleRecorder;
use sentinel_core::time::{Clock, Delay, Instant};
use sentinel_core::wake::WakeReason;

pub static GOOD_FRAME: [u8; 4_096] = [0xC3; 4_096];
pub static RUNT_FRAME: [u8; 100] = [0x3C; 100];

/// Retained region handle that survives simulated restarts.
#[derive(Clone, Default)]
pub struct SharedCell(Rc<Cell<[u8; COOLDOWN_RECORD_LEN]>>);

impl SharedCell {
    pub fn snapshot(&self) -> [u8; COOLDOWN_RECORD_LEN] {
        self.0.get()
    }
}

impl RetainedCell for SharedCell {
    fn load(&mut self) -> [u8; COOLDOWN_RECORD_LEN] {
        self.0.get()
    }

    fn store(&mut self, record: &[u8; COOLDOWN_RECORD_LEN]) {
        self.0.set(*record);
    }
}

/// Free-running counter shared by the clock and the delay capability.
#[derive(Clone, Default)]
pub struct Counter(Rc<Cell<u64>>);

impl Counter {
    pub fn advance(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.0.set(self.0.get().saturating_add(micros));
    }

    pub fn now(&self) -> Instant {
        Instant::from_micros(self.0.get())
    }
}

pub struct SimClock(pub Counter);

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.0.now()
    }
}

/// Delay that advances the shared counter instead of blocking.
pub struct SimDelay(pub Counter);

impl Delay for SimDelay {
    fn sleep(&mut self, duration: Duration) {
        self.0.advance(duration);
    }
}

#[derive(Default)]
pub struct SimStorage {
    pub fail_mount: bool,
    pub mounts: usize,
    pub unmounts: usize,
}

pub struct StorageSession;

impl StoragePort for SimStorage {
    type Session = StorageSession;
    type Error = ();

    fn mount(&mut self) -> Result<StorageSession, ()> {
        if self.fail_mount {
            return Err(());
        }
        self.mounts += 1;
        Ok(StorageSession)
    }

    fn unmount(&mut self, _: StorageSession) {
        self.unmounts += 1;
    }
}

pub struct SimFrame {
    data: &'static [u8],
}

impl FrameData for SimFrame {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn width(&self) -> u32 {
        1_280
    }

    fn height(&self) -> u32 {
        1_024
    }

    fn bytes(&self) -> &[u8] {
        self.data
    }
}

pub struct SimImaging {
    pub fail_init: bool,
    pub valid_per_sweep: u8,
    pub capture: Option<&'static [u8]>,
    pub inits: usize,
    pub shutdowns: usize,
    pub frames_released: usize,
    stabilize_calls: u8,
}

impl Default for SimImaging {
    fn default() -> Self {
        Self {
            fail_init: false,
            valid_per_sweep: 25,
            capture: Some(&GOOD_FRAME),
            inits: 0,
            shutdowns: 0,
            frames_released: 0,
            stabilize_calls: 0,
        }
    }
}

pub struct ImagingSession;

impl ImagingPort for SimImaging {
    type Session = ImagingSession;
    type Frame = SimFrame;
    type Error = ();

    fn init(&mut self) -> Result<ImagingSession, ()> {
        if self.fail_init {
            return Err(());
        }
        self.inits += 1;
        self.stabilize_calls = 0;
        Ok(ImagingSession)
    }

    fn stabilize(&mut self, _: &mut ImagingSession) -> bool {
        let valid = self.stabilize_calls < self.valid_per_sweep;
        self.stabilize_calls = self.stabilize_calls.saturating_add(1);
        valid
    }

    fn capture(&mut self, _: &mut ImagingSession) -> Option<SimFrame> {
        self.capture.map(|data| SimFrame { data })
    }

    fn release_frame(&mut self, _: &mut ImagingSession, _: SimFrame) {
        self.frames_released += 1;
    }

    fn shutdown(&mut self, _: ImagingSession) {
        self.shutdowns += 1;
    }
}

pub struct SimDetector {
    pub outcome: DetectionOutcome,
    pub calls: usize,
}

impl SimDetector {
    pub fn negative() -> Self {
        Self {
            outcome: DetectionOutcome::negative(),
            calls: 0,
        }
    }

    pub fn confident(confidence: f32) -> Self {
        Self {
            outcome: DetectionOutcome {
                detected: true,
                confidence,
                region: Some(Region {
                    x: 96,
                    y: 64,
                    width: 240,
                    height: 420,
                }),
            },
            calls: 0,
        }
    }
}

impl DetectionPort<SimFrame> for SimDetector {
    fn detect(&mut self, _: &SimFrame) -> DetectionOutcome {
        self.calls += 1;
        self.outcome
    }
}

#[derive(Default)]
pub struct SimNotifier {
    pub fail_connect: bool,
    pub fail_send: bool,
    pub connects: usize,
    pub sends: usize,
    pub disconnects: usize,
}

impl NotifyPort for SimNotifier {
    type Error = ();

    fn connect(&mut self) -> Result<(), ()> {
        if self.fail_connect {
            return Err(());
        }
        self.connects += 1;
        Ok(())
    }

    fn send(&mut self, _: &[u8], _: &DetectionOutcome) -> Result<(), ()> {
        if self.fail_send {
            return Err(());
        }
        self.sends += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

/// One simulated node plus the retained cell and counter that outlive it.
pub struct SimNode {
    pub counter: Counter,
    pub cell: SharedCell,
    pub storage: SimStorage,
    pub imaging: SimImaging,
    pub detector: SimDetector,
    pub notifier: SimNotifier,
    pub telemetry: CycleRecorder,
    pub config: SentinelConfig,
}

impl SimNode {
    pub fn new() -> Self {
        Self::with_detector(SimDetector::negative())
    }

    pub fn with_detector(detector: SimDetector) -> Self {
        Self {
            counter: Counter::default(),
            cell: SharedCell::default(),
            storage: SimStorage::default(),
            imaging: SimImaging::default(),
            detector,
            notifier: SimNotifier::default(),
            telemetry: CycleRecorder::new(),
            config: SentinelConfig::default(),
        }
    }

    /// Runs one wake cycle the way a restart would: state reloaded from the
    /// retained cell, everything else rebuilt from nothing.
    pub fn wake(&mut self, reason: WakeReason) -> CycleReport {
        let clock = SimClock(self.counter.clone());
        let mut delay = SimDelay(self.counter.clone());
        let mut store = CooldownStore::load(self.cell.clone());
        let mut dispatcher = Dispatcher::new(
            &mut self.storage,
            &mut self.imaging,
            &mut self.detector,
            &mut self.notifier,
            &mut delay,
            &clock,
            &mut self.telemetry,
            &self.config,
        );
        dispatcher.run_cycle(reason, &mut store)
    }

    pub fn now(&self) -> Instant {
        self.counter.now()
    }
}

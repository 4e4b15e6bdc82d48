//! Emulated sentinel node driven from the console.
//!
//! The session models exactly what survives a real power-down: the retained
//! cooldown record and the free-running counter. Everything else (storage,
//! imaging, detector, notifier) is rebuilt from scratch for every wake, the
//! way the firmware rebuilds it after a restart. Faults injected from the
//! console decide how each rebuilt collaborator behaves.

use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use core::time::Duration;

use sentinel_core::config::SentinelConfig;
use sentinel_core::cooldown::{COOLDOWN_RECORD_LEN, CooldownStore, RetainedCell};
use sentinel_core::dispatch::Dispatcher;
use sentinel_core::pipeline::{
    DetectionOutcome, DetectionPort, FrameData, ImagingPort, NotifyPort, Region, StoragePort,
};
use sentinel_core::telemetry::CycleRecorder;
use sentinel_core::time::{Clock, Delay, Instant};
use sentinel_core::wake::{WakeReason, WakeSourceSelection};

use crate::commands::{Command, Subsystem, parse_line};

/// Simulated JPEG payload handed to capture.
static FRAME_PAYLOAD: [u8; 8_192] = [0xD9; 8_192];
/// Undersized payload produced while the capture fault is active.
static RUNT_PAYLOAD: [u8; 128] = [0x00; 128];

/// Free-running microsecond counter surviving simulated power-downs.
#[derive(Clone, Default)]
struct Counter(Rc<Cell<u64>>);

impl Counter {
    fn now(&self) -> Instant {
        Instant::from_micros(self.0.get())
    }

    fn advance(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.0.set(self.0.get().saturating_add(micros));
    }

    fn advance_to(&self, target: Instant) {
        if target.as_micros() > self.0.get() {
            self.0.set(target.as_micros());
        }
    }

    fn reset(&self) {
        self.0.set(0);
    }
}

struct SimClock(Counter);

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.0.now()
    }
}

struct SimDelay(Counter);

impl Delay for SimDelay {
    fn sleep(&mut self, duration: Duration) {
        self.0.advance(duration);
    }
}

/// Retained region handle surviving simulated restarts.
#[derive(Clone, Default)]
struct RetainedRegion(Rc<Cell<[u8; COOLDOWN_RECORD_LEN]>>);

impl RetainedRegion {
    fn wipe(&self) {
        self.0.set([0u8; COOLDOWN_RECORD_LEN]);
    }
}

impl RetainedCell for RetainedRegion {
    fn load(&mut self) -> [u8; COOLDOWN_RECORD_LEN] {
        self.0.get()
    }

    fn store(&mut self, record: &[u8; COOLDOWN_RECORD_LEN]) {
        self.0.set(*record);
    }
}

/// Fault toggles applied to freshly built collaborators.
#[derive(Copy, Clone, Debug, Default)]
struct FaultFlags {
    storage: bool,
    imaging: bool,
    stabilize: bool,
    capture: bool,
    connect: bool,
    send: bool,
}

struct SimStorage {
    fail: bool,
}

struct StorageSession;

impl StoragePort for SimStorage {
    type Session = StorageSession;
    type Error = ();

    fn mount(&mut self) -> Result<StorageSession, ()> {
        if self.fail { Err(()) } else { Ok(StorageSession) }
    }

    fn unmount(&mut self, _: StorageSession) {}
}

struct SimFrame {
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

struct SimImaging {
    fail_init: bool,
    valid_per_sweep: u8,
    payload: &'static [u8],
    stabilize_calls: u8,
}

struct ImagingSession;

impl ImagingPort for SimImaging {
    type Session = ImagingSession;
    type Frame = SimFrame;
    type Error = ();

    fn init(&mut self) -> Result<ImagingSession, ()> {
        if self.fail_init {
            Err(())
        } else {
            Ok(ImagingSession)
        }
    }

    fn stabilize(&mut self, _: &mut ImagingSession) -> bool {
        let valid = self.stabilize_calls < self.valid_per_sweep;
        self.stabilize_calls = self.stabilize_calls.saturating_add(1);
        valid
    }

    fn capture(&mut self, _: &mut ImagingSession) -> Option<SimFrame> {
        Some(SimFrame { data: self.payload })
    }

    fn release_frame(&mut self, _: &mut ImagingSession, _: SimFrame) {}

    fn shutdown(&mut self, _: ImagingSession) {}
}

struct SimDetector {
    outcome: DetectionOutcome,
}

impl DetectionPort<SimFrame> for SimDetector {
    fn detect(&mut self, _: &SimFrame) -> DetectionOutcome {
        self.outcome
    }
}

struct SimNotifier {
    fail_connect: bool,
    fail_send: bool,
    delivered: bool,
}

impl NotifyPort for SimNotifier {
    type Error = ();

    fn connect(&mut self) -> Result<(), ()> {
        if self.fail_connect { Err(()) } else { Ok(()) }
    }

    fn send(&mut self, _: &[u8], _: &DetectionOutcome) -> Result<(), ()> {
        if self.fail_send {
            Err(())
        } else {
            self.delivered = true;
            Ok(())
        }
    }

    fn disconnect(&mut self) {}
}

/// Where the emulated device currently sits.
#[derive(Copy, Clone, Debug, PartialEq)]
enum DeviceState {
    /// No power applied yet; `boot` starts the simulation.
    Unpowered,
    /// Asleep with exactly one wake source armed.
    Asleep {
        armed: WakeSourceSelection,
        since: Instant,
    },
}

/// Appends console exchanges to a transcript file.
struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "Sentinel emulator transcript")?;
        Ok(Self { writer })
    }

    fn log_exchange(&mut self, input: &str, responses: &[String]) -> io::Result<()> {
        writeln!(self.writer, "> {input}")?;
        for line in responses {
            writeln!(self.writer, "{line}")?;
        }
        self.writer.flush()
    }
}

/// Interactive emulator session.
pub struct Session {
    counter: Counter,
    retained: RetainedRegion,
    config: SentinelConfig,
    faults: FaultFlags,
    next_outcome: DetectionOutcome,
    device: DeviceState,
    transcript: Option<TranscriptLogger>,
    cycles: usize,
    alerts_delivered: usize,
    triggers_ignored: usize,
}

impl Session {
    /// Creates a session, optionally logging exchanges to `transcript`.
    pub fn new(transcript: Option<&Path>) -> io::Result<Self> {
        let transcript = transcript.map(TranscriptLogger::create).transpose()?;
        Ok(Self {
            counter: Counter::default(),
            retained: RetainedRegion::default(),
            config: SentinelConfig::default(),
            faults: FaultFlags::default(),
            next_outcome: DetectionOutcome::negative(),
            device: DeviceState::Unpowered,
            transcript,
            cycles: 0,
            alerts_delivered: 0,
            triggers_ignored: 0,
        })
    }

    /// Handles one console line and returns the response lines.
    pub fn handle_command(&mut self, input: &str) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        match parse_line(input) {
            Ok(command) => self.execute(command, &mut lines),
            Err(message) => {
                lines.push(message);
                lines.push("type `help` for the command list".to_string());
            }
        }
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.log_exchange(input, &lines)?;
        }
        Ok(lines)
    }

    fn execute(&mut self, command: Command, lines: &mut Vec<String>) {
        match command {
            Command::Boot => {
                // Total power loss: counter restarts and the retained region
                // comes up zeroed.
                self.counter.reset();
                self.retained.wipe();
                lines.push("cold boot: retained region zeroed".to_string());
                self.run_device_cycle(WakeReason::PowerOn, lines);
            }
            Command::Trigger => self.handle_trigger(lines),
            Command::Advance(duration) => self.handle_advance(duration, lines),
            Command::Status => self.render_status(lines),
            Command::Fail(subsystem, enabled) => {
                let flag = match subsystem {
                    Subsystem::Storage => &mut self.faults.storage,
                    Subsystem::Imaging => &mut self.faults.imaging,
                    Subsystem::Stabilize => &mut self.faults.stabilize,
                    Subsystem::Capture => &mut self.faults.capture,
                    Subsystem::Connect => &mut self.faults.connect,
                    Subsystem::Send => &mut self.faults.send,
                };
                *flag = enabled;
                lines.push(format!(
                    "fault {:?} {}",
                    subsystem,
                    if enabled { "armed" } else { "cleared" }
                ));
            }
            Command::Detect(confidence) => {
                self.next_outcome = match confidence {
                    Some(confidence) => DetectionOutcome {
                        detected: true,
                        confidence,
                        region: Some(Region {
                            x: 96,
                            y: 64,
                            width: 240,
                            height: 420,
                        }),
                    },
                    None => DetectionOutcome::negative(),
                };
                lines.push(format!("next detection: {:?}", self.next_outcome));
            }
            Command::Help => {
                for line in crate::commands::HELP_LINES {
                    lines.push((*line).to_string());
                }
            }
        }
    }

    fn handle_trigger(&mut self, lines: &mut Vec<String>) {
        match self.device {
            DeviceState::Unpowered => {
                lines.push("no power applied; `boot` first".to_string());
            }
            DeviceState::Asleep {
                armed: WakeSourceSelection::LevelWake(_),
                ..
            } => {
                lines.push("motion on trigger input; waking".to_string());
                self.run_device_cycle(WakeReason::Trigger, lines);
            }
            DeviceState::Asleep {
                armed: WakeSourceSelection::TimerWake(_),
                ..
            } => {
                // The input is electrically disarmed while the timer is the
                // wake source; the event never reaches the device.
                self.triggers_ignored += 1;
                lines.push("trigger ignored: level-wake disarmed during cooldown".to_string());
            }
        }
    }

    fn handle_advance(&mut self, duration: Duration, lines: &mut Vec<String>) {
        let target = self.counter.now() + duration;
        loop {
            let deadline = match self.device {
                DeviceState::Asleep {
                    armed: WakeSourceSelection::TimerWake(window),
                    since,
                } => Some(since + window),
                _ => None,
            };
            match deadline {
                Some(deadline) if deadline <= target => {
                    self.counter.advance_to(deadline);
                    lines.push(format!("wake timer elapsed at {deadline}"));
                    self.run_device_cycle(WakeReason::TimerExpired, lines);
                    if self.counter.now() >= target {
                        break;
                    }
                }
                _ => {
                    self.counter.advance_to(target);
                    break;
                }
            }
        }
        lines.push(format!("time is now {}", self.counter.now()));
    }

    /// One process lifetime: reload the store, rebuild every collaborator,
    /// dispatch, then fall asleep with the reported wake source armed.
    fn run_device_cycle(&mut self, reason: WakeReason, lines: &mut Vec<String>) {
        let clock = SimClock(self.counter.clone());
        let mut delay = SimDelay(self.counter.clone());
        let mut store = CooldownStore::load(self.retained.clone());

        let mut storage = SimStorage {
            fail: self.faults.storage,
        };
        let mut imaging = SimImaging {
            fail_init: self.faults.imaging,
            valid_per_sweep: if self.faults.stabilize {
                self.config.stabilize.min_valid.saturating_sub(1)
            } else {
                self.config.stabilize.budget
            },
            payload: if self.faults.capture {
                &RUNT_PAYLOAD
            } else {
                &FRAME_PAYLOAD
            },
            stabilize_calls: 0,
        };
        let mut detector = SimDetector {
            outcome: self.next_outcome,
        };
        let mut notifier = SimNotifier {
            fail_connect: self.faults.connect,
            fail_send: self.faults.send,
            delivered: false,
        };
        let mut telemetry: CycleRecorder<64> = CycleRecorder::new();

        let report = {
            let mut dispatcher = Dispatcher::new(
                &mut storage,
                &mut imaging,
                &mut detector,
                &mut notifier,
                &mut delay,
                &clock,
                &mut telemetry,
                &self.config,
            );
            dispatcher.run_cycle(reason, &mut store)
        };

        for record in telemetry.oldest_first() {
            lines.push(format!("  [{}] {}", record.at, record.event));
        }

        if notifier.delivered {
            self.alerts_delivered += 1;
        }
        self.cycles += 1;
        self.device = DeviceState::Asleep {
            armed: report.selection,
            since: self.counter.now(),
        };
        lines.push(format!("power-down armed with {}", report.selection));
    }

    fn render_status(&mut self, lines: &mut Vec<String>) {
        let now = self.counter.now();
        lines.push(format!("time          {now}"));
        match self.device {
            DeviceState::Unpowered => lines.push("device        unpowered".to_string()),
            DeviceState::Asleep { armed, since } => {
                lines.push(format!("device        asleep since {since}"));
                lines.push(format!("armed source  {armed}"));
            }
        }

        let store = CooldownStore::load(self.retained.clone());
        if store.is_cooling_down(now) {
            lines.push(format!(
                "cooldown      {}s remaining",
                store.remaining(now).as_secs()
            ));
        } else {
            lines.push("cooldown      inactive".to_string());
        }

        lines.push(format!(
            "cycles {} | alerts {} | ignored triggers {}",
            self.cycles, self.alerts_delivered, self.triggers_ignored
        ));
        lines.push(format!("faults        {:?}", self.faults));
        lines.push(format!("next outcome  {:?}", self.next_outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(session: &mut Session, input: &str) -> Vec<String> {
        session.handle_command(input).expect("command handled")
    }

    #[test]
    fn boot_then_trigger_runs_a_full_cycle() {
        let mut session = Session::new(None).expect("session");
        let boot = responses(&mut session, "boot");
        assert!(boot.iter().any(|line| line.contains("level-wake")));

        let cycle = responses(&mut session, "trigger");
        assert!(cycle.iter().any(|line| line.contains("detection-complete")));
        assert!(
            cycle
                .iter()
                .any(|line| line.contains("power-down armed with level-wake"))
        );
    }

    #[test]
    fn confident_detection_disarms_the_trigger_input() {
        let mut session = Session::new(None).expect("session");
        let _ = responses(&mut session, "boot");
        let _ = responses(&mut session, "detect 0.82");

        let cycle = responses(&mut session, "trigger");
        assert!(cycle.iter().any(|line| line.contains("cooldown-started")));
        assert!(cycle.iter().any(|line| line.contains("timer-wake")));

        let ignored = responses(&mut session, "trigger");
        assert!(ignored.iter().any(|line| line.contains("trigger ignored")));
    }

    #[test]
    fn advancing_past_the_window_fires_the_timer_wake() {
        let mut session = Session::new(None).expect("session");
        let _ = responses(&mut session, "boot");
        let _ = responses(&mut session, "detect 0.9");
        let _ = responses(&mut session, "trigger");

        let advanced = responses(&mut session, "advance 2h");
        assert!(
            advanced
                .iter()
                .any(|line| line.contains("wake timer elapsed"))
        );
        assert!(
            advanced
                .iter()
                .any(|line| line.contains("power-down armed with level-wake"))
        );
    }

    #[test]
    fn injected_storage_fault_fails_the_pipeline() {
        let mut session = Session::new(None).expect("session");
        let _ = responses(&mut session, "boot");
        let _ = responses(&mut session, "fail storage on");

        let cycle = responses(&mut session, "trigger");
        assert!(
            cycle
                .iter()
                .any(|line| line.contains("storage-mount-failed"))
        );
        assert!(
            cycle
                .iter()
                .any(|line| line.contains("power-down armed with level-wake"))
        );
    }
}

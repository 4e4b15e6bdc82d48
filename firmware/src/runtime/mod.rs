use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;

use sentinel_core::config::SentinelConfig;
use sentinel_core::cooldown::CooldownStore;
use sentinel_core::dispatch::Dispatcher;
use sentinel_core::pipeline::{
    DetectionOutcome, DetectionPort, FrameData, ImagingPort, NotifyPort, StoragePort,
};
use sentinel_core::telemetry::{TelemetryEventKind, TelemetrySink};
use sentinel_core::time::Instant;
use sentinel_core::wake::classify;

use crate::platform::{BackupCell, BusyDelay, RtcClock, StandbyPower};
use crate::{platform, status};

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Telemetry sink routing events to defmt and the status atomics.
struct DefmtSink;

impl TelemetrySink for DefmtSink {
    fn record(&mut self, at: Instant, event: TelemetryEventKind) {
        status::record_event(&event);
        defmt::info!(
            "[{=u64:us}] {}",
            at.as_micros(),
            defmt::Display2Format(&event)
        );
    }
}

// Bring-up capability providers. The platform binding is exercised end to end
// with these until the sensing stack lands; each seam is replaced by a real
// driver without touching the core.

struct NoopStorage;

impl StoragePort for NoopStorage {
    type Session = ();
    type Error = ();

    fn mount(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn unmount(&mut self, _: ()) {}
}

struct NoopFrame;

impl FrameData for NoopFrame {
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

struct NoopImaging;

impl ImagingPort for NoopImaging {
    type Session = ();
    type Frame = NoopFrame;
    type Error = ();

    fn init(&mut self) -> Result<(), ()> {
        Ok(())
    }

    fn stabilize(&mut self, _: &mut ()) -> bool {
        true
    }

    // No sensor attached: the cycle ends at the capture stage and the node
    // re-arms, which is the wanted bring-up behavior.
    fn capture(&mut self, _: &mut ()) -> Option<NoopFrame> {
        None
    }

    fn release_frame(&mut self, _: &mut (), _: NoopFrame) {}

    fn shutdown(&mut self, _: ()) {}
}

struct NoopDetector;

impl DetectionPort<NoopFrame> for NoopDetector {
    fn detect(&mut self, _: &NoopFrame) -> DetectionOutcome {
        DetectionOutcome::negative()
    }
}

struct NoopNotifier;

impl NotifyPort for NoopNotifier {
    type Error = ();

    fn connect(&mut self) -> Result<(), ()> {
        Err(())
    }

    fn send(&mut self, _: &[u8], _: &DetectionOutcome) -> Result<(), ()> {
        Err(())
    }

    fn disconnect(&mut self) {}
}

#[embassy_executor::main]
pub async fn main(_spawner: Spawner) -> ! {
    let _peripherals = hal::init(hal::Config::default());
    platform::init();

    let reason = classify(platform::wake_cause());
    status::record_wake(reason);
    defmt::info!("woke: {}", defmt::Display2Format(&reason));

    let clock = RtcClock;
    let mut delay = BusyDelay;
    let mut store = CooldownStore::load(BackupCell);

    let mut storage = NoopStorage;
    let mut imaging = NoopImaging;
    let mut detector = NoopDetector;
    let mut notifier = NoopNotifier;
    let mut telemetry = DefmtSink;
    let config = SentinelConfig::default();

    let mut dispatcher = Dispatcher::new(
        &mut storage,
        &mut imaging,
        &mut detector,
        &mut notifier,
        &mut delay,
        &clock,
        &mut telemetry,
        &config,
    );

    let mut power = StandbyPower;
    dispatcher.dispatch(reason, &mut store, &mut power)
}

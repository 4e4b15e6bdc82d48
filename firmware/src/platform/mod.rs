#![cfg(target_os = "none")]

//! Platform binding for the STM32 target.
//!
//! Maps the core's platform seams onto the hardware facilities that survive
//! Standby: the RTC calendar is the free-running clock, the TAMP backup
//! registers hold the retained cooldown record, and Standby entry with either
//! the WKUP line or the RTC wakeup timer is the power-down primitive. All
//! register access goes through the `embassy-stm32` PAC since Standby setup
//! sits below the HAL's driver abstractions.

use embassy_stm32::pac;

use sentinel_core::cooldown::{COOLDOWN_RECORD_LEN, RetainedCell};
use sentinel_core::dispatch::PowerControl;
use sentinel_core::time::{Clock, Delay, Instant};
use sentinel_core::wake::{WakeCause, WakeSourceSelection};

/// WKUP line index wired to the trigger sensor (WKUP2 on PC13).
const TRIGGER_WKUP_LINE: usize = 1;

/// Number of 32-bit backup registers backing the retained record.
const BACKUP_WORDS: usize = COOLDOWN_RECORD_LEN / 4;

/// Brings up the clocks the binding depends on. Idempotent; must run before
/// any other function in this module.
pub fn init() {
    pac::RCC.apbenr1().modify(|w| {
        w.set_pwren(true);
        w.set_rtcapben(true);
    });
    // Backup-domain writes stay enabled for the whole (short) lifetime.
    pac::PWR.cr1().modify(|w| w.set_dbp(true));

    if !pac::RCC.bdcr().read().rtcen() {
        // First power-up: start the LSE and hand it to the RTC.
        pac::RCC.bdcr().modify(|w| w.set_lseon(true));
        while !pac::RCC.bdcr().read().lserdy() {}
        pac::RCC.bdcr().modify(|w| {
            w.set_rtcsel(pac::rcc::vals::Rtcsel::LSE);
            w.set_rtcen(true);
        });
    }
}

/// Reads why the device left Standby.
#[allow(clippy::cast_possible_truncation)]
pub fn wake_cause() -> WakeCause {
    let sr1 = pac::PWR.sr1().read();
    if !sr1.sbf() {
        return WakeCause::Undefined;
    }
    if sr1.wuf(TRIGGER_WKUP_LINE) {
        return WakeCause::TriggerLevel;
    }
    if pac::RTC.sr().read().wutf() {
        return WakeCause::Timer;
    }
    WakeCause::Other(sr1.0 as u8)
}

/// Clears the standby and wakeup flags so the next wake reads clean.
pub fn clear_wake_flags() {
    pac::PWR.scr().write(|w| {
        w.set_csbf(true);
        for line in 0..6 {
            w.set_cwuf(line, true);
        }
    });
    rtc_write_protected(|| {
        pac::RTC.scr().write(|w| w.set_cwutf(true));
    });
}

fn bcd(tens: u8, units: u8) -> u64 {
    u64::from(tens) * 10 + u64::from(units)
}

/// Civil-date to day-count conversion, anchored at 2000-01-01.
fn days_since_epoch(year: u64, month: u64, day: u64) -> u64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    // 730_425 = day count of 2000-01-01 in this scheme.
    era * 146_097 + doe - 730_425
}

/// Free-running clock over the RTC calendar.
///
/// Whole-second resolution is plenty: the shortest interval the core keys
/// off this clock is the multi-minute cooldown window.
pub struct RtcClock;

impl Clock for RtcClock {
    fn now(&self) -> Instant {
        // Reading TR locks DR until it is read; keep the order fixed.
        let tr = pac::RTC.tr().read();
        let dr = pac::RTC.dr().read();

        let seconds_today = bcd(tr.ht(), tr.hu()) * 3_600
            + bcd(tr.mnt(), tr.mnu()) * 60
            + bcd(tr.st(), tr.su());
        let days = days_since_epoch(
            2_000 + bcd(dr.yt(), dr.yu()),
            bcd(dr.mt().into(), dr.mu()),
            bcd(dr.dt(), dr.du()),
        );
        Instant::from_secs(days * 86_400 + seconds_today)
    }
}

/// Retained record storage in the TAMP backup registers.
///
/// The backup domain keeps its contents through Standby and resets to zero
/// only on a true backup-domain power loss, which is exactly the cold-start
/// semantic the record codec expects.
pub struct BackupCell;

impl RetainedCell for BackupCell {
    fn load(&mut self) -> [u8; COOLDOWN_RECORD_LEN] {
        let mut record = [0u8; COOLDOWN_RECORD_LEN];
        for word in 0..BACKUP_WORDS {
            let raw = pac::TAMP.bkpr(word).read().0;
            record[word * 4..word * 4 + 4].copy_from_slice(&raw.to_le_bytes());
        }
        record
    }

    fn store(&mut self, record: &[u8; COOLDOWN_RECORD_LEN]) {
        for word in 0..BACKUP_WORDS {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&record[word * 4..word * 4 + 4]);
            pac::TAMP
                .bkpr(word)
                .write_value(pac::tamp::regs::Bkpr(u32::from_le_bytes(bytes)));
        }
    }
}

/// Blocking pause backed by the Embassy time driver.
pub struct BusyDelay;

impl Delay for BusyDelay {
    fn sleep(&mut self, duration: core::time::Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        embassy_time::block_for(embassy_time::Duration::from_micros(micros));
    }
}

/// Runs `f` with RTC register write protection lifted.
fn rtc_write_protected<F: FnOnce()>(f: F) {
    pac::RTC.wpr().write(|w| w.set_key(0xCA));
    pac::RTC.wpr().write(|w| w.set_key(0x53));
    f();
    pac::RTC.wpr().write(|w| w.set_key(0xFF));
}

/// Arms the RTC wakeup timer for `seconds` on the 1 Hz clock.
fn arm_wakeup_timer(seconds: u64) {
    let ticks = seconds.clamp(1, u64::from(u16::MAX));
    rtc_write_protected(|| {
        pac::RTC.cr().modify(|w| w.set_wute(false));
        while !pac::RTC.icsr().read().wutwf() {}
        #[allow(clippy::cast_possible_truncation)]
        pac::RTC.wutr().write(|w| w.set_wut(ticks as u16));
        pac::RTC.cr().modify(|w| {
            // ck_spre (1 Hz) as the wakeup clock.
            w.set_wucksel(pac::rtc::vals::Wucksel::CLOCKSPARE);
            w.set_wute(true);
            w.set_wutie(true);
        });
    });
}

fn disarm_wakeup_timer() {
    rtc_write_protected(|| {
        pac::RTC.cr().modify(|w| {
            w.set_wute(false);
            w.set_wutie(false);
        });
    });
}

/// Standby-mode power primitive.
pub struct StandbyPower;

impl PowerControl for StandbyPower {
    fn power_down(&mut self, selection: WakeSourceSelection) -> ! {
        match selection {
            WakeSourceSelection::LevelWake(_) => {
                disarm_wakeup_timer();
                pac::PWR.cr3().modify(|w| w.set_ewup(TRIGGER_WKUP_LINE, true));
                // Rising edge: the sensor holds the line high on motion.
                pac::PWR.cr4().modify(|w| w.set_wp(TRIGGER_WKUP_LINE, false));
            }
            WakeSourceSelection::TimerWake(window) => {
                pac::PWR
                    .cr3()
                    .modify(|w| w.set_ewup(TRIGGER_WKUP_LINE, false));
                arm_wakeup_timer(window.as_secs().max(1));
            }
        }

        // Stale flags would misclassify the next wake.
        clear_wake_flags();

        pac::PWR
            .cr1()
            .modify(|w| w.set_lpms(pac::pwr::vals::Lpms::STANDBY));
        let mut peripherals = unsafe { cortex_m::Peripherals::steal() };
        peripherals.SCB.set_sleepdeep();
        cortex_m::asm::dsb();
        cortex_m::asm::wfi();

        // Standby entry can slip past a pending interrupt once; retry forever.
        loop {
            cortex_m::asm::wfi();
        }
    }
}

use std::io;
use std::path::Path;

#[allow(dead_code)]
#[path = "../commands.rs"]
mod commands;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::Session;

fn main() -> io::Result<()> {
    record("transcripts/clean-detection.log", &CLEAN_DETECTION)?;
    record("transcripts/failed-delivery.log", &FAILED_DELIVERY)?;
    record("transcripts/cooldown-race.log", &COOLDOWN_RACE)?;
    Ok(())
}

/// Cold boot, negative trigger, then a confident detection with delivery.
const CLEAN_DETECTION: [&str; 6] = [
    "boot",
    "trigger",
    "detect 0.82",
    "trigger",
    "status",
    "advance 1h",
];

/// Confident detection whose alert never gets out; suppression still holds.
const FAILED_DELIVERY: [&str; 6] = [
    "boot",
    "fail send on",
    "detect 0.82",
    "trigger",
    "status",
    "advance 2h",
];

/// Trigger racing an armed cooldown timer: ignored while disarmed, then
/// suppressed by the defensive re-check once level-wake is restored.
const COOLDOWN_RACE: [&str; 7] = [
    "boot",
    "detect 0.9",
    "trigger",
    "trigger",
    "advance 30m",
    "status",
    "advance 31m",
];

fn record(path: &str, script: &[&str]) -> io::Result<()> {
    let mut session = Session::new(Some(Path::new(path)))?;
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

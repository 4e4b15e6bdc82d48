//! Console command grammar for the emulator.
//!
//! Commands stay short and line-oriented, so the parser composes `winnow`
//! combinators directly over the input string. Durations accept the units
//! operators actually type (`500ms`, `90s`, `15m`, `2h`).

use core::time::Duration;

use winnow::ModalResult;
use winnow::Parser;
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{alt, eof, preceded, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::token::take_while;

/// Subsystem whose failure mode can be toggled from the console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Subsystem {
    Storage,
    Imaging,
    Stabilize,
    Capture,
    Connect,
    Send,
}

/// Parsed console command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    /// Cold power-on: total power loss, retained region zeroed.
    Boot,
    /// Motion event on the trigger input.
    Trigger,
    /// Let simulated time pass, firing the wake timer if it lapses.
    Advance(Duration),
    /// Show device state and counters.
    Status,
    /// Toggle a fault on a simulated subsystem.
    Fail(Subsystem, bool),
    /// Set the next detection outcome (`none` or a confidence).
    Detect(Option<f32>),
    /// List commands.
    Help,
}

/// Help text shown by the `help` command.
pub const HELP_LINES: &[&str] = &[
    "boot                      cold power-on (retained region zeroed)",
    "trigger                   fire a motion event on the trigger input",
    "advance <duration>        let time pass, e.g. advance 90s / 15m / 2h",
    "status                    show device state and counters",
    "fail <subsystem> on|off   inject faults: storage imaging stabilize",
    "                          capture connect send",
    "detect <confidence|none>  set the next detection outcome",
    "help                      this text",
    "exit | quit               close the session",
];

fn duration(input: &mut &str) -> ModalResult<Duration> {
    let digits = digit1.parse_next(input)?;
    let unit = alt(("ms", "s", "m", "h")).parse_next(input)?;
    let value: u64 = digits
        .parse()
        .map_err(|_| ErrMode::Cut(ContextError::new()))?;
    Ok(match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        _ => Duration::from_secs(value * 3_600),
    })
}

fn confidence(input: &mut &str) -> ModalResult<f32> {
    let text = take_while(1.., |c: char| c.is_ascii_digit() || c == '.').parse_next(input)?;
    let value: f32 = text
        .parse()
        .map_err(|_| ErrMode::Cut(ContextError::new()))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ErrMode::Cut(ContextError::new()))
    }
}

fn subsystem(input: &mut &str) -> ModalResult<Subsystem> {
    alt((
        "storage".value(Subsystem::Storage),
        "imaging".value(Subsystem::Imaging),
        "stabilize".value(Subsystem::Stabilize),
        "capture".value(Subsystem::Capture),
        "connect".value(Subsystem::Connect),
        "send".value(Subsystem::Send),
    ))
    .parse_next(input)
}

fn fail_command(input: &mut &str) -> ModalResult<Command> {
    let _ = ("fail", space1).parse_next(input)?;
    let target = subsystem.parse_next(input)?;
    let _ = space1.parse_next(input)?;
    let enabled = alt(("on".value(true), "off".value(false))).parse_next(input)?;
    Ok(Command::Fail(target, enabled))
}

fn detect_command(input: &mut &str) -> ModalResult<Command> {
    let _ = ("detect", space1).parse_next(input)?;
    alt((
        "none".value(Command::Detect(None)),
        confidence.map(|value| Command::Detect(Some(value))),
    ))
    .parse_next(input)
}

fn command(input: &mut &str) -> ModalResult<Command> {
    preceded(
        space0,
        alt((
            "boot".value(Command::Boot),
            "trigger".value(Command::Trigger),
            preceded(("advance", space1), duration).map(Command::Advance),
            "status".value(Command::Status),
            fail_command,
            detect_command,
            "help".value(Command::Help),
        )),
    )
    .parse_next(input)
}

/// Parses one console line into a [`Command`].
pub fn parse_line(line: &str) -> Result<Command, String> {
    terminated(command, (space0, eof))
        .parse(line)
        .map_err(|error| format!("unrecognized command: {error}"))
}

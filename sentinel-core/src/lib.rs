#![no_std]

// Shared wake-cycle logic for the sentinel node feature set.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library and routing every platform touchpoint (clock,
// retained memory, power control, sensing collaborators) through traits the
// other crates implement.

pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod pipeline;
pub mod telemetry;
pub mod time;
pub mod wake;

//! ESP32-S3 firmware-specific modules for hygro-rs
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral initialization, board power bring-up, and the
//! timeout wrappers that bound every blocking transfer.

#![no_std]

pub mod app_state;
pub mod timed_spi;
pub mod timed_uart;

use embassy_time::Instant;
use hygro_core::clock::TickSource;

/// Millisecond tick from the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTicks;

impl TickSource for EmbassyTicks {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

//! Hardware-independent core library for hygro-rs
//!
//! This crate holds the platform-agnostic half of the hygro temperature and
//! humidity monitor: the BME280 driver over a shared SPI bus, the alarm
//! policy, the character display and serial console abstractions, the
//! software clock, and the presentation logic that ties them together.
//!
//! It is `#![no_std]` without an allocator so it builds for the ESP32-S3
//! firmware and for desktop hosts (the simulator and tests) alike.

#![cfg_attr(not(test), no_std)]

pub mod alarm;
pub mod app_state;
pub mod bme280;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod display;
pub mod monitor;
pub mod serial;
pub mod spi_bus;

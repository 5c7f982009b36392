//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `hygro_core` and adds
//! ESP32-specific hardware initialization.

mod hardware;

pub use hardware::*;

// Re-export all shared app state types from hygro-core
pub use hygro_core::app_state::*;

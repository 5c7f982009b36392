use core::fmt;

use embedded_hal_async::spi::SpiDevice;
use thiserror_no_std::Error;

use super::{Bme280, Uninitialized};

/// Failures of the BME280 driver, generic over the bus error `E`.
#[derive(Error, Debug)]
pub enum Bme280Error<E> {
    /// A register transaction failed during sampling.
    #[error("SPI transaction failed: {0:?}")]
    Bus(E),
    /// The identification register did not hold the BME280 id.
    #[error("unexpected chip id {found:#04x} (expected 0x60)")]
    ChipIdMismatch { found: u8 },
    /// Reading the trimming blocks failed.
    #[error("calibration readout failed: {0:?}")]
    Calibration(E),
    /// Writing a control register during startup failed.
    #[error("write to register {register:#04x} failed: {error:?}")]
    Configuration { register: u8, error: E },
}

impl<E> Bme280Error<E> {
    /// Whether polling again next cycle can succeed without re-initializing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChipIdMismatch { .. } | Self::Bus(_))
    }
}

/// A failed [`Bme280::initialize`], handing the driver back so the caller can
/// decide between retrying and giving up.
pub struct InitFailure<S: SpiDevice, D> {
    pub error: Bme280Error<S::Error>,
    pub sensor: Bme280<S, D, Uninitialized>,
}

impl<S: SpiDevice, D> fmt::Debug for InitFailure<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitFailure").field("error", &self.error).finish_non_exhaustive()
    }
}

//! SPI device wrapper that bounds every transaction in time.
//!
//! A stuck transfer is abandoned after the timeout. Dropping the inner
//! transaction future releases chip-select and the bus lock.

use embassy_time::{Duration, with_timeout};
use embedded_hal::spi::{Error as SpiError, ErrorKind, ErrorType};
use embedded_hal_async::spi::{Operation, SpiDevice};
use log::warn;
use thiserror_no_std::Error;

pub const DEFAULT_SPI_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedSpiError<E> {
    #[error("SPI transaction failed: {0:?}")]
    Spi(E),
    #[error("SPI transaction timed out")]
    Timeout,
}

impl<E: SpiError> SpiError for TimedSpiError<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Spi(e) => e.kind(),
            Self::Timeout => ErrorKind::Other,
        }
    }
}

pub struct TimedSpi<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimedSpi<S> {
    pub const fn new(inner: S) -> Self {
        Self::with_timeout(inner, DEFAULT_SPI_TIMEOUT)
    }

    pub const fn with_timeout(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ErrorType> ErrorType for TimedSpi<S> {
    type Error = TimedSpiError<S::Error>;
}

impl<S: SpiDevice> SpiDevice for TimedSpi<S> {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        match with_timeout(self.timeout, self.inner.transaction(operations)).await {
            Ok(result) => result.map_err(TimedSpiError::Spi),
            Err(_) => {
                warn!("SPI transaction exceeded {} ms", self.timeout.as_millis());
                Err(TimedSpiError::Timeout)
            }
        }
    }
}

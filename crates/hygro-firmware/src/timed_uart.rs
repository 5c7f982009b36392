//! UART transmitter with a per-write timeout.

use embassy_time::{Duration, with_timeout};
use embedded_io_async::{Error as IoError, ErrorKind, ErrorType, Write};
use esp_hal::Async;
use esp_hal::uart::{TxError, UartTx};
use thiserror_no_std::Error;

pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum TimedUartError {
    #[error("UART transmit failed: {0:?}")]
    Tx(TxError),
    #[error("UART transmit timed out")]
    Timeout,
}

impl IoError for TimedUartError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Tx(_) => ErrorKind::Other,
            Self::Timeout => ErrorKind::TimedOut,
        }
    }
}

/// Async byte writer over the console UART.
pub struct TimedUart {
    tx: UartTx<'static, Async>,
    timeout: Duration,
}

impl TimedUart {
    pub fn new(tx: UartTx<'static, Async>) -> Self {
        Self {
            tx,
            timeout: DEFAULT_TX_TIMEOUT,
        }
    }
}

impl ErrorType for TimedUart {
    type Error = TimedUartError;
}

impl Write for TimedUart {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        match with_timeout(self.timeout, self.tx.write_async(buf)).await {
            Ok(result) => result.map_err(TimedUartError::Tx),
            Err(_) => Err(TimedUartError::Timeout),
        }
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        match with_timeout(self.timeout, self.tx.flush_async()).await {
            Ok(result) => result.map_err(TimedUartError::Tx),
            Err(_) => Err(TimedUartError::Timeout),
        }
    }
}

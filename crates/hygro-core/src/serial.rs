//! Line-oriented serial console.

use core::fmt::Debug;

use embedded_io_async::Write;
use thiserror_no_std::Error;

/// Longest line accepted by [`UartConsole`], terminator excluded, is one
/// byte less than this.
pub const MAX_LINE_LEN: usize = 256;

const LINE_TERMINATOR: &[u8] = b"\r\n";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError<E> {
    #[error("line of {0} bytes exceeds the transmit buffer")]
    LineTooLong(usize),
    #[error("serial write failed: {0:?}")]
    Io(E),
}

/// Sink for complete text lines.
pub trait SerialConsole {
    type Error: Debug;

    /// Send `text` followed by a line terminator.
    fn send_line(&mut self, text: &str) -> impl Future<Output = Result<(), Self::Error>>;
}

/// [`SerialConsole`] over any async byte writer (a UART TX half, usually).
pub struct UartConsole<W> {
    writer: W,
}

impl<W: Write> UartConsole<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn release(self) -> W {
        self.writer
    }
}

impl<W: Write> SerialConsole for UartConsole<W> {
    type Error = SerialError<W::Error>;

    async fn send_line(&mut self, text: &str) -> Result<(), Self::Error> {
        if text.len() >= MAX_LINE_LEN {
            return Err(SerialError::LineTooLong(text.len()));
        }
        self.writer.write_all(text.as_bytes()).await.map_err(SerialError::Io)?;
        self.writer.write_all(LINE_TERMINATOR).await.map_err(SerialError::Io)?;
        self.writer.flush().await.map_err(SerialError::Io)
    }
}

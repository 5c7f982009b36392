//! Async SPI bus sharing with per-device chip-select.
//!
//! Several devices on one SPI bus each get a [`SharedSpiDevice`] holding a
//! reference to the Embassy-mutex-guarded bus and their own chip-select pin.
//! The bus lock is held across await points, so a transaction is atomic with
//! respect to other devices on the bus while the executor keeps running
//! other tasks.
//!
//! # Chip-select release
//!
//! Chip-select is asserted after the bus lock is acquired and is released on
//! every exit path: normal completion, a bus error, and when the transaction
//! future is dropped part-way (for example by a timeout wrapper). The pin is
//! released before the bus lock.
//!
//! # Example
//!
//! ```ignore
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use embassy_sync::mutex::Mutex;
//! use static_cell::StaticCell;
//!
//! static SPI3_BUS: StaticCell<Mutex<CriticalSectionRawMutex, esp_hal::spi::master::Spi<'static, esp_hal::Async>>> = StaticCell::new();
//!
//! let spi = /* ... create async SPI ... */;
//! let bus = SPI3_BUS.init(Mutex::new(spi));
//!
//! let bme280 = SharedSpiDevice::new(bus, bme280_cs, embassy_time::Delay);
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Error as SpiError, ErrorKind, ErrorType};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{Operation, SpiBus, SpiDevice};
use thiserror_no_std::Error;

/// Failure of a [`SharedSpiDevice`] transaction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiDeviceError<BUS, CS> {
    #[error("SPI bus error: {0:?}")]
    Spi(BUS),
    #[error("chip-select pin error: {0:?}")]
    Cs(CS),
}

impl<BUS, CS> SpiError for SpiDeviceError<BUS, CS>
where
    BUS: SpiError,
    CS: core::fmt::Debug,
{
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Spi(e) => e.kind(),
            Self::Cs(_) => ErrorKind::ChipSelectFault,
        }
    }
}

/// One device on a shared async SPI bus.
pub struct SharedSpiDevice<'a, M: RawMutex, BUS, CS, D> {
    bus: &'a Mutex<M, BUS>,
    cs: CS,
    delay: D,
}

impl<'a, M: RawMutex, BUS, CS, D> SharedSpiDevice<'a, M, BUS, CS, D>
where
    CS: OutputPin,
{
    /// Create a new `SharedSpiDevice`.
    ///
    /// The chip-select pin is driven inactive (high) immediately.
    pub fn new(bus: &'a Mutex<M, BUS>, mut cs: CS, delay: D) -> Result<Self, CS::Error> {
        cs.set_high()?;
        Ok(Self { bus, cs, delay })
    }
}

impl<M, BUS, CS, D> ErrorType for SharedSpiDevice<'_, M, BUS, CS, D>
where
    M: RawMutex,
    BUS: ErrorType,
    CS: OutputPin,
{
    type Error = SpiDeviceError<BUS::Error, CS::Error>;
}

impl<M, BUS, CS, D> SpiDevice for SharedSpiDevice<'_, M, BUS, CS, D>
where
    M: RawMutex,
    BUS: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        let selected = ChipSelect::assert(&mut self.cs).map_err(SpiDeviceError::Cs)?;

        let result = run_operations(&mut *bus, &mut self.delay, operations).await;
        let flushed = bus.flush().await;
        let released = selected.release();

        result.map_err(SpiDeviceError::Spi)?;
        flushed.map_err(SpiDeviceError::Spi)?;
        released.map_err(SpiDeviceError::Cs)
    }
}

async fn run_operations<BUS, D>(
    bus: &mut BUS,
    delay: &mut D,
    operations: &mut [Operation<'_, u8>],
) -> Result<(), BUS::Error>
where
    BUS: SpiBus,
    D: DelayNs,
{
    for operation in operations {
        match operation {
            Operation::Read(buf) => bus.read(buf).await?,
            Operation::Write(buf) => bus.write(buf).await?,
            Operation::Transfer(read, write) => bus.transfer(read, write).await?,
            Operation::TransferInPlace(buf) => bus.transfer_in_place(buf).await?,
            Operation::DelayNs(ns) => {
                bus.flush().await?;
                delay.delay_ns(*ns).await;
            }
        }
    }
    Ok(())
}

/// Active chip-select; drives the pin high again when dropped.
struct ChipSelect<'a, CS: OutputPin> {
    pin: &'a mut CS,
    active: bool,
}

impl<'a, CS: OutputPin> ChipSelect<'a, CS> {
    fn assert(pin: &'a mut CS) -> Result<Self, CS::Error> {
        pin.set_low()?;
        Ok(Self { pin, active: true })
    }

    fn release(mut self) -> Result<(), CS::Error> {
        self.active = false;
        self.pin.set_high()
    }
}

impl<CS: OutputPin> Drop for ChipSelect<'_, CS> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.pin.set_high();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    #[derive(Debug, Default)]
    struct LoopbackBus {
        written: Vec<u8>,
        read_fill: u8,
        fail_writes: bool,
        hang_on_read: bool,
    }

    impl ErrorType for LoopbackBus {
        type Error = ErrorKind;
    }

    impl SpiBus for LoopbackBus {
        async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            if self.hang_on_read {
                core::future::pending::<()>().await;
            }
            words.fill(self.read_fill);
            Ok(())
        }

        async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            if self.fail_writes {
                return Err(ErrorKind::Overrun);
            }
            self.written.extend_from_slice(words);
            Ok(())
        }

        async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            self.write(write).await?;
            self.read(read).await
        }

        async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            self.written.extend_from_slice(words);
            words.fill(self.read_fill);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    /// Records every level the pin was driven to.
    #[derive(Debug, Default)]
    struct RecordingPin {
        levels: Vec<bool>,
    }

    impl RecordingPin {
        fn is_high(&self) -> bool {
            self.levels.last().copied().unwrap_or(false)
        }
    }

    impl embedded_hal::digital::ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.levels.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.levels.push(true);
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn transaction_frames_with_chip_select() {
        let bus = Mutex::<CriticalSectionRawMutex, _>::new(LoopbackBus {
            read_fill: 0x60,
            ..Default::default()
        });
        let mut device = SharedSpiDevice::new(&bus, RecordingPin::default(), NoDelay).unwrap();

        let mut id = [0u8; 1];
        block_on(device.transaction(&mut [Operation::Write(&[0xD0]), Operation::Read(&mut id)])).unwrap();

        assert_eq!(id, [0x60]);
        // idle high at construction, low for the frame, high after
        assert_eq!(device.cs.levels, [true, false, true]);
        assert_eq!(block_on(bus.lock()).written, [0xD0]);
    }

    #[test]
    fn chip_select_released_on_bus_error() {
        let bus = Mutex::<CriticalSectionRawMutex, _>::new(LoopbackBus {
            fail_writes: true,
            ..Default::default()
        });
        let mut device = SharedSpiDevice::new(&bus, RecordingPin::default(), NoDelay).unwrap();

        let result = block_on(device.transaction(&mut [Operation::Write(&[0x74]), Operation::Write(&[0xA3])]));

        assert_eq!(result, Err(SpiDeviceError::Spi(ErrorKind::Overrun)));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Overrun);
        assert!(device.cs.is_high());
    }

    #[test]
    fn chip_select_released_when_transaction_is_dropped() {
        let bus = Mutex::<CriticalSectionRawMutex, _>::new(LoopbackBus {
            hang_on_read: true,
            ..Default::default()
        });
        let mut device = SharedSpiDevice::new(&bus, RecordingPin::default(), NoDelay).unwrap();

        let mut burst = [0u8; 8];
        let outcome = block_on(select(
            device.transaction(&mut [Operation::Write(&[0xF7]), Operation::Read(&mut burst)]),
            core::future::ready(()),
        ));

        assert!(matches!(outcome, Either::Second(())));
        assert_eq!(device.cs.levels, [true, false, true]);
        // the bus lock was released with the dropped future
        assert!(bus.try_lock().is_ok());
    }

    #[test]
    fn chip_select_fault_kind() {
        let error: SpiDeviceError<ErrorKind, Infallible> = SpiDeviceError::Spi(ErrorKind::ModeFault);
        assert_eq!(error.kind(), ErrorKind::ModeFault);

        #[derive(Debug)]
        struct PinFault;
        let error: SpiDeviceError<ErrorKind, PinFault> = SpiDeviceError::Cs(PinFault);
        assert_eq!(error.kind(), ErrorKind::ChipSelectFault);
    }
}

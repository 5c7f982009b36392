//! Async BME280 driver over an `embedded-hal-async` SPI device.
//!
//! The driver is a typestate machine. [`Bme280::new`] yields an
//! [`Uninitialized`] driver whose only useful operation is
//! [`Bme280::initialize`]: it loads the factory calibration and configures
//! the sensor. The [`Configured`] driver it returns owns the calibration, so a
//! compensated reading can never be produced from missing or stale constants.
//!
//! Every register access is one SPI transaction: a control byte carrying the
//! register address (bit 7 set for reads, cleared for writes) followed by the
//! payload. Chip-select framing is the `SpiDevice` implementation's job.

pub mod calibration;
pub mod compensation;
mod error;
pub mod registers;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::{Operation, SpiDevice};
use log::{debug, error, info, warn};

pub use calibration::Calibration;
pub use compensation::{FineTemperature, RawHumidity, RawSample, RawTemperature};
pub use error::{Bme280Error, InitFailure};
pub use registers::Settings;

use compensation::{compensate_humidity, compensate_temperature};
use registers::{
    CALIB_BLOCK1_LEN, CALIB_BLOCK1_START, CALIB_BLOCK2_LEN, CALIB_BLOCK2_START, CHIP_ID, CONFIG,
    CTRL_HUM, CTRL_MEAS, DATA_LEN, DATA_START, EXPECTED_CHIP_ID, RESET, RESET_COMMAND, SPI_READ,
    SPI_WRITE_MASK,
};

/// Wait after the reset command and after each configuration write.
pub const SETTLE_DELAY_MS: u32 = 100;

/// Driver state before calibration has been loaded.
#[derive(Debug)]
pub struct Uninitialized;

/// Driver state after a successful [`Bme280::initialize`].
#[derive(Debug)]
pub struct Configured {
    calibration: Calibration,
}

/// One compensated sample: temperature and humidity from the same burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Hundredths of a degree Celsius.
    pub temperature_centi_celsius: i32,
    /// Relative humidity in Q22.10 (1024 = 1 %RH).
    pub humidity_q22_10: u32,
}

impl Measurement {
    /// Compensate both channels of a burst, temperature first.
    pub fn compensate(sample: RawSample, calibration: &Calibration) -> Self {
        let (temperature_centi_celsius, fine) = compensate_temperature(sample.temperature, calibration);
        let humidity = compensate_humidity(sample.humidity, fine, calibration);

        Self {
            temperature_centi_celsius,
            humidity_q22_10: humidity >> 12,
        }
    }

    pub fn temperature_celsius(&self) -> f32 {
        self.temperature_centi_celsius as f32 / 100.0
    }

    pub fn humidity_percent(&self) -> f32 {
        self.humidity_q22_10 as f32 / 1024.0
    }
}

/// BME280 on an SPI device `S`, using `D` for settle delays.
#[derive(Debug)]
pub struct Bme280<S, D, State = Uninitialized> {
    spi: S,
    delay: D,
    settings: Settings,
    state: State,
}

impl<S, D, State> Bme280<S, D, State>
where
    S: SpiDevice,
    D: DelayNs,
{
    /// Burst-read `buffer.len()` registers starting at `register`.
    pub async fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), S::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[register | SPI_READ]), Operation::Read(buffer)])
            .await
    }

    /// Write `payload` starting at `register`.
    pub async fn write_registers(&mut self, register: u8, payload: &[u8]) -> Result<(), S::Error> {
        self.spi
            .transaction(&mut [
                Operation::Write(&[register & SPI_WRITE_MASK]),
                Operation::Write(payload),
            ])
            .await
    }

    /// Read the identification register.
    pub async fn chip_id(&mut self) -> Result<u8, S::Error> {
        let mut id = [0u8; 1];
        self.read_registers(CHIP_ID, &mut id).await?;
        Ok(id[0])
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn spi_mut(&mut self) -> &mut S {
        &mut self.spi
    }

    /// Give back the SPI device and delay.
    pub fn release(self) -> (S, D) {
        (self.spi, self.delay)
    }
}

impl<S, D> Bme280<S, D, Uninitialized>
where
    S: SpiDevice,
    D: DelayNs,
{
    pub fn new(spi: S, delay: D, settings: Settings) -> Self {
        Self {
            spi,
            delay,
            settings,
            state: Uninitialized,
        }
    }

    /// Load calibration, reset the sensor and apply the acquisition settings.
    ///
    /// On failure the uninitialized driver is handed back inside the error so
    /// the caller can retry.
    pub async fn initialize(mut self) -> Result<Bme280<S, D, Configured>, InitFailure<S, D>> {
        match self.configure().await {
            Ok(calibration) => Ok(Bme280 {
                spi: self.spi,
                delay: self.delay,
                settings: self.settings,
                state: Configured { calibration },
            }),
            Err(error) => {
                error!("BME280 initialization failed: {:?}", error);
                Err(InitFailure { error, sensor: self })
            }
        }
    }

    /// Read and decode both trimming blocks.
    pub async fn load_calibration(&mut self) -> Result<Calibration, Bme280Error<S::Error>> {
        let mut block1 = [0u8; CALIB_BLOCK1_LEN];
        let mut block2 = [0u8; CALIB_BLOCK2_LEN];

        self.read_registers(CALIB_BLOCK1_START, &mut block1)
            .await
            .map_err(Bme280Error::Calibration)?;
        self.read_registers(CALIB_BLOCK2_START, &mut block2)
            .await
            .map_err(Bme280Error::Calibration)?;

        let calibration = Calibration::from_blocks(&block1, &block2);
        debug!("BME280 calibration: {:?}", calibration);
        Ok(calibration)
    }

    async fn configure(&mut self) -> Result<Calibration, Bme280Error<S::Error>> {
        info!("Loading BME280 calibration");
        let calibration = self.load_calibration().await?;

        info!("Resetting BME280");
        self.write_setting(RESET, RESET_COMMAND).await?;

        let settings = self.settings;
        info!("Configuring BME280: {:?}", settings);
        // ctrl_meas carries the mode, so it goes last
        self.write_setting(CTRL_HUM, settings.ctrl_hum()).await?;
        self.write_setting(CONFIG, settings.config()).await?;
        self.write_setting(CTRL_MEAS, settings.ctrl_meas()).await?;

        Ok(calibration)
    }

    async fn write_setting(&mut self, register: u8, value: u8) -> Result<(), Bme280Error<S::Error>> {
        self.write_registers(register, &[value])
            .await
            .map_err(|error| Bme280Error::Configuration { register, error })?;
        self.delay.delay_ms(SETTLE_DELAY_MS).await;
        Ok(())
    }
}

impl<S, D> Bme280<S, D, Configured>
where
    S: SpiDevice,
    D: DelayNs,
{
    pub fn calibration(&self) -> &Calibration {
        &self.state.calibration
    }

    /// Verify the chip id, burst-read one sample and compensate it.
    ///
    /// A chip id mismatch is reported without reading or compensating any
    /// data; the next call may succeed.
    pub async fn read_and_compensate(&mut self) -> Result<Measurement, Bme280Error<S::Error>> {
        let found = self.chip_id().await.map_err(|e| {
            error!("BME280 id read failed: {:?}", e);
            Bme280Error::Bus(e)
        })?;
        if found != EXPECTED_CHIP_ID {
            warn!("BME280 chip id mismatch: read {:#04x}", found);
            return Err(Bme280Error::ChipIdMismatch { found });
        }

        let sample = self.read_raw().await?;
        Ok(Measurement::compensate(sample, &self.state.calibration))
    }

    /// Burst-read the data registers without checking the chip id.
    pub async fn read_raw(&mut self) -> Result<RawSample, Bme280Error<S::Error>> {
        let mut burst = [0u8; DATA_LEN];
        self.read_registers(DATA_START, &mut burst).await.map_err(|e| {
            error!("BME280 burst read failed: {:?}", e);
            Bme280Error::Bus(e)
        })?;
        Ok(RawSample::from_burst(&burst))
    }
}

//! Hardware initialization for the Hygro board
//!
//! Bring-up order matters: the display rail comes from the AXP2101, so power
//! is configured over I2C before the TFT is touched.

use axp2101_embedded::AsyncAxp2101;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_time::Delay;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::i2c::master::{Config as I2cConfig, ConfigError as I2cConfigError, I2c};
use esp_hal::spi::Mode;
use esp_hal::spi::master::{Config as SpiConfig, ConfigError as SpiConfigError, Spi};
use esp_hal::time::Rate;
use esp_hal::uart::{Config as UartConfig, ConfigError as UartConfigError, Uart, UartTx};
use esp_hal::{Async, peripherals};
use hygro_core::spi_bus::SharedSpiDevice;
use log::{error, info};
use static_cell::StaticCell;

use crate::timed_spi::TimedSpi;

/// AW9523 GPIO expander address on this board.
pub const GPIO_EXPANDER_ADDRESS: u8 = 0x58;
/// ALDO4 feeds the TFT.
const DISPLAY_RAIL_MV: u16 = 3300;

pub type SensorBus = Spi<'static, Async>;

/// The BME280 as seen by the driver: its own chip-select on the shared SPI3
/// bus, with every transaction bounded by a timeout.
pub type SensorSpi =
    TimedSpi<SharedSpiDevice<'static, CriticalSectionRawMutex, SensorBus, Output<'static>, Delay>>;

/// Create the power-management I2C bus (400 kHz).
pub fn create_i2c_bus(
    i2c0: peripherals::I2C0<'static>,
    sda: peripherals::GPIO12<'static>,
    scl: peripherals::GPIO11<'static>,
) -> Result<I2c<'static, Async>, I2cConfigError> {
    Ok(I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(400)))?
        .with_sda(sda)
        .with_scl(scl)
        .into_async())
}

/// Enable the board supply rails and the GPIO expander.
///
/// Failures are logged; the board may still come up partially powered.
pub async fn init_power(i2c: &mut I2c<'static, Async>) {
    info!("Configuring power management");
    let mut power_mgmt_chip = AsyncAxp2101::new(&mut *i2c);
    let rails = async {
        power_mgmt_chip.init().await?;
        power_mgmt_chip.enable_aldo1().await?;
        power_mgmt_chip.enable_aldo2().await?;
        power_mgmt_chip.enable_aldo3().await?;
        power_mgmt_chip.enable_aldo4().await?;
        power_mgmt_chip.enable_bldo1().await?;
        power_mgmt_chip.enable_bldo2().await?;
        power_mgmt_chip.enable_dldo1().await?;
        power_mgmt_chip.set_aldo4_voltage(DISPLAY_RAIL_MV).await
    }
    .await;
    match rails {
        Ok(_) => info!("Power management ready"),
        Err(e) => error!("Power init failed: {:?}", e),
    }
    drop(power_mgmt_chip);

    info!("Configuring GPIO expander");
    let mut gpio_expander = aw9523_embedded::r#async::Aw9523Async::new(&mut *i2c, GPIO_EXPANDER_ADDRESS);
    match gpio_expander.init().await {
        Ok(_) => info!("GPIO expander ready"),
        Err(e) => error!("GPIO expander init failed: {:?}", e),
    }
}

/// Create the sensor SPI bus: 1 MHz, mode 0.
pub fn create_sensor_bus(
    spi3: peripherals::SPI3<'static>,
    sck: peripherals::GPIO9<'static>,
    mosi: peripherals::GPIO8<'static>,
    miso: peripherals::GPIO18<'static>,
) -> Result<SensorBus, SpiConfigError> {
    let config = SpiConfig::default()
        .with_frequency(Rate::from_mhz(1))
        .with_mode(Mode::_0);
    Ok(Spi::new(spi3, config)?
        .with_sck(sck)
        .with_mosi(mosi)
        .with_miso(miso)
        .into_async())
}

/// Put the sensor bus behind a mutex and hand out the BME280's device.
pub fn init_sensor_spi(bus: SensorBus, cs: peripherals::GPIO17<'static>) -> SensorSpi {
    static SPI3_BUS: StaticCell<AsyncMutex<CriticalSectionRawMutex, SensorBus>> = StaticCell::new();
    let spi3_bus = SPI3_BUS.init(AsyncMutex::new(bus));

    let cs = Output::new(cs, Level::High, OutputConfig::default());
    let device = match SharedSpiDevice::new(spi3_bus, cs, Delay) {
        Ok(device) => device,
        Err(never) => match never {},
    };
    info!("BME280 on SPI3 (CS GPIO17)");
    TimedSpi::new(device)
}

/// Console UART: 115200 8N1, transmit half only.
pub fn create_console_uart(
    uart0: peripherals::UART0<'static>,
    tx: peripherals::GPIO43<'static>,
    rx: peripherals::GPIO44<'static>,
) -> Result<UartTx<'static, Async>, UartConfigError> {
    let uart = Uart::new(uart0, UartConfig::default().with_baudrate(115_200))?
        .with_tx(tx)
        .with_rx(rx)
        .into_async();
    let (_rx, tx) = uart.split();
    Ok(tx)
}

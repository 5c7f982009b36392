#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Delay, Duration, Instant, Timer};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use log::{debug, info, warn};
use rtt_target::rprintln;

use hygro_core::alarm::AlarmPolicy;
use hygro_core::bme280::Bme280;
use hygro_core::clock::SoftwareRtc;
use hygro_core::config::MonitorConfig;
use hygro_core::debounce::{ButtonEdge, Debouncer};
use hygro_core::display::GraphicsLcd;
use hygro_core::monitor::{AcquisitionOutcome, Monitor};
use hygro_core::serial::UartConsole;
use hygro_firmware::EmbassyTicks;
use hygro_firmware::app_state::{
    AppError, AppState, GlobalStateType, MEASUREMENT_CHANNEL, SensorSpi, create_console_uart,
    create_i2c_bus, create_sensor_bus, init_power, init_sensor_spi,
};
use hygro_firmware::timed_uart::TimedUart;

// Display-LCD panel specific imports
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::spi::master::{Config, Spi};
use mipidsi::interface::SpiInterface;
use mipidsi::{Builder as MipidsiBuilder, models::ILI9342CRgb565};

const DISPLAY_WIDTH: u16 = 320;
const DISPLAY_HEIGHT: u16 = 240;
/// Top-left of the 16x2 character area, centred for a 10x20 font.
const LCD_ORIGIN: Point = Point::new(80, 98);

const MAX_INIT_ATTEMPTS: u32 = 5;
const INIT_RETRY_DELAY: Duration = Duration::from_secs(2);
const CLOCK_REFRESH: Duration = Duration::from_secs(1);
const BUTTON_POLL: Duration = Duration::from_millis(5);

static APP_STATE: GlobalStateType = AsyncMutex::new(AppState::new());
/// Raised by the button to cut the current poll interval short.
static SAMPLE_NOW: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn sensor_task(spi: SensorSpi, config: MonitorConfig) {
    let mut pending = Bme280::new(spi, Delay, config.sensor);
    let mut attempt = 1;

    let mut sensor = loop {
        match pending.initialize().await {
            Ok(sensor) => break sensor,
            Err(failure) if attempt < MAX_INIT_ATTEMPTS => {
                warn!(
                    "BME280 init attempt {}/{} failed: {}",
                    attempt, MAX_INIT_ATTEMPTS, failure.error
                );
                pending = failure.sensor;
                attempt += 1;
                Timer::after(INIT_RETRY_DELAY).await;
            }
            Err(failure) => {
                warn!("BME280 unavailable after {} attempts, giving up", MAX_INIT_ATTEMPTS);
                APP_STATE.lock().await.report(AppError::from(failure.error));
                return;
            }
        }
    };
    APP_STATE.lock().await.sensor_configured();

    let poll = Duration::from_millis(u64::from(config.poll_interval_ms));
    loop {
        let outcome = AcquisitionOutcome::from(sensor.read_and_compensate().await);
        APP_STATE.lock().await.record(outcome);
        MEASUREMENT_CHANNEL.send(outcome).await;

        if let Either::Second(()) = select(Timer::after(poll), SAMPLE_NOW.wait()).await {
            debug!("Sampling early on button press");
        }
    }
}

#[embassy_executor::task]
async fn button_task(button: Input<'static>) {
    let mut debouncer = Debouncer::default();
    loop {
        // active low
        match debouncer.update(button.is_low(), Instant::now().as_millis()) {
            Some(ButtonEdge::Pressed) => debug!("Button pressed"),
            Some(ButtonEdge::Released) => debug!("Button released"),
            None => {}
        }
        if debouncer.read_key() {
            SAMPLE_NOW.signal(());
        }
        Timer::after(BUTTON_POLL).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let config = MonitorConfig::default();

    // Power first: the TFT rail comes from the AXP2101
    let mut i2c0 = create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11)
        .expect("Failed to configure I2C0");
    init_power(&mut i2c0).await;

    // Configure and initialize the display

    // 1. Configure SPI bus
    let spi_bus = Spi::new(peripherals.SPI2, Config::default())
        .expect("Failed to configure SPI2")
        .with_sck(peripherals.GPIO36)
        .with_mosi(peripherals.GPIO37);

    // 2. Chip select and data/command pins
    let cs = Output::new(peripherals.GPIO3, Level::High, OutputConfig::default());
    let dc = Output::new(peripherals.GPIO35, Level::Low, OutputConfig::default());

    // 3. Wrap the SPI bus as a SPI device (required by embedded-hal traits)
    let spi_device = ExclusiveDevice::new_no_delay(spi_bus, cs).expect("Failed to create display device");

    // 4. Create a buffer for SPI batching (larger = faster, uses more RAM)
    let mut spi_buffer = [0u8; 512];

    // 5. Create display interface
    let di = SpiInterface::new(spi_device, dc, &mut spi_buffer);

    // 6. Build and initialize the display driver
    let mut display = MipidsiBuilder::new(ILI9342CRgb565, di)
        .display_size(DISPLAY_WIDTH, DISPLAY_HEIGHT)
        .init(&mut Delay)
        .expect("Failed to initialize display");
    display.clear(Rgb565::BLACK).expect("Failed to clear display");

    info!("Display initialized!");

    // Sensor on its own SPI bus
    let sensor_bus = create_sensor_bus(
        peripherals.SPI3,
        peripherals.GPIO9,
        peripherals.GPIO8,
        peripherals.GPIO18,
    )
    .expect("Failed to configure SPI3");
    let sensor_spi = init_sensor_spi(sensor_bus, peripherals.GPIO17);

    let uart_tx = create_console_uart(peripherals.UART0, peripherals.GPIO43, peripherals.GPIO44)
        .expect("Failed to configure UART0");

    let button = Input::new(peripherals.GPIO1, InputConfig::default().with_pull(Pull::Up));

    spawner.spawn(sensor_task(sensor_spi, config).expect("Failed to spawn sensor task"));
    spawner.spawn(button_task(button).expect("Failed to spawn button task"));

    let lcd = GraphicsLcd::new(display, LCD_ORIGIN);
    let console = UartConsole::new(TimedUart::new(uart_tx));
    let clock = SoftwareRtc::new(EmbassyTicks, config.clock_start);
    let alarm = AlarmPolicy::new(config.alarm_threshold_centi_celsius);
    let mut monitor = Monitor::new(lcd, console, clock, alarm);

    rprintln!("Monitor running");

    // Presentation runs here; the clock ticks over between samples
    loop {
        match select(MEASUREMENT_CHANNEL.receive(), Timer::after(CLOCK_REFRESH)).await {
            Either::First(outcome) => {
                if let Err(e) = monitor.present(outcome).await {
                    APP_STATE.lock().await.report(AppError::from(e));
                }
            }
            Either::Second(()) => {
                if let Err(e) = monitor.refresh_clock() {
                    APP_STATE.lock().await.report(AppError::from(e));
                }
            }
        }
    }
}

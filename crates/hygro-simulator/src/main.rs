//! Desktop simulator for the hygro-rs temperature/humidity monitor.
//!
//! Runs the firmware's acquisition and presentation cycle against a
//! register-level model of the BME280. The 16x2 character display is drawn
//! into an SDL2 window via `embedded-graphics-simulator`, with the same
//! `GraphicsLcd` the firmware puts on its TFT; serial console lines go to
//! stdout.
//!
//! # Usage
//!
//! | Command                               | Action                              |
//! |---------------------------------------|-------------------------------------|
//! | `hygro-simulator`                     | run with the default config         |
//! | `hygro-simulator --config <file>`     | run with a postcard-encoded config  |
//! | `hygro-simulator --cycles <n>`        | stop after `n` samples              |
//! | `hygro-simulator --headless`          | draw off-screen, no window          |
//! | `hygro-simulator dump-config <file>`  | write the default config and exit   |
//!
//! # Key bindings
//!
//! | Key   | Action                       |
//! |-------|------------------------------|
//! | Space | Sample now (the button)      |
//! | Q     | Quit                         |
//!
//! Every 17th sample the bus faults and every 29th the chip id is wrong, so
//! the error path shows up on the display as well.

use std::io::Write as _;
use std::time::{Duration, Instant};
use std::{env, fs, process, thread};

use embassy_futures::block_on;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode,
};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType, Write};
use log::{debug, error, info};

use hygro_core::alarm::AlarmPolicy;
use hygro_core::app_state::{AppError, AppState, MEASUREMENT_CHANNEL};
use hygro_core::bme280::registers::EXPECTED_CHIP_ID;
use hygro_core::bme280::sim::SimulatedBme280;
use hygro_core::bme280::{Bme280, RawHumidity, RawTemperature};
use hygro_core::clock::{SoftwareRtc, TickSource};
use hygro_core::config::{MAX_ENCODED_LEN, MonitorConfig};
use hygro_core::display::GraphicsLcd;
use hygro_core::monitor::{AcquisitionOutcome, Monitor};
use hygro_core::serial::UartConsole;

const USAGE: &str =
    "usage: hygro-simulator [--config <file>] [--cycles <n>] [--headless]\n       hygro-simulator dump-config <file>";

// Same panel and character area as the firmware
const DISPLAY_SIZE: Size = Size::new(320, 240);
const LCD_ORIGIN: Point = Point::new(80, 98);
const WINDOW_SCALE: u32 = 2;
const FRAME_DURATION: Duration = Duration::from_millis(33);

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Raw temperature code that compensates to 24.00 °C with the model's calibration.
const RAW_T_AT_24C: f64 = 516_424.0;
const RAW_T_PER_DEGREE: f64 = 3_200.0;
/// Raw humidity code for 39.48 %RH at 25.08 °C.
const RAW_H_REFERENCE: f64 = 27_215.0;
const HUMIDITY_REFERENCE: f64 = 39.48;
const RAW_H_PER_PERCENT: f64 = 177.0;

const BUS_FAULT_EVERY: u64 = 17;
const WRONG_CHIP_EVERY: u64 = 29;
const WRONG_CHIP_ID: u8 = 0x58;

/// Generates raw ADC codes that drift across the alarm threshold.
struct MockSensorGenerator {
    elapsed_secs: f64,
}

impl MockSensorGenerator {
    fn new() -> Self {
        Self { elapsed_secs: 0.0 }
    }

    fn next_codes(&mut self, dt_secs: f64) -> (RawTemperature, RawHumidity) {
        self.elapsed_secs += dt_secs;
        let t = self.elapsed_secs;

        // Temperature: 21–27 °C, wobbling around the default threshold
        let temperature = 24.0 + 3.0 * (t / 90.0).sin() + 0.3 * (t / 7.0).cos();
        // Humidity: 40–60 %
        let humidity = 50.0 + 10.0 * (t / 150.0).sin() + 1.5 * (t / 11.0).cos();

        let raw_t = (RAW_T_AT_24C + (temperature - 24.0) * RAW_T_PER_DEGREE).clamp(0.0, 1_048_575.0);
        let raw_h = (RAW_H_REFERENCE + (humidity - HUMIDITY_REFERENCE) * RAW_H_PER_PERCENT).clamp(0.0, 65_535.0);

        let raw_t = RawTemperature::try_from(raw_t as u32).expect("clamped to 20 bits");
        (raw_t, RawHumidity::from(raw_h as u16))
    }
}

// ---------------------------------------------------------------------------
// Host adapters
// ---------------------------------------------------------------------------

type SimulatorLcd = GraphicsLcd<SimulatorDisplay<Rgb565>>;

fn simulator_lcd() -> SimulatorLcd {
    GraphicsLcd::new(SimulatorDisplay::new(DISPLAY_SIZE), LCD_ORIGIN)
}

/// stdout standing in for the UART.
struct StdoutSerial;

#[derive(Debug)]
struct StdoutError(std::io::ErrorKind);

impl core::fmt::Display for StdoutError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl std::error::Error for StdoutError {}

impl embedded_io_async::Error for StdoutError {
    fn kind(&self) -> ErrorKind {
        match self.0 {
            std::io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
            std::io::ErrorKind::Interrupted => ErrorKind::Interrupted,
            _ => ErrorKind::Other,
        }
    }
}

impl ErrorType for StdoutSerial {
    type Error = StdoutError;
}

impl Write for StdoutSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::stdout().lock().write(buf).map_err(|e| StdoutError(e.kind()))
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::stdout().lock().flush().map_err(|e| StdoutError(e.kind()))
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }
}

struct StdTicks {
    start: Instant,
}

impl TickSource for StdTicks {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Run {
        config: Option<String>,
        cycles: Option<u64>,
        headless: bool,
    },
    DumpConfig(String),
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut config = None;
    let mut cycles = None;
    let mut headless = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "dump-config" => {
                let path = args.next().ok_or("dump-config needs a path")?;
                return Ok(Command::DumpConfig(path));
            }
            "--config" => config = Some(args.next().ok_or("--config needs a path")?),
            "--cycles" => {
                let n = args.next().ok_or("--cycles needs a count")?;
                cycles = Some(n.parse().map_err(|_| format!("invalid cycle count: {n}"))?);
            }
            "--headless" => headless = true,
            other => return Err(format!("unexpected argument: {other}")),
        }
    }
    Ok(Command::Run {
        config,
        cycles,
        headless,
    })
}

fn load_config(path: Option<&str>) -> MonitorConfig {
    let Some(path) = path else {
        return MonitorConfig::default();
    };
    let bytes = fs::read(path).unwrap_or_else(|e| {
        error!("Cannot read {path}: {e}");
        process::exit(1);
    });
    MonitorConfig::from_postcard(&bytes).unwrap_or_else(|e| {
        error!("Bad config {path}: {}", AppError::from(e));
        process::exit(1);
    })
}

fn dump_config(path: &str) {
    let mut buffer = [0u8; MAX_ENCODED_LEN];
    let written = MonitorConfig::default()
        .to_postcard(&mut buffer)
        .map(|encoded| fs::write(path, encoded));
    match written {
        Ok(Ok(())) => info!("Default config written to {path}"),
        Ok(Err(e)) => {
            error!("Cannot write {path}: {e}");
            process::exit(1);
        }
        Err(e) => {
            error!("Cannot encode config: {e}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn run(config: MonitorConfig, cycles: Option<u64>, headless: bool) {
    info!("Starting hygro-rs simulator");
    info!(
        "Poll interval {} ms, alarm above {}.{:02} °C",
        config.poll_interval_ms,
        config.alarm_threshold_centi_celsius / 100,
        (config.alarm_threshold_centi_celsius % 100).abs()
    );

    let mut app_state = AppState::new();
    let pending = Bme280::new(SimulatedBme280::new(), StdDelay, config.sensor);
    let mut sensor = match block_on(pending.initialize()) {
        Ok(sensor) => sensor,
        Err(failure) => {
            app_state.report(AppError::from(failure.error));
            process::exit(1);
        }
    };
    app_state.sensor_configured();

    let clock = SoftwareRtc::new(
        StdTicks {
            start: Instant::now(),
        },
        config.clock_start,
    );
    let alarm = AlarmPolicy::new(config.alarm_threshold_centi_celsius);
    let mut monitor = Monitor::new(simulator_lcd(), UartConsole::new(StdoutSerial), clock, alarm);

    let mut window = (!headless).then(|| {
        info!("Keys: Space=Sample now  Q=Quit");
        let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
        Window::new("Hygro Simulator", &output_settings)
    });
    // The SDL window is created by the first `update()`, which must come
    // before `events()`
    if let Some(window) = window.as_mut() {
        window.update(monitor.display().target());
    }

    let poll = Duration::from_millis(config.poll_interval_ms.into());
    let mut generator = MockSensorGenerator::new();
    let mut last_sample = Instant::now();
    let mut next_sample = last_sample;
    let mut cycle = 0u64;

    'running: loop {
        let frame_start = Instant::now();

        if let Some(window) = window.as_mut() {
            for event in window.events() {
                match event {
                    SimulatorEvent::Quit => break 'running,
                    SimulatorEvent::KeyDown { keycode, .. } => {
                        if keycode == Keycode::Q || keycode == Keycode::Escape {
                            break 'running;
                        }
                        if keycode == Keycode::Space {
                            debug!("Sampling early on key press");
                            next_sample = frame_start;
                        }
                    }
                    _ => {}
                }
            }
        }

        if frame_start >= next_sample {
            if cycles.is_some_and(|n| cycle >= n) {
                break;
            }
            cycle += 1;

            let (raw_t, raw_h) = generator.next_codes(last_sample.elapsed().as_secs_f64());
            last_sample = frame_start;
            next_sample = frame_start + poll;

            let model = sensor.spi_mut();
            model.set_raw(raw_t, raw_h);
            model.set_bus_fault(cycle % BUS_FAULT_EVERY == 0);
            model.set_chip_id(if cycle % WRONG_CHIP_EVERY == 0 {
                WRONG_CHIP_ID
            } else {
                EXPECTED_CHIP_ID
            });

            // Same hand-off as the firmware tasks, on one thread
            let outcome = block_on(async {
                let outcome = AcquisitionOutcome::from(sensor.read_and_compensate().await);
                MEASUREMENT_CHANNEL.send(outcome).await;
                MEASUREMENT_CHANNEL.receive().await
            });
            let run_state = app_state.record(outcome);
            debug!("Cycle {cycle}: {outcome:?}, run state {run_state:?}");

            if let Err(e) = block_on(monitor.present(outcome)) {
                app_state.report(AppError::from(e));
            }
        } else if let Err(e) = monitor.refresh_clock() {
            app_state.report(AppError::from(e));
        }

        if let Some(window) = window.as_mut() {
            window.update(monitor.display().target());
        }

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    info!("Simulator exiting after {cycle} samples");
}

fn main() {
    env_logger::init();

    match parse_args(env::args().skip(1)) {
        Ok(Command::DumpConfig(path)) => dump_config(&path),
        Ok(Command::Run {
            config,
            cycles,
            headless,
        }) => run(load_config(config.as_deref()), cycles, headless),
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            process::exit(2);
        }
    }
}

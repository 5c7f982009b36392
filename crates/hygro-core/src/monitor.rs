//! Presentation of acquisition results.
//!
//! The [`Monitor`] takes one [`AcquisitionOutcome`] at a time and updates the
//! character display, the serial console and the alarm policy from it. Both
//! values of a sample are presented together before the next outcome is
//! accepted.
//!
//! LCD layout (16x2):
//!
//! ```text
//! col 0       8 9
//!     HH:MM:SS   H:hh.hh
//!     DD/MM/YY   T:tt.tt     (or "ALARM!  " in place of the date)
//! ```

use core::fmt::{Debug, Write as _};

use heapless::String;
use log::{error, warn};
use thiserror_no_std::Error;

use crate::alarm::{AlarmPolicy, AlarmState};
use crate::bme280::{Bme280Error, Measurement};
use crate::clock::{DateTime, RealTimeClock};
use crate::display::{CharacterDisplay, LcdLine};
use crate::serial::SerialConsole;

const CLOCK_POSITION: u8 = 0;
const BANNER_POSITION: u8 = 0;
const READING_POSITION: u8 = 9;
const HUMIDITY_LABEL: &str = "H:";
const TEMPERATURE_LABEL: &str = "T:";
const ALARM_BANNER: &str = "ALARM!  ";
const PLACEHOLDER: &str = "--.--";

/// Formatted reading, sign and two fractional digits.
pub type Reading = String<12>;
type Line = String<64>;

/// Why an acquisition produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionFault {
    ChipIdMismatch { found: u8 },
    Bus,
    NotConfigured,
}

impl<E> From<&Bme280Error<E>> for AcquisitionFault {
    fn from(error: &Bme280Error<E>) -> Self {
        match error {
            Bme280Error::ChipIdMismatch { found } => AcquisitionFault::ChipIdMismatch { found: *found },
            Bme280Error::Bus(_) => AcquisitionFault::Bus,
            Bme280Error::Calibration(_) | Bme280Error::Configuration { .. } => AcquisitionFault::NotConfigured,
        }
    }
}

/// One acquisition cycle's result, as handed from acquisition to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    Sample(Measurement),
    Failed(AcquisitionFault),
}

impl<E> From<Result<Measurement, Bme280Error<E>>> for AcquisitionOutcome {
    fn from(result: Result<Measurement, Bme280Error<E>>) -> Self {
        match result {
            Ok(measurement) => AcquisitionOutcome::Sample(measurement),
            Err(error) => AcquisitionOutcome::Failed((&error).into()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentationError {
    #[error("display error: {0}")]
    Display(String<64>),
    #[error("serial error: {0}")]
    Serial(String<64>),
}

fn describe<E: Debug>(error: &E) -> String<64> {
    let mut text = String::new();
    // truncated if longer than the buffer
    let _ = write!(text, "{:?}", error);
    text
}

/// Hundredths as `[-]u.hh`.
pub fn format_centi(value: i32) -> Reading {
    let mut text = Reading::new();
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let _ = write!(text, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100);
    text
}

/// Q22.10 %RH truncated to two decimals.
pub fn format_humidity(q22_10: u32) -> Reading {
    let hundredths = u64::from(q22_10) * 100 / 1024;
    let mut text = Reading::new();
    let _ = write!(text, "{}.{:02}", hundredths / 100, hundredths % 100);
    text
}

/// Display, console and alarm policy driven by acquisition outcomes.
pub struct Monitor<L, C, R> {
    display: L,
    console: C,
    clock: R,
    alarm: AlarmPolicy,
}

impl<L, C, R> Monitor<L, C, R>
where
    L: CharacterDisplay,
    C: SerialConsole,
    R: RealTimeClock,
{
    pub fn new(display: L, console: C, clock: R, alarm: AlarmPolicy) -> Self {
        Self {
            display,
            console,
            clock,
            alarm,
        }
    }

    pub fn alarm(&self) -> &AlarmPolicy {
        &self.alarm
    }

    pub fn display(&self) -> &L {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut L {
        &mut self.display
    }

    pub fn clock_mut(&mut self) -> &mut R {
        &mut self.clock
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Redraw the time of day on line 1.
    pub fn refresh_clock(&mut self) -> Result<DateTime, PresentationError> {
        let now = self.clock.current_time_date();
        let mut time = Reading::new();
        let _ = write!(time, "{}", now.time);
        self.show(CLOCK_POSITION, LcdLine::One, &time)?;
        Ok(now)
    }

    /// Present one outcome and return the resulting alarm state.
    ///
    /// A failed acquisition blanks the readings and leaves the alarm state
    /// as it was. The alarm policy and the display are updated before the
    /// console is written, so a console failure never holds back the banner.
    /// When both outputs fail the display error is returned.
    pub async fn present(&mut self, outcome: AcquisitionOutcome) -> Result<AlarmState, PresentationError> {
        let state = match outcome {
            AcquisitionOutcome::Sample(measurement) => {
                self.alarm.evaluate(measurement.temperature_centi_celsius).state
            }
            AcquisitionOutcome::Failed(fault) => {
                warn!("No sample this cycle: {:?}", fault);
                self.alarm.state()
            }
        };

        let shown = self.draw(outcome, state);
        let sent = self.report(outcome, state).await;
        shown.and(sent).map(|()| state)
    }

    fn draw(&mut self, outcome: AcquisitionOutcome, state: AlarmState) -> Result<(), PresentationError> {
        let now = self.refresh_clock()?;

        match outcome {
            AcquisitionOutcome::Sample(measurement) => self.show_readings(
                &format_humidity(measurement.humidity_q22_10),
                &format_centi(measurement.temperature_centi_celsius),
            )?,
            AcquisitionOutcome::Failed(_) => self.show_readings(PLACEHOLDER, PLACEHOLDER)?,
        }

        match state {
            AlarmState::Alarm => self.show(BANNER_POSITION, LcdLine::Two, ALARM_BANNER),
            AlarmState::Normal => {
                let mut date = Reading::new();
                let _ = write!(date, "{}", now.date);
                self.show(BANNER_POSITION, LcdLine::Two, &date)
            }
        }
    }

    async fn report(&mut self, outcome: AcquisitionOutcome, state: AlarmState) -> Result<(), PresentationError> {
        let mut line = Line::new();
        match outcome {
            AcquisitionOutcome::Sample(measurement) => {
                let _ = write!(line, "Temperature: {} C", format_centi(measurement.temperature_centi_celsius));
                self.send(&line).await?;
                line.clear();
                let _ = write!(line, "Humidity: {} %", format_humidity(measurement.humidity_q22_10));
                self.send(&line).await?;
                self.send(state.log_line()).await
            }
            AcquisitionOutcome::Failed(fault) => {
                let _ = match fault {
                    AcquisitionFault::ChipIdMismatch { found } => {
                        write!(line, "Sensor error: unexpected chip id {:#04x}", found)
                    }
                    AcquisitionFault::Bus => write!(line, "Sensor error: bus fault"),
                    AcquisitionFault::NotConfigured => write!(line, "Sensor error: not configured"),
                };
                self.send(&line).await
            }
        }
    }

    fn show_readings(&mut self, humidity: &str, temperature: &str) -> Result<(), PresentationError> {
        self.display
            .display_two_fields(READING_POSITION, LcdLine::One, HUMIDITY_LABEL, humidity)
            .and_then(|_| {
                self.display
                    .display_two_fields(READING_POSITION, LcdLine::Two, TEMPERATURE_LABEL, temperature)
            })
            .map_err(|e| {
                error!("Display update failed: {:?}", e);
                PresentationError::Display(describe(&e))
            })
    }

    fn show(&mut self, position: u8, line: LcdLine, text: &str) -> Result<(), PresentationError> {
        self.display.display_message(position, line, text).map_err(|e| {
            error!("Display update failed: {:?}", e);
            PresentationError::Display(describe(&e))
        })
    }

    async fn send(&mut self, line: &str) -> Result<(), PresentationError> {
        self.console.send_line(line).await.map_err(|e| {
            error!("Serial send failed: {:?}", e);
            PresentationError::Serial(describe(&e))
        })
    }
}

//! Application-wide state and error types for Hygro

use core::fmt::Write as _;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex as AsyncMutex;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::bme280::Bme280Error;
use crate::config::ConfigError;
use crate::monitor::{AcquisitionOutcome, PresentationError};

pub const MEASUREMENT_CHANNEL_DEPTH: usize = 4;

/// Consecutive failed acquisitions before the run state drops to `Error`.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Acquisition outcomes, from the sensor task to the presentation task.
///
/// Each outcome carries both values of one sample, so a receiver never sees a
/// temperature without its humidity.
pub static MEASUREMENT_CHANNEL: Channel<CriticalSectionRawMutex, AcquisitionOutcome, MEASUREMENT_CHANNEL_DEPTH> =
    Channel::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    Configured,
    Sampling,
    Error,
}

/// Main application state container
pub struct AppState {
    pub run_state: AppRunState,
    pub consecutive_failures: u32,
    pub last_outcome: Option<AcquisitionOutcome>,
    pub last_error: Option<AppError>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub const fn new() -> Self {
        Self {
            run_state: AppRunState::Uninitialized,
            consecutive_failures: 0,
            last_outcome: None,
            last_error: None,
        }
    }

    /// Mark the sensor configured and ready to sample.
    pub fn sensor_configured(&mut self) {
        info!("Sensor configured");
        self.run_state = AppRunState::Configured;
        self.consecutive_failures = 0;
    }

    /// Fold an acquisition outcome into the run state.
    pub fn record(&mut self, outcome: AcquisitionOutcome) -> AppRunState {
        self.last_outcome = Some(outcome);
        match outcome {
            AcquisitionOutcome::Sample(_) => {
                self.consecutive_failures = 0;
                self.run_state = AppRunState::Sampling;
            }
            AcquisitionOutcome::Failed(fault) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES && self.run_state != AppRunState::Error {
                    warn!(
                        "{} consecutive acquisition failures, last: {:?}",
                        self.consecutive_failures, fault
                    );
                    self.run_state = AppRunState::Error;
                }
            }
        }
        self.run_state
    }

    /// Keep an application error for later inspection.
    ///
    /// A sensor error stops sampling for good; the other kinds leave the run
    /// state alone.
    pub fn report(&mut self, failure: AppError) -> AppRunState {
        error!("{}", failure);
        if let AppError::Sensor(_) = failure {
            self.run_state = AppRunState::Error;
        }
        self.last_error = Some(failure);
        self.run_state
    }
}

pub type GlobalStateType = AsyncMutex<CriticalSectionRawMutex, AppState>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Sensor error: {0}")]
    Sensor(heapless::String<64>),
    #[error("Presentation error: {0}")]
    Presentation(heapless::String<64>),
    #[error("Config error: {0}")]
    Config(heapless::String<64>),
}

impl<E: core::fmt::Debug> From<Bme280Error<E>> for AppError {
    fn from(error: Bme280Error<E>) -> Self {
        AppError::Sensor(heapless::String::from_truncated(format_args!("{}", error)))
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        AppError::Config(heapless::String::from_truncated(format_args!("{}", error)))
    }
}

impl From<PresentationError> for AppError {
    fn from(error: PresentationError) -> Self {
        AppError::Presentation(heapless::String::from_truncated(format_args!("{}", error)))
    }
}

/// Build a bounded string, dropping whatever does not fit.
pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<const N: usize> FromTruncated<core::fmt::Arguments<'_>> for heapless::String<N> {
    fn from_truncated(value: core::fmt::Arguments<'_>) -> Self {
        let mut text = heapless::String::new();
        let _ = text.write_fmt(value);
        text
    }
}

impl<const N: usize> FromTruncated<&str> for heapless::String<N> {
    fn from_truncated(value: &str) -> Self {
        let mut text = heapless::String::new();
        for c in value.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bme280::Measurement;
    use crate::monitor::AcquisitionFault;
    use embassy_futures::block_on;

    const SAMPLE: AcquisitionOutcome = AcquisitionOutcome::Sample(Measurement {
        temperature_centi_celsius: 2508,
        humidity_q22_10: 40_426,
    });
    const BUS_FAULT: AcquisitionOutcome = AcquisitionOutcome::Failed(AcquisitionFault::Bus);

    #[test]
    fn run_state_follows_outcomes() {
        let mut state = AppState::new();
        assert_eq!(state.run_state, AppRunState::Uninitialized);

        state.sensor_configured();
        assert_eq!(state.run_state, AppRunState::Configured);
        assert_eq!(state.record(SAMPLE), AppRunState::Sampling);

        for _ in 0..MAX_CONSECUTIVE_FAILURES - 1 {
            assert_eq!(state.record(BUS_FAULT), AppRunState::Sampling);
        }
        assert_eq!(state.record(BUS_FAULT), AppRunState::Error);
        assert_eq!(state.last_outcome, Some(BUS_FAULT));

        assert_eq!(state.record(SAMPLE), AppRunState::Sampling);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn global_state_behind_async_mutex() {
        static STATE: GlobalStateType = AsyncMutex::new(AppState::new());

        block_on(async {
            STATE.lock().await.record(SAMPLE);
            assert_eq!(STATE.lock().await.run_state, AppRunState::Sampling);
        });
    }

    #[test]
    fn channel_keeps_samples_in_order() {
        let channel: Channel<CriticalSectionRawMutex, AcquisitionOutcome, MEASUREMENT_CHANNEL_DEPTH> =
            Channel::new();
        channel.try_send(SAMPLE).unwrap();
        channel.try_send(BUS_FAULT).unwrap();

        assert_eq!(channel.try_receive().unwrap(), SAMPLE);
        assert_eq!(channel.try_receive().unwrap(), BUS_FAULT);
        assert!(channel.try_receive().is_err());
    }

    #[test]
    fn truncated_strings() {
        let text: heapless::String<4> = heapless::String::from_truncated("overflow");
        assert_eq!(text, "over");

        let error: AppError = ConfigError::ZeroPollInterval.into();
        assert!(matches!(error, AppError::Config(ref s) if s == "poll interval must be non-zero"));
    }

    #[test]
    fn sensor_error_stops_sampling() {
        let mut state = AppState::new();
        state.sensor_configured();

        let presentation = PresentationError::Serial(heapless::String::from_truncated("\"tx timeout\""));
        assert_eq!(state.report(presentation.into()), AppRunState::Configured);
        assert!(matches!(state.last_error, Some(AppError::Presentation(ref s)) if s.starts_with("serial error")));

        let chip: Bme280Error<()> = Bme280Error::ChipIdMismatch { found: 0x58 };
        assert_eq!(state.report(chip.into()), AppRunState::Error);
        assert!(matches!(state.last_error, Some(AppError::Sensor(_))));

        let long = "a sentence far longer than sixty-four characters that will not fit in the buffer";
        let error = AppError::Config(heapless::String::from_truncated(long));
        assert!(matches!(error, AppError::Config(ref s) if s.len() == 64));
    }
}

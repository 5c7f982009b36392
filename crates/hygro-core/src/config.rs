//! Monitor configuration, stored and exchanged as postcard bytes.

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::alarm::DEFAULT_THRESHOLD_CENTI_CELSIUS;
use crate::bme280::Settings;
use crate::clock::{CalendarDate, ClockError, DateTime, TimeOfDay};

/// Upper bound on the encoded size of a [`MonitorConfig`].
pub const MAX_ENCODED_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config decode failed: {0:?}")]
    Decode(postcard::Error),
    #[error("config encode failed: {0:?}")]
    Encode(postcard::Error),
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,
    #[error("invalid clock start: {0}")]
    ClockStart(ClockError),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub sensor: Settings,
    /// Readings strictly above this raise the alarm.
    pub alarm_threshold_centi_celsius: i32,
    pub poll_interval_ms: u32,
    pub clock_start: DateTime,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sensor: Settings::default(),
            alarm_threshold_centi_celsius: DEFAULT_THRESHOLD_CENTI_CELSIUS,
            poll_interval_ms: 1000,
            clock_start: DateTime::factory_default(),
        }
    }
}

impl MonitorConfig {
    /// Decode and validate a config.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(ConfigError::Decode)?;
        config.validate()?;
        Ok(config)
    }

    /// Encode into `buffer`, returning the used prefix.
    pub fn to_postcard<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(ConfigError::Encode)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        // decoded values bypass the constructors
        let time = self.clock_start.time;
        TimeOfDay::new(time.hours(), time.minutes(), time.seconds()).map_err(ConfigError::ClockStart)?;
        let date = self.clock_start.date;
        CalendarDate::new(date.day(), date.month(), date.year()).map_err(ConfigError::ClockStart)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bme280::registers::{Filter, Oversampling};

    #[test]
    fn defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.sensor.ctrl_hum(), 0x05);
        assert_eq!(config.sensor.ctrl_meas(), 0xA3);
        assert_eq!(config.sensor.config(), 0x0C);
        assert_eq!(config.alarm_threshold_centi_celsius, 2400);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.clock_start, DateTime::factory_default());
    }

    #[test]
    fn postcard_round_trip_keeps_custom_settings() {
        let mut config = MonitorConfig::default();
        config.sensor.humidity_oversampling = Oversampling::X4;
        config.sensor.filter = Filter::Off;
        config.alarm_threshold_centi_celsius = -150;

        let mut buffer = [0u8; MAX_ENCODED_LEN];
        let encoded = config.to_postcard(&mut buffer).unwrap();
        let decoded = MonitorConfig::from_postcard(encoded).unwrap();

        assert_eq!(decoded, config);
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let mut buffer = [0u8; MAX_ENCODED_LEN];
        let encoded = MonitorConfig::default().to_postcard(&mut buffer).unwrap();
        let len = encoded.len();

        assert!(matches!(
            MonitorConfig::from_postcard(&buffer[..len - 1]),
            Err(ConfigError::Decode(_))
        ));
    }

    #[test]
    fn encode_into_short_buffer_fails() {
        let mut buffer = [0u8; 4];
        assert!(matches!(
            MonitorConfig::default().to_postcard(&mut buffer),
            Err(ConfigError::Encode(_))
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = MonitorConfig {
            poll_interval_ms: 0,
            ..MonitorConfig::default()
        };
        let mut buffer = [0u8; MAX_ENCODED_LEN];
        let encoded = config.to_postcard(&mut buffer).unwrap();

        assert_eq!(MonitorConfig::from_postcard(encoded), Err(ConfigError::ZeroPollInterval));
    }
}

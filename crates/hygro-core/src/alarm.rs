//! Two-state temperature alarm.

use log::info;
use serde::{Deserialize, Serialize};

/// 24.00 °C
pub const DEFAULT_THRESHOLD_CENTI_CELSIUS: i32 = 2400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlarmState {
    #[default]
    Normal,
    Alarm,
}

impl AlarmState {
    /// Fixed console line announcing the state.
    pub const fn log_line(self) -> &'static str {
        match self {
            AlarmState::Normal => "Temperature Normal State.",
            AlarmState::Alarm => "Temperature Alarm State.",
        }
    }
}

/// Result of feeding one reading to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEvaluation {
    pub state: AlarmState,
    pub changed: bool,
}

/// Threshold comparison without hysteresis: strictly above the threshold is
/// [`AlarmState::Alarm`], anything else is [`AlarmState::Normal`].
#[derive(Debug, Clone)]
pub struct AlarmPolicy {
    threshold_centi_celsius: i32,
    state: AlarmState,
}

impl Default for AlarmPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_CENTI_CELSIUS)
    }
}

impl AlarmPolicy {
    pub const fn new(threshold_centi_celsius: i32) -> Self {
        Self {
            threshold_centi_celsius,
            state: AlarmState::Normal,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn threshold_centi_celsius(&self) -> i32 {
        self.threshold_centi_celsius
    }

    pub fn evaluate(&mut self, temperature_centi_celsius: i32) -> AlarmEvaluation {
        let next = if temperature_centi_celsius > self.threshold_centi_celsius {
            AlarmState::Alarm
        } else {
            AlarmState::Normal
        };

        let changed = next != self.state;
        if changed {
            info!(
                "Alarm {:?} -> {:?} at {} centi-°C",
                self.state, next, temperature_centi_celsius
            );
        }
        self.state = next;

        AlarmEvaluation { state: next, changed }
    }
}

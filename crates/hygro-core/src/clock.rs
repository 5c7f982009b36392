//! Calendar time for the clock readout.
//!
//! [`RealTimeClock`] is the get/set contract the monitor uses. Boards without
//! a battery-backed RTC use [`SoftwareRtc`], which derives calendar time from
//! a monotonic millisecond tick.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

const SECONDS_PER_MINUTE: u32 = 60;
const SECONDS_PER_HOUR: u32 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: u32 = 24 * SECONDS_PER_HOUR;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("invalid time of day {0:02}:{1:02}:{2:02}")]
    InvalidTime(u8, u8, u8),
    #[error("invalid date {0:02}/{1:02}/{2}")]
    InvalidDate(u8, u8, u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeOfDay {
    hours: u8,
    minutes: u8,
    seconds: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    pub fn new(hours: u8, minutes: u8, seconds: u8) -> Result<Self, ClockError> {
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(ClockError::InvalidTime(hours, minutes, seconds));
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
        })
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn seconds(&self) -> u8 {
        self.seconds
    }

    fn seconds_of_day(&self) -> u32 {
        u32::from(self.hours) * SECONDS_PER_HOUR
            + u32::from(self.minutes) * SECONDS_PER_MINUTE
            + u32::from(self.seconds)
    }

    fn from_seconds_of_day(seconds: u32) -> Self {
        let seconds = seconds % SECONDS_PER_DAY;
        Self {
            hours: (seconds / SECONDS_PER_HOUR) as u8,
            minutes: (seconds % SECONDS_PER_HOUR / SECONDS_PER_MINUTE) as u8,
            seconds: (seconds % SECONDS_PER_MINUTE) as u8,
        }
    }
}

/// `HH:MM:SS`
impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarDate {
    year: u16,
    month: u8,
    day: u8,
}

impl CalendarDate {
    pub fn new(day: u8, month: u8, year: u16) -> Result<Self, ClockError> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(month, year) {
            return Err(ClockError::InvalidDate(day, month, year));
        }
        Ok(Self { year, month, day })
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn next_day(self) -> Self {
        if self.day < days_in_month(self.month, self.year) {
            Self {
                day: self.day + 1,
                ..self
            }
        } else if self.month < 12 {
            Self {
                day: 1,
                month: self.month + 1,
                ..self
            }
        } else {
            Self {
                day: 1,
                month: 1,
                year: self.year.wrapping_add(1),
            }
        }
    }
}

/// `DD/MM/YY`
impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:02}", self.day, self.month, self.year % 100)
    }
}

pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(month: u8, year: u16) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn next(self) -> Self {
        match self {
            Weekday::Monday => Weekday::Tuesday,
            Weekday::Tuesday => Weekday::Wednesday,
            Weekday::Wednesday => Weekday::Thursday,
            Weekday::Thursday => Weekday::Friday,
            Weekday::Friday => Weekday::Saturday,
            Weekday::Saturday => Weekday::Sunday,
            Weekday::Sunday => Weekday::Monday,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTime {
    pub time: TimeOfDay,
    pub date: CalendarDate,
    pub weekday: Weekday,
}

impl DateTime {
    /// Monday 05/08/2024 01:20:00
    pub fn factory_default() -> Self {
        Self {
            time: TimeOfDay {
                hours: 1,
                minutes: 20,
                seconds: 0,
            },
            date: CalendarDate {
                year: 2024,
                month: 8,
                day: 5,
            },
            weekday: Weekday::Monday,
        }
    }

    /// Advance by `seconds`, rolling over days, months and years.
    pub fn advanced_by(self, seconds: u64) -> Self {
        let total = u64::from(self.time.seconds_of_day()) + seconds;
        let days = total / u64::from(SECONDS_PER_DAY);
        let mut next = Self {
            time: TimeOfDay::from_seconds_of_day((total % u64::from(SECONDS_PER_DAY)) as u32),
            ..self
        };
        for _ in 0..days {
            next.date = next.date.next_day();
            next.weekday = next.weekday.next();
        }
        next
    }
}

impl Default for DateTime {
    fn default() -> Self {
        Self::factory_default()
    }
}

/// Get/set access to the board's calendar clock.
pub trait RealTimeClock {
    fn current_time_date(&mut self) -> DateTime;
    fn set_time_date(&mut self, now: DateTime);
}

/// Monotonic millisecond counter.
pub trait TickSource {
    fn now_ms(&self) -> u64;
}

/// Calendar clock kept in software on top of a [`TickSource`].
pub struct SoftwareRtc<T> {
    ticks: T,
    anchor: DateTime,
    anchor_ms: u64,
}

impl<T: TickSource> SoftwareRtc<T> {
    pub fn new(ticks: T, start: DateTime) -> Self {
        let anchor_ms = ticks.now_ms();
        Self {
            ticks,
            anchor: start,
            anchor_ms,
        }
    }

    pub fn ticks(&self) -> &T {
        &self.ticks
    }
}

impl<T: TickSource> RealTimeClock for SoftwareRtc<T> {
    fn current_time_date(&mut self) -> DateTime {
        let elapsed_s = self.ticks.now_ms().saturating_sub(self.anchor_ms) / 1000;
        if elapsed_s > 0 {
            // re-anchor so each call only walks the days since the last one
            self.anchor = self.anchor.advanced_by(elapsed_s);
            self.anchor_ms += elapsed_s * 1000;
        }
        self.anchor
    }

    fn set_time_date(&mut self, now: DateTime) {
        self.anchor = now;
        self.anchor_ms = self.ticks.now_ms();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::cell::Cell;
    use std::rc::Rc;

    /// Tick source the test advances by hand.
    #[derive(Clone, Default)]
    pub(crate) struct ManualTicks(pub Rc<Cell<u64>>);

    impl ManualTicks {
        pub fn advance(&self, ms: u64) {
            self.0.set(self.0.get() + ms);
        }
    }

    impl TickSource for ManualTicks {
        fn now_ms(&self) -> u64 {
            self.0.get()
        }
    }

    #[test]
    fn formats_like_the_lcd_readout() {
        let now = DateTime::factory_default();
        assert_eq!(format!("{}", now.time), "01:20:00");
        assert_eq!(format!("{}", now.date), "05/08/24");
    }

    #[test]
    fn rejects_invalid_fields() {
        assert_eq!(TimeOfDay::new(24, 0, 0), Err(ClockError::InvalidTime(24, 0, 0)));
        assert_eq!(TimeOfDay::new(0, 60, 0), Err(ClockError::InvalidTime(0, 60, 0)));
        assert!(TimeOfDay::new(23, 59, 59).is_ok());

        assert_eq!(CalendarDate::new(29, 2, 2023), Err(ClockError::InvalidDate(29, 2, 2023)));
        assert!(CalendarDate::new(29, 2, 2024).is_ok());
        assert!(CalendarDate::new(31, 4, 2024).is_err());
        assert!(CalendarDate::new(1, 13, 2024).is_err());
        assert!(CalendarDate::new(0, 1, 2024).is_err());
    }

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2100));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn midnight_rolls_the_date_and_weekday() {
        let start = DateTime {
            time: TimeOfDay::new(23, 59, 59).unwrap(),
            date: CalendarDate::new(31, 12, 2024).unwrap(),
            weekday: Weekday::Tuesday,
        };
        let next = start.advanced_by(1);

        assert_eq!(next.time, TimeOfDay::MIDNIGHT);
        assert_eq!(next.date, CalendarDate::new(1, 1, 2025).unwrap());
        assert_eq!(next.weekday, Weekday::Wednesday);
    }

    #[test]
    fn february_in_a_leap_year() {
        let date = CalendarDate::new(28, 2, 2024).unwrap();
        assert_eq!(date.next_day(), CalendarDate::new(29, 2, 2024).unwrap());
        assert_eq!(date.next_day().next_day(), CalendarDate::new(1, 3, 2024).unwrap());

        let date = CalendarDate::new(28, 2, 2023).unwrap();
        assert_eq!(date.next_day(), CalendarDate::new(1, 3, 2023).unwrap());
    }

    #[test]
    fn software_rtc_follows_the_tick() {
        let ticks = ManualTicks::default();
        let mut rtc = SoftwareRtc::new(ticks.clone(), DateTime::factory_default());

        ticks.advance(999);
        assert_eq!(rtc.current_time_date().time, TimeOfDay::new(1, 20, 0).unwrap());

        ticks.advance(1);
        assert_eq!(rtc.current_time_date().time, TimeOfDay::new(1, 20, 1).unwrap());

        // partial seconds carry over between calls
        ticks.advance(1_500);
        assert_eq!(rtc.current_time_date().time, TimeOfDay::new(1, 20, 2).unwrap());
        ticks.advance(500);
        assert_eq!(rtc.current_time_date().time, TimeOfDay::new(1, 20, 3).unwrap());
    }

    #[test]
    fn software_rtc_crosses_a_week() {
        let ticks = ManualTicks::default();
        let mut rtc = SoftwareRtc::new(ticks.clone(), DateTime::factory_default());

        ticks.advance(7 * 24 * 3600 * 1000);
        let now = rtc.current_time_date();
        assert_eq!(now.date, CalendarDate::new(12, 8, 2024).unwrap());
        assert_eq!(now.weekday, Weekday::Monday);
        assert_eq!(now.time, TimeOfDay::new(1, 20, 0).unwrap());
    }

    #[test]
    fn set_time_date_re_anchors() {
        let ticks = ManualTicks::default();
        let mut rtc = SoftwareRtc::new(ticks.clone(), DateTime::factory_default());
        ticks.advance(10_000);

        let now = DateTime {
            time: TimeOfDay::new(12, 0, 0).unwrap(),
            date: CalendarDate::new(1, 1, 2030).unwrap(),
            weekday: Weekday::Tuesday,
        };
        rtc.set_time_date(now);
        assert_eq!(rtc.current_time_date(), now);

        ticks.advance(61_000);
        assert_eq!(rtc.current_time_date().time, TimeOfDay::new(12, 1, 1).unwrap());
    }
}

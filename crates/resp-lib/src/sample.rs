use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Date layout written by the instrument.
pub const DATE_FORMAT: &str = "%d/%m/%y";
/// Time-of-day layout written by the instrument.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// One data row of the oxygen log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Date as written by the instrument (`dd/mm/yy`)
    pub date: String,
    /// Time of day as written by the instrument (`HH:MM:SS`)
    pub time: String,
    /// Dissolved oxygen (mg/L)
    pub oxygen: f64,
    /// Water temperature (°C)
    pub temperature: f64,
    /// Combined date and time, resolved once at parse time
    pub recorded_at: NaiveDateTime,
}

impl RawSample {
    /// Build a sample from the instrument's native strings. Returns `None` when
    /// the date or time does not name a real instant.
    pub fn new(date: &str, time: &str, oxygen: f64, temperature: f64) -> Option<Self> {
        let day = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
        let clock = NaiveTime::parse_from_str(time, TIME_FORMAT).ok()?;
        Some(Self {
            date: date.to_string(),
            time: time.to_string(),
            oxygen,
            temperature,
            recorded_at: NaiveDateTime::new(day, clock),
        })
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.recorded_at.time()
    }

    /// `dd/mm/yy HH:MM:SS`, the form used in exported summaries.
    pub fn label(&self) -> String {
        format!("{} {}", self.date, self.time)
    }
}

/// Length of a closed cycle (or of the flush between cycles) as minutes and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleDuration {
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

impl CycleDuration {
    pub const ZERO: CycleDuration = CycleDuration {
        minutes: 0,
        seconds: 0,
    };

    pub fn new(minutes: u32, seconds: u32) -> Self {
        Self { minutes, seconds }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.total_seconds() as i64)
    }
}

impl fmt::Display for CycleDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

impl FromStr for CycleDuration {
    type Err = ConfigError;

    /// Parses `min:sec`, e.g. `10:00`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDuration(s.to_string());
        let (minutes, seconds) = s.trim().split_once(':').ok_or_else(invalid)?;
        let minutes = minutes.trim().parse::<u32>().map_err(|_| invalid())?;
        let seconds = seconds.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { minutes, seconds })
    }
}

/// Half-open interval `[start, end)` covered by one closed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, duration: CycleDuration) -> Self {
        Self {
            start,
            end: start + duration.as_duration(),
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t < self.end
    }

    /// The window of the next cycle, opening `flush` after this one ends.
    pub fn following(&self, flush: CycleDuration, duration: CycleDuration) -> Self {
        Self::new(self.end + flush.as_duration(), duration)
    }
}

/// True when `t` hits `boundary` exactly or one second late. The instrument
/// occasionally skips writing the boundary second.
pub fn matches_boundary(t: NaiveDateTime, boundary: NaiveDateTime) -> bool {
    matches!((t - boundary).num_seconds(), 0 | 1)
}

/// Time-of-day flavour of [`matches_boundary`], wrapping at midnight.
pub fn matches_time_of_day(t: NaiveTime, boundary: NaiveTime) -> bool {
    matches!((t - boundary).num_seconds().rem_euclid(86_400), 0 | 1)
}

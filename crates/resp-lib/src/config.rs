use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::metrics::mo2::SpreadEstimator;
use crate::sample::{CycleDuration, DATE_FORMAT, TIME_FORMAT};

/// Longest accepted cycle or flush duration.
pub const MAX_DURATION_SECONDS: u64 = 24 * 3600;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid start date '{0}', expected dd/mm/yy")]
    InvalidDate(String),
    #[error("invalid start time '{0}', expected HH:MM:SS")]
    InvalidTime(String),
    #[error("invalid duration '{0}', expected min:sec")]
    InvalidDuration(String),
    #[error("{field} seconds must be less than 60, got {seconds}")]
    SecondsOutOfRange { field: &'static str, seconds: u32 },
    #[error("cycle duration must be at least one second")]
    EmptyCycle,
    #[error("{field} duration {duration} exceeds the {limit_hours} h limit")]
    TooLong {
        field: &'static str,
        duration: CycleDuration,
        limit_hours: u64,
    },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("fish mass {mass} must be smaller than chamber volume {volume}")]
    MassExceedsVolume { mass: f64, volume: f64 },
    #[error("missing experiment parameter: {0}")]
    Missing(&'static str),
}

/// Parameters of one respirometry run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentConfig {
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    /// Length of each closed cycle
    pub cycle: CycleDuration,
    /// Open interval between the end of one closed cycle and the start of the next
    pub flush: CycleDuration,
    /// Chamber volume (L)
    pub volume: f64,
    /// Fish mass (kg)
    pub mass: f64,
    pub temperature_sd: SpreadEstimator,
}

impl ExperimentConfig {
    /// Build a config from the textual values an operator types in.
    pub fn parse(
        start_date: &str,
        start_time: &str,
        cycle: CycleDuration,
        volume: f64,
        mass: f64,
    ) -> Result<Self, ConfigError> {
        let start_date = NaiveDate::parse_from_str(start_date.trim(), DATE_FORMAT)
            .map_err(|_| ConfigError::InvalidDate(start_date.to_string()))?;
        let start_time = NaiveTime::parse_from_str(start_time.trim(), TIME_FORMAT)
            .map_err(|_| ConfigError::InvalidTime(start_time.to_string()))?;
        let config = Self {
            start_date,
            start_time,
            cycle,
            flush: CycleDuration::ZERO,
            volume,
            mass,
            temperature_sd: SpreadEstimator::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_flush(mut self, flush: CycleDuration) -> Result<Self, ConfigError> {
        self.flush = flush;
        self.validate()?;
        Ok(self)
    }

    pub fn with_temperature_sd(mut self, estimator: SpreadEstimator) -> Self {
        self.temperature_sd = estimator;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle.seconds >= 60 {
            return Err(ConfigError::SecondsOutOfRange {
                field: "cycle",
                seconds: self.cycle.seconds,
            });
        }
        if self.flush.seconds >= 60 {
            return Err(ConfigError::SecondsOutOfRange {
                field: "flush",
                seconds: self.flush.seconds,
            });
        }
        if self.cycle.is_zero() {
            return Err(ConfigError::EmptyCycle);
        }
        for (field, duration) in [("cycle", self.cycle), ("flush", self.flush)] {
            if duration.total_seconds() > MAX_DURATION_SECONDS {
                return Err(ConfigError::TooLong {
                    field,
                    duration,
                    limit_hours: MAX_DURATION_SECONDS / 3600,
                });
            }
        }
        // NaN fails these comparisons too
        if !(self.volume > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "volume",
                value: self.volume,
            });
        }
        if !(self.mass > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "mass",
                value: self.mass,
            });
        }
        if self.mass >= self.volume {
            return Err(ConfigError::MassExceedsVolume {
                mass: self.mass,
                volume: self.volume,
            });
        }
        Ok(())
    }

    /// Instant the first closed cycle begins.
    pub fn start(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.start_date, self.start_time)
    }
}

/// Experiment parameters as written in a TOML file. Every field is optional so
/// command-line flags can fill in or override values before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentFile {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub cycle: Option<CycleDuration>,
    #[serde(default)]
    pub flush: Option<CycleDuration>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub mass: Option<f64>,
    #[serde(default)]
    pub temperature_sd: Option<SpreadEstimator>,
}

impl ExperimentFile {
    pub fn into_config(self) -> Result<ExperimentConfig, ConfigError> {
        let start_date = self.start_date.ok_or(ConfigError::Missing("start_date"))?;
        let start_time = self.start_time.ok_or(ConfigError::Missing("start_time"))?;
        let cycle = self.cycle.ok_or(ConfigError::Missing("cycle"))?;
        let volume = self.volume.ok_or(ConfigError::Missing("volume"))?;
        let mass = self.mass.ok_or(ConfigError::Missing("mass"))?;
        let config = ExperimentConfig::parse(&start_date, &start_time, cycle, volume, mass)?
            .with_flush(self.flush.unwrap_or_default())?
            .with_temperature_sd(self.temperature_sd.unwrap_or_default());
        Ok(config)
    }
}

pub fn read_experiment(path: &Path) -> Result<ExperimentFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read experiment {}", path.display()))?;
    let file: ExperimentFile = toml::from_str(&contents)
        .with_context(|| format!("parsing experiment {}", path.display()))?;
    Ok(file)
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ExperimentConfig;
use crate::metrics::quality::{quality_control, QualityControlledSeries};
use crate::metrics::regression::{fit_line, LinearFit};
use crate::sample::CycleDuration;
use crate::segment::{Cycle, Segmentation};

/// Seconds per hour, to turn a per-second slope into an hourly rate.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Divisor used for the temperature standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadEstimator {
    /// n - 1
    #[default]
    Sample,
    /// n, matching exports of the legacy tool
    Population,
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Oxygen depletion rate (mg O2 L⁻¹ s⁻¹)
    pub slope: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
    /// Date and time of the cycle's first sample (`dd/mm/yy HH:MM:SS`)
    pub start: String,
    /// Mass-specific oxygen consumption (mg O2 kg⁻¹ h⁻¹)
    #[serde(rename = "MO2")]
    pub mo2: f64,
    pub mass: f64,
    #[serde(rename = "meanTemp")]
    pub mean_temp: f64,
    #[serde(rename = "sdTemp")]
    pub sd_temp: f64,
}

/// Summary of a cycle together with the intermediate results it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleAssessment {
    pub index: usize,
    pub series: QualityControlledSeries,
    pub fit: LinearFit,
    pub summary: CycleSummary,
}

/// MO2 from a depletion slope. `volume - mass` is taken as the water volume
/// of the chamber, so both must share a unit basis (L and kg).
pub fn oxygen_consumption(slope: f64, mass: f64, volume: f64) -> f64 {
    (-slope * SECONDS_PER_HOUR * (volume - mass)) / mass
}

/// Mean and standard deviation. Empty input gives NaN for both; a single
/// value has zero spread.
pub fn mean_and_sd(values: &[f64], estimator: SpreadEstimator) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let sd = match estimator {
        SpreadEstimator::Sample if n > 1 => (ss / (n as f64 - 1.0)).sqrt(),
        SpreadEstimator::Sample => 0.0,
        SpreadEstimator::Population => (ss / n as f64).sqrt(),
    };
    (mean, sd)
}

#[derive(Debug, Clone, Copy)]
pub struct MetabolicRateCalculator {
    pub volume: f64,
    pub mass: f64,
    pub cycle: CycleDuration,
    pub temperature_sd: SpreadEstimator,
}

impl MetabolicRateCalculator {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            volume: config.volume,
            mass: config.mass,
            cycle: config.cycle,
            temperature_sd: config.temperature_sd,
        }
    }

    pub fn assess(&self, cycle: &Cycle) -> CycleAssessment {
        let series = quality_control(cycle, self.cycle);
        let fit = fit_line(&series.oxygen);
        // temperature is not gap-filled
        let (mean_temp, sd_temp) = mean_and_sd(&cycle.temperatures(), self.temperature_sd);
        let summary = CycleSummary {
            slope: fit.slope,
            r2: fit.r2,
            start: cycle.first().label(),
            mo2: oxygen_consumption(fit.slope, self.mass, self.volume),
            mass: self.mass,
            mean_temp,
            sd_temp,
        };
        CycleAssessment {
            index: cycle.index,
            series,
            fit,
            summary,
        }
    }

    pub fn summarize(&self, cycle: &Cycle) -> CycleSummary {
        self.assess(cycle).summary
    }

    /// Summaries of every closed cycle, keyed by cycle index.
    pub fn summarize_all(&self, segmentation: &Segmentation) -> BTreeMap<usize, CycleSummary> {
        segmentation
            .cycles
            .iter()
            .map(|(index, cycle)| (*index, self.summarize(cycle)))
            .collect()
    }
}

use chrono::Timelike;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::sample::{CycleDuration, RawSample};
use crate::segment::Cycle;

/// Oxygen readings for every second of a closed cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityControlledSeries {
    /// One value per second from the cycle's first sample (mg/L)
    pub oxygen: Vec<f64>,
    /// Second indices that had no recorded value and were filled
    pub filled: Vec<usize>,
}

impl QualityControlledSeries {
    pub fn len(&self) -> usize {
        self.oxygen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oxygen.is_empty()
    }
}

/// Whole-second offset of each sample from the first one.
///
/// Offsets are built from second-of-minute deltas between neighbours, with
/// negative deltas taken modulo 60 (minute rollover). Gaps of a minute or
/// more are therefore not representable.
pub fn second_offsets(samples: &[RawSample]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(samples.len());
    let mut total = 0usize;
    let mut prev: Option<i64> = None;
    for sample in samples {
        let sec = i64::from(sample.recorded_at.second());
        if let Some(p) = prev {
            total += (sec - p).rem_euclid(60) as usize;
        }
        offsets.push(total);
        prev = Some(sec);
    }
    offsets
}

/// Rebuild the dense per-second oxygen series of a cycle.
pub fn quality_control(cycle: &Cycle, duration: CycleDuration) -> QualityControlledSeries {
    let len = duration.total_seconds() as usize;
    let mut recorded: Vec<Option<f64>> = vec![None; len];
    let mut dropped = 0usize;
    let samples = cycle.samples();
    for (offset, sample) in second_offsets(samples).into_iter().zip(samples) {
        match recorded.get_mut(offset) {
            Some(slot) => *slot = Some(sample.oxygen),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(
            "cycle {}: {} samples beyond {} s ignored",
            cycle.index, dropped, len
        );
    }
    let series = fill_gaps(&recorded);
    if !series.filled.is_empty() {
        debug!(
            "cycle {}: filled {} of {} seconds",
            cycle.index,
            series.filled.len(),
            len
        );
    }
    series
}

/// Fill missing seconds from their nearest recorded neighbours.
///
/// Every missing second is filled independently: a leading gap copies the
/// next recorded value, a gap at the last index copies the previous recorded
/// value, and any other gap takes the mean of the previous and next recorded
/// values (or whichever one exists). Filled values never feed other fills.
/// An input with no recorded value at all yields NaN.
pub fn fill_gaps(recorded: &[Option<f64>]) -> QualityControlledSeries {
    let n = recorded.len();
    let mut next_recorded = vec![None; n];
    let mut upcoming = None;
    for i in (0..n).rev() {
        next_recorded[i] = upcoming;
        if recorded[i].is_some() {
            upcoming = recorded[i];
        }
    }

    let mut oxygen: Vec<f64> = Vec::with_capacity(n);
    let mut filled = Vec::new();
    let mut last_recorded = None;
    for (i, value) in recorded.iter().enumerate() {
        if let Some(v) = value {
            oxygen.push(*v);
            last_recorded = Some(*v);
            continue;
        }
        let substitute = match (last_recorded, next_recorded[i]) {
            (None, Some(next)) => next,
            (Some(prev), _) if i + 1 == n => prev,
            (Some(prev), Some(next)) => (prev + next) / 2.0,
            (Some(prev), None) => prev,
            (None, None) => f64::NAN,
        };
        oxygen.push(substitute);
        filled.push(i);
    }
    QualityControlledSeries { oxygen, filled }
}

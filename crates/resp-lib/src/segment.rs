//! Splits the sample stream into closed-chamber cycles.
//!
//! The segmenter is a three-state machine. It waits for the configured start
//! time of day, records until the current window's end boundary, then idles
//! until the next window's start boundary. Boundaries are matched with a
//! one-second tolerance. A boundary sample that closes a cycle is not part of
//! it. A cycle still open when input runs out is kept apart as the trailing
//! partial cycle and never treated as closed.

use chrono::{NaiveDateTime, NaiveTime};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ExperimentConfig;
use crate::sample::{
    matches_boundary, matches_time_of_day, CycleDuration, RawSample, TimeWindow,
};

/// Samples recorded during one closed cycle. Never empty: the only
/// constructor takes the opening sample, and cycles are not deserialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cycle {
    pub index: usize,
    pub window: TimeWindow,
    samples: Vec<RawSample>,
}

impl Cycle {
    pub fn new(index: usize, window: TimeWindow, first: RawSample) -> Self {
        Self {
            index,
            window,
            samples: vec![first],
        }
    }

    pub fn push(&mut self, sample: RawSample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn first(&self) -> &RawSample {
        &self.samples[0]
    }

    pub fn last(&self) -> &RawSample {
        &self.samples[self.samples.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.temperature).collect()
    }
}

/// Observable state of a [`CycleSegmenter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmenterState {
    SeekingFirstStart,
    Recording,
    BetweenCycles,
}

#[derive(Debug)]
enum State {
    SeekingFirstStart,
    Recording(Cycle),
    BetweenCycles { next: TimeWindow },
}

#[derive(Debug)]
pub struct CycleSegmenter {
    start: NaiveDateTime,
    cycle: CycleDuration,
    flush: CycleDuration,
    state: State,
    next_index: usize,
}

impl CycleSegmenter {
    pub fn new(start: NaiveDateTime, cycle: CycleDuration) -> Self {
        Self {
            start,
            cycle,
            flush: CycleDuration::ZERO,
            state: State::SeekingFirstStart,
            next_index: 0,
        }
    }

    pub fn with_flush(mut self, flush: CycleDuration) -> Self {
        self.flush = flush;
        self
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self::new(config.start(), config.cycle).with_flush(config.flush)
    }

    pub fn state(&self) -> SegmenterState {
        match self.state {
            State::SeekingFirstStart => SegmenterState::SeekingFirstStart,
            State::Recording(_) => SegmenterState::Recording,
            State::BetweenCycles { .. } => SegmenterState::BetweenCycles,
        }
    }

    /// Feed the next sample. Returns the cycle this sample closed, if any.
    pub fn push(&mut self, sample: RawSample) -> Option<Cycle> {
        let (next, closed) = match std::mem::replace(&mut self.state, State::SeekingFirstStart) {
            State::SeekingFirstStart => (self.seek_first_start(sample), None),
            State::Recording(cycle) => self.record(cycle, sample),
            State::BetweenCycles { next } => (self.await_start(next, sample), None),
        };
        self.state = next;
        closed
    }

    /// End of input. Returns the partially recorded cycle, if one was open.
    pub fn finish(self) -> Option<Cycle> {
        match self.state {
            State::Recording(cycle) => Some(cycle),
            _ => None,
        }
    }

    fn seek_first_start(&mut self, sample: RawSample) -> State {
        let start_of_day: NaiveTime = self.start.time();
        if !matches_time_of_day(sample.time_of_day(), start_of_day) {
            return State::SeekingFirstStart;
        }
        if sample.recorded_at.date() != self.start.date() {
            debug!(
                "first cycle opened by {} on a different day than the configured start {}",
                sample.label(),
                self.start
            );
        }
        let window = TimeWindow::new(self.start, self.cycle);
        self.open(window, sample)
    }

    fn record(&mut self, mut cycle: Cycle, sample: RawSample) -> (State, Option<Cycle>) {
        if matches_boundary(sample.recorded_at, cycle.window.end) {
            debug!(
                "cycle {} closed at {} with {} samples",
                cycle.index,
                sample.label(),
                cycle.len()
            );
            let next = cycle.window.following(self.flush, self.cycle);
            self.next_index += 1;
            (State::BetweenCycles { next }, Some(cycle))
        } else {
            cycle.push(sample);
            (State::Recording(cycle), None)
        }
    }

    fn await_start(&mut self, next: TimeWindow, sample: RawSample) -> State {
        if matches_boundary(sample.recorded_at, next.start) {
            self.open(next, sample)
        } else {
            State::BetweenCycles { next }
        }
    }

    fn open(&mut self, window: TimeWindow, first: RawSample) -> State {
        debug!(
            "cycle {} opened at {} (window {} .. {})",
            self.next_index,
            first.label(),
            window.start,
            window.end
        );
        State::Recording(Cycle::new(self.next_index, window, first))
    }
}

/// Every closed cycle of a log, plus whatever was still recording at the end.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Segmentation {
    pub cycles: BTreeMap<usize, Cycle>,
    pub trailing: Option<Cycle>,
}

pub fn segment<I>(samples: I, config: &ExperimentConfig) -> Segmentation
where
    I: IntoIterator<Item = RawSample>,
{
    let mut segmenter = CycleSegmenter::from_config(config);
    let mut cycles = BTreeMap::new();
    for sample in samples {
        if let Some(cycle) = segmenter.push(sample) {
            cycles.insert(cycle.index, cycle);
        }
    }
    Segmentation {
        cycles,
        trailing: segmenter.finish(),
    }
}

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::ExperimentConfig;
use crate::io::oxyview::{open_log, LogReader};
use crate::metrics::mo2::{CycleSummary, MetabolicRateCalculator};
use crate::segment::{Cycle, CycleSegmenter, Segmentation};

/// Outcome of one pass over a log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub summaries: BTreeMap<usize, CycleSummary>,
    /// Gap-filled seconds per cycle
    pub filled_seconds: BTreeMap<usize, usize>,
    /// Samples of the cycle still recording when the log ended
    pub trailing_samples: Option<usize>,
    pub data_lines: usize,
    pub skipped_lines: usize,
}

/// Segment and summarise a log in a single streaming pass. Each cycle is
/// summarised as soon as it closes, so only one cycle is held in memory.
pub fn analyze_reader<R: BufRead>(reader: R, config: &ExperimentConfig) -> Result<Analysis> {
    let calculator = MetabolicRateCalculator::from_config(config);
    let mut segmenter = CycleSegmenter::from_config(config);
    let mut lines = LogReader::new(reader);
    let mut analysis = Analysis::default();
    for sample in lines.by_ref() {
        analysis.data_lines += 1;
        if let Some(cycle) = segmenter.push(sample?) {
            let assessment = calculator.assess(&cycle);
            debug!(
                "cycle {}: slope {:.6} R2 {:.4} MO2 {:.2}",
                cycle.index, assessment.fit.slope, assessment.fit.r2, assessment.summary.mo2
            );
            analysis
                .filled_seconds
                .insert(cycle.index, assessment.series.filled.len());
            analysis.summaries.insert(cycle.index, assessment.summary);
        }
    }
    analysis.skipped_lines = lines.skipped();
    analysis.trailing_samples = segmenter.finish().map(|cycle| report_trailing(&cycle));
    info!(
        "{} closed cycles from {} data lines ({} other lines skipped)",
        analysis.summaries.len(),
        analysis.data_lines,
        analysis.skipped_lines
    );
    Ok(analysis)
}

pub fn analyze_log(path: &Path, config: &ExperimentConfig) -> Result<Analysis> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    info!("analysing {} from {}", path.display(), config.start());
    analyze_reader(BufReader::new(file), config)
}

/// Segment a log without summarising, keeping every cycle's raw samples.
pub fn segment_log(path: &Path, config: &ExperimentConfig) -> Result<Segmentation> {
    let mut segmenter = CycleSegmenter::from_config(config);
    let mut segmentation = Segmentation::default();
    for sample in open_log(path)? {
        if let Some(cycle) = segmenter.push(sample?) {
            segmentation.cycles.insert(cycle.index, cycle);
        }
    }
    segmentation.trailing = segmenter.finish();
    if let Some(cycle) = &segmentation.trailing {
        report_trailing(cycle);
    }
    Ok(segmentation)
}

fn report_trailing(cycle: &Cycle) -> usize {
    warn!(
        "log ended while cycle {} was recording ({} samples from {}); it is not summarised",
        cycle.index,
        cycle.len(),
        cycle.first().label()
    );
    cycle.len()
}

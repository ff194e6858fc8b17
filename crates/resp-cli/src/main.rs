use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use resp_lib::{
    config::{read_experiment, ExperimentConfig, ExperimentFile},
    io::summary::{write_summaries, write_summaries_csv},
    metrics::mo2::{MetabolicRateCalculator, SpreadEstimator},
    pipeline::{analyze_log, segment_log},
    sample::CycleDuration,
    segment::Cycle,
};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "resp",
    version,
    about = "Closed-chamber respirometry: oxygen log to per-cycle MO2"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Experiment parameters. Flags override values read from `--config`.
#[derive(Args, Debug, Clone)]
struct ExperimentArgs {
    /// TOML file with the experiment parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Start date of the first closed cycle (dd/mm/yy)
    #[arg(long)]
    start_date: Option<String>,
    /// Start time of the first closed cycle (HH:MM:SS)
    #[arg(long)]
    start_time: Option<String>,
    /// Closed cycle duration (min:sec)
    #[arg(long)]
    cycle: Option<CycleDuration>,
    /// Open interval between closed cycles (min:sec)
    #[arg(long)]
    flush: Option<CycleDuration>,
    /// Chamber volume (L)
    #[arg(long)]
    volume: Option<f64>,
    /// Fish mass (kg)
    #[arg(long)]
    mass: Option<f64>,
    /// Report temperature SD with the population (n) divisor
    #[arg(long)]
    population_sd: bool,
}

impl ExperimentArgs {
    fn resolve(&self) -> Result<ExperimentConfig> {
        let mut file = match &self.config {
            Some(path) => read_experiment(path)?,
            None => ExperimentFile::default(),
        };
        if let Some(date) = &self.start_date {
            file.start_date = Some(date.clone());
        }
        if let Some(time) = &self.start_time {
            file.start_time = Some(time.clone());
        }
        file.cycle = self.cycle.or(file.cycle);
        file.flush = self.flush.or(file.flush);
        file.volume = self.volume.or(file.volume);
        file.mass = self.mass.or(file.mass);
        if self.population_sd {
            file.temperature_sd = Some(SpreadEstimator::Population);
        }
        Ok(file.into_config()?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise every closed cycle (slope, R2, MO2, temperature) as CSV
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        experiment: ExperimentArgs,
        /// Write the table here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the full analysis as JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// List the closed cycles found in a log, one JSON object per line
    Segment {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        experiment: ExperimentArgs,
    },
    /// Show the gap-filled oxygen series and fit of one cycle
    Qc {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        experiment: ExperimentArgs,
        /// Index of the closed cycle (0 is the first)
        #[arg(long)]
        index: usize,
    },
}

#[derive(Serialize)]
struct CycleListing {
    index: usize,
    window_start: String,
    window_end: String,
    samples: usize,
    first: String,
    last: String,
    closed: bool,
}

impl CycleListing {
    fn new(cycle: &Cycle, closed: bool) -> Self {
        Self {
            index: cycle.index,
            window_start: cycle.window.start.to_string(),
            window_end: cycle.window.end.to_string(),
            samples: cycle.len(),
            first: cycle.first().label(),
            last: cycle.last().label(),
            closed,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            input,
            experiment,
            out,
            json,
        } => cmd_analyze(&input, &experiment.resolve()?, out.as_deref(), json)?,
        Commands::Segment { input, experiment } => cmd_segment(&input, &experiment.resolve()?)?,
        Commands::Qc {
            input,
            experiment,
            index,
        } => cmd_qc(&input, &experiment.resolve()?, index)?,
    }
    Ok(())
}

fn cmd_analyze(
    input: &Path,
    config: &ExperimentConfig,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let analysis = analyze_log(input, config)?;
    if json {
        println!("{}", serde_json::to_string(&analysis)?);
        return Ok(());
    }
    match out {
        Some(path) => write_summaries_csv(path, &analysis.summaries)?,
        None => write_summaries(io::stdout().lock(), &analysis.summaries)?,
    }
    Ok(())
}

fn cmd_segment(input: &Path, config: &ExperimentConfig) -> Result<()> {
    let segmentation = segment_log(input, config)?;
    for cycle in segmentation.cycles.values() {
        println!("{}", serde_json::to_string(&CycleListing::new(cycle, true))?);
    }
    if let Some(cycle) = &segmentation.trailing {
        println!("{}", serde_json::to_string(&CycleListing::new(cycle, false))?);
    }
    Ok(())
}

fn cmd_qc(input: &Path, config: &ExperimentConfig, index: usize) -> Result<()> {
    let segmentation = segment_log(input, config)?;
    let cycle = segmentation
        .cycles
        .get(&index)
        .ok_or_else(|| anyhow!("no closed cycle {} in {}", index, input.display()))?;
    let assessment = MetabolicRateCalculator::from_config(config).assess(cycle);
    println!("{}", serde_json::to_string(&assessment)?);
    Ok(())
}

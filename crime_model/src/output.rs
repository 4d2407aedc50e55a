//! Export of sweep results to CSV and JSON for offline analysis

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ExperimentError;
use crate::experiment::{ExperimentConfig, OutputSettings};
use crate::grid_search::{summarize_by, GroupSummary, Parameter, RunResult, Target};
use crate::metrics::MetricsHistory;

/// Metadata for reproducibility
#[derive(Debug, Clone, Serialize)]
pub struct SweepMetadata {
    pub name: String,
    pub description: String,
    pub timestamp: String,
    pub base_seed: u64,
    pub runs_per_combination: usize,
    pub num_runs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutput {
    pub metadata: SweepMetadata,
    /// Every parameter against every target, in [`Parameter::ALL`] order
    pub summaries: Vec<GroupSummary>,
    #[serde(skip)]
    pub results: Vec<RunResult>,
}

impl SweepOutput {
    pub fn new(config: &ExperimentConfig, results: Vec<RunResult>) -> Self {
        let mut summaries = Vec::new();
        for parameter in Parameter::ALL {
            for target in [Target::CrimeRate, Target::GiniEnd] {
                summaries.extend(summarize_by(&results, parameter, target));
            }
        }

        SweepOutput {
            metadata: SweepMetadata {
                name: config.experiment.name.clone(),
                description: config.experiment.description.clone(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                base_seed: config.experiment.base_seed,
                runs_per_combination: config.experiment.runs_per_combination,
                num_runs: results.len(),
            },
            summaries,
            results,
        }
    }

    /// One row of scalar outcomes per run
    pub fn write_runs_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ExperimentError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record([
            "run_id",
            "seed",
            "num_agents",
            "deterrence",
            "gamma_alpha",
            "gamma_beta",
            "steps",
            "distribution",
            "fraction_stolen",
            "gini_start",
            "gini_end",
            "crime_rate_end",
        ])?;

        for run in &self.results {
            let p = &run.params;
            wtr.write_record(&[
                run.run_id.to_string(),
                run.seed.to_string(),
                p.num_agents.to_string(),
                p.deterrence.to_string(),
                p.gamma_alpha.to_string(),
                p.gamma_beta.to_string(),
                p.steps.to_string(),
                p.distribution.to_string(),
                p.fraction_stolen.to_string(),
                run.gini_start.to_string(),
                run.gini_end.to_string(),
                run.crime_rate_end.to_string(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Long-format per-step metrics of every run
    pub fn write_time_series_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ExperimentError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["run_id", "step", "crime_rate", "gini"])?;

        for run in &self.results {
            let series = run.crime_rate_over_time.iter().zip(&run.gini_over_time);
            for (i, (crime_rate, gini)) in series.enumerate() {
                wtr.write_record(&[
                    run.run_id.to_string(),
                    (i + 1).to_string(),
                    crime_rate.to_string(),
                    gini.to_string(),
                ])?;
            }
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn write_summary_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ExperimentError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Write the files enabled in `settings` into `dir`, returning their paths
    pub fn save<P: AsRef<Path>>(&self, dir: P, settings: &OutputSettings) -> Result<Vec<PathBuf>, ExperimentError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        if settings.save_runs_csv {
            let path = dir.join("runs.csv");
            self.write_runs_csv(&path)?;
            written.push(path);
        }
        if settings.save_time_series {
            let path = dir.join("time_series.csv");
            self.write_time_series_csv(&path)?;
            written.push(path);
        }
        if settings.save_summary_json {
            let path = dir.join("summary.json");
            self.write_summary_json(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Metrics history of a single run as `step,crime_rate,gini`
pub fn write_history_csv<P: AsRef<Path>>(history: &MetricsHistory, path: P) -> Result<(), ExperimentError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in history.records() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

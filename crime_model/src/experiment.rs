//! TOML experiment files
//!
//! ```toml
//! [experiment]
//! name = "baseline"
//! description = "Deterrence sweep"
//! base_seed = 42
//! runs_per_combination = 5
//!
//! [model]
//! deterrence_rule = "absolute"
//!
//! [sweep]
//! num_agents = [100]
//! deterrence = [0.01, 0.1]
//! gamma_alpha = [1.0]
//! gamma_beta = [1.0]
//! steps = [50]
//! distribution = ["gamma"]
//! fraction_stolen = [{ kind = "uniform" }]
//!
//! [output]
//! directory = "results"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ExperimentError;
use crate::grid_search::{GridSearch, ModelSettings, SweepGrid};

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    pub experiment: ExperimentMetadata,
    #[serde(default)]
    pub model: ModelSettings,
    pub sweep: SweepGrid,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub base_seed: u64,
    #[serde(default = "default_runs")]
    pub runs_per_combination: usize,
    pub num_threads: Option<usize>,
}

fn default_runs() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    /// Results land in `directory/<experiment name>`
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "enabled")]
    pub save_runs_csv: bool,
    #[serde(default = "enabled")]
    pub save_summary_json: bool,
    #[serde(default)]
    pub save_time_series: bool,
}

fn default_directory() -> PathBuf {
    PathBuf::from("results")
}

fn enabled() -> bool {
    true
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            directory: default_directory(),
            save_runs_csv: true,
            save_summary_json: true,
            save_time_series: false,
        }
    }
}

impl ExperimentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ExperimentError> {
        let text = fs::read_to_string(path)?;
        text.parse()
    }

    pub fn grid_search(&self) -> GridSearch {
        let mut search = GridSearch::new(self.sweep.clone())
            .with_settings(self.model)
            .with_seed(self.experiment.base_seed)
            .with_runs(self.experiment.runs_per_combination);
        if let Some(n) = self.experiment.num_threads {
            search = search.with_threads(n);
        }
        search
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output.directory.join(&self.experiment.name)
    }
}

impl FromStr for ExperimentConfig {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_search::InitialDistribution;
    use crate::params::{DeterrenceRule, MetricsSampling, TheftFraction};

    const FULL: &str = r#"
        [experiment]
        name = "deterrence_sweep"
        description = "Crime rate against deterrence"
        base_seed = 1000
        runs_per_combination = 3
        num_threads = 2

        [model]
        deterrence_rule = "relative"
        metrics_sampling = "pre_step"
        allow_self_selection = false

        [sweep]
        num_agents = [50, 100]
        deterrence = [0.1, 0.5, 0.9]
        gamma_alpha = [2.0]
        gamma_beta = [0.5]
        steps = [25]
        distribution = ["gamma", "uniform"]
        fraction_stolen = [
            { kind = "uniform" },
            { kind = "gaussian", mean = 0.2, std_dev = 0.05 },
        ]

        [output]
        directory = "out"
        save_runs_csv = false
        save_time_series = true
    "#;

    #[test]
    fn parses_every_section() {
        let config: ExperimentConfig = FULL.parse().unwrap();

        assert_eq!(config.experiment.name, "deterrence_sweep");
        assert_eq!(config.experiment.runs_per_combination, 3);
        assert_eq!(config.experiment.num_threads, Some(2));
        assert_eq!(config.model.deterrence_rule, DeterrenceRule::Relative);
        assert_eq!(config.model.metrics_sampling, MetricsSampling::PreStep);
        assert!(!config.model.allow_self_selection);
        assert_eq!(
            config.sweep.distribution,
            vec![InitialDistribution::Gamma, InitialDistribution::Uniform]
        );
        assert_eq!(
            config.sweep.fraction_stolen[1],
            TheftFraction::Gaussian {
                mean: 0.2,
                std_dev: 0.05
            }
        );
        assert!(!config.output.save_runs_csv);
        assert!(config.output.save_summary_json);
        assert!(config.output.save_time_series);
        assert_eq!(config.output_dir(), PathBuf::from("out/deterrence_sweep"));
    }

    #[test]
    fn grid_search_carries_settings() {
        let config: ExperimentConfig = FULL.parse().unwrap();
        let search = config.grid_search();

        assert_eq!(search.base_seed, 1000);
        assert_eq!(search.num_threads, Some(2));
        assert_eq!(search.num_runs(), 2 * 3 * 2 * 2 * 3);
        assert!(!search.settings.allow_self_selection);
    }

    #[test]
    fn optional_sections_default() {
        let config: ExperimentConfig = r#"
            [experiment]
            name = "minimal"

            [sweep]
            num_agents = [10]
            deterrence = [0.0]
            gamma_alpha = [1.0]
            gamma_beta = [1.0]
            steps = [5]
            distribution = ["gamma"]
            fraction_stolen = [{ kind = "fixed", value = 0.5 }]
        "#
        .parse()
        .unwrap();

        assert_eq!(config.experiment.base_seed, 0);
        assert_eq!(config.experiment.runs_per_combination, 1);
        assert_eq!(config.model, ModelSettings::default());
        assert_eq!(config.output.directory, PathBuf::from("results"));
    }

    #[test]
    fn malformed_toml_is_a_toml_error() {
        let err = "[experiment\nname = 1".parse::<ExperimentConfig>().unwrap_err();
        assert!(matches!(err, ExperimentError::Toml(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ExperimentConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ExperimentError::Io(_)));
    }
}

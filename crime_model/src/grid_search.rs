//! Parameter sweeps
//!
//! A [`SweepGrid`] lists candidate values per parameter; every point of the
//! cartesian product is run `runs_per_combination` times, each run seeded
//! with `base_seed + run_index`. Runs are independent and go through
//! [`des::parallel::ParallelRunner`].

use std::fmt;

use des::parallel::{progress_logger, ParallelRunner};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ModelError;
use crate::metrics;
use crate::params::{DeterrenceRule, MetricsSampling, ModelParams, TheftFraction};
use crate::population::Population;
use crate::random::RngSource;
use crate::wealth::WealthDistribution;
use crate::{PopulationStats, Stats};

/// Family of the initial wealth draw for a grid point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialDistribution {
    /// Gamma(`gamma_alpha`, `gamma_beta`)
    Gamma,
    /// Uniform on `[0, 1)`; the gamma parameters are ignored
    Uniform,
}

impl fmt::Display for InitialDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialDistribution::Gamma => write!(f, "gamma"),
            InitialDistribution::Uniform => write!(f, "uniform"),
        }
    }
}

/// Candidate values for each swept parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub num_agents: Vec<usize>,
    pub deterrence: Vec<f64>,
    pub gamma_alpha: Vec<f64>,
    pub gamma_beta: Vec<f64>,
    pub steps: Vec<usize>,
    pub distribution: Vec<InitialDistribution>,
    pub fraction_stolen: Vec<TheftFraction>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        SweepGrid {
            num_agents: vec![100],
            deterrence: vec![0.1],
            gamma_alpha: vec![1.0],
            gamma_beta: vec![1.0],
            steps: vec![50],
            distribution: vec![InitialDistribution::Gamma],
            fraction_stolen: vec![TheftFraction::Uniform],
        }
    }
}

impl SweepGrid {
    pub fn num_combinations(&self) -> usize {
        self.num_agents.len()
            * self.deterrence.len()
            * self.gamma_alpha.len()
            * self.gamma_beta.len()
            * self.steps.len()
            * self.distribution.len()
            * self.fraction_stolen.len()
    }

    /// Cartesian product in declaration order, last parameter varying fastest
    pub fn combinations(&self) -> Vec<GridPoint> {
        let mut points = Vec::with_capacity(self.num_combinations());
        for &num_agents in &self.num_agents {
            for &deterrence in &self.deterrence {
                for &gamma_alpha in &self.gamma_alpha {
                    for &gamma_beta in &self.gamma_beta {
                        for &steps in &self.steps {
                            for &distribution in &self.distribution {
                                for &fraction_stolen in &self.fraction_stolen {
                                    points.push(GridPoint {
                                        num_agents,
                                        deterrence,
                                        gamma_alpha,
                                        gamma_beta,
                                        steps,
                                        distribution,
                                        fraction_stolen,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        points
    }
}

/// One combination of swept parameter values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPoint {
    pub num_agents: usize,
    pub deterrence: f64,
    pub gamma_alpha: f64,
    pub gamma_beta: f64,
    pub steps: usize,
    pub distribution: InitialDistribution,
    pub fraction_stolen: TheftFraction,
}

impl GridPoint {
    pub fn wealth_distribution(&self) -> WealthDistribution {
        match self.distribution {
            InitialDistribution::Gamma => WealthDistribution::Gamma {
                shape: self.gamma_alpha,
                scale: self.gamma_beta,
            },
            InitialDistribution::Uniform => WealthDistribution::Uniform {
                low: 0.0,
                high: 1.0,
            },
        }
    }

    pub fn model_params(&self, settings: &ModelSettings) -> ModelParams {
        ModelParams::new(self.num_agents, self.deterrence)
            .with_theft_fraction(self.fraction_stolen)
            .with_rule(settings.deterrence_rule)
            .with_sampling(settings.metrics_sampling)
            .with_self_selection(settings.allow_self_selection)
    }

    pub fn validate(&self, settings: &ModelSettings) -> Result<(), ModelError> {
        self.model_params(settings).validate()?;
        self.wealth_distribution().validate()
    }

    /// Display value of one parameter, used as a grouping key
    pub fn label(&self, parameter: Parameter) -> String {
        match parameter {
            Parameter::NumAgents => self.num_agents.to_string(),
            Parameter::Deterrence => self.deterrence.to_string(),
            Parameter::GammaAlpha => self.gamma_alpha.to_string(),
            Parameter::GammaBeta => self.gamma_beta.to_string(),
            Parameter::Steps => self.steps.to_string(),
            Parameter::Distribution => self.distribution.to_string(),
            Parameter::FractionStolen => self.fraction_stolen.to_string(),
        }
    }
}

/// Model settings held fixed across a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub deterrence_rule: DeterrenceRule,
    #[serde(default)]
    pub metrics_sampling: MetricsSampling,
    #[serde(default = "default_self_selection")]
    pub allow_self_selection: bool,
}

fn default_self_selection() -> bool {
    true
}

impl Default for ModelSettings {
    fn default() -> Self {
        ModelSettings {
            deterrence_rule: DeterrenceRule::default(),
            metrics_sampling: MetricsSampling::default(),
            allow_self_selection: true,
        }
    }
}

/// Outcome of one run of one grid point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub run_id: usize,
    pub seed: u64,
    pub params: GridPoint,
    pub gini_start: f64,
    pub gini_end: f64,
    pub crime_rate_end: f64,
    pub wealth_start: Vec<f64>,
    pub wealth_end: Vec<f64>,
    pub gini_over_time: Vec<f64>,
    pub crime_rate_over_time: Vec<f64>,
}

impl RunResult {
    fn from_stats(run_id: usize, seed: u64, params: GridPoint, stats: PopulationStats) -> Result<Self, ModelError> {
        Ok(RunResult {
            run_id,
            seed,
            params,
            gini_start: metrics::gini(&stats.initial_wealth)?,
            gini_end: metrics::gini(&stats.wealth)?,
            crime_rate_end: stats.crime_rate,
            gini_over_time: stats.history.gini_series(),
            crime_rate_over_time: stats.history.crime_rate_series(),
            wealth_start: stats.initial_wealth,
            wealth_end: stats.wealth,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Job {
    run_id: usize,
    seed: u64,
    point: GridPoint,
}

/// A full sweep: grid, fixed settings, seeding and parallelism
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub grid: SweepGrid,
    pub settings: ModelSettings,
    pub base_seed: u64,
    pub runs_per_combination: usize,
    /// Worker threads; `None` uses rayon's global pool
    pub num_threads: Option<usize>,
}

impl GridSearch {
    pub fn new(grid: SweepGrid) -> Self {
        GridSearch {
            grid,
            settings: ModelSettings::default(),
            base_seed: 0,
            runs_per_combination: 1,
            num_threads: None,
        }
    }

    pub fn with_settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_seed(mut self, base_seed: u64) -> Self {
        self.base_seed = base_seed;
        self
    }

    pub fn with_runs(mut self, runs_per_combination: usize) -> Self {
        self.runs_per_combination = runs_per_combination;
        self
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn num_runs(&self) -> usize {
        self.grid.num_combinations() * self.runs_per_combination
    }

    fn jobs(&self) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(self.num_runs());
        for point in self.grid.combinations() {
            for _ in 0..self.runs_per_combination {
                let run_id = jobs.len();
                jobs.push(Job {
                    run_id,
                    seed: self.base_seed.wrapping_add(run_id as u64),
                    point,
                });
            }
        }
        jobs
    }

    /// Run every combination and return the results in run order
    ///
    /// All grid points are validated before any run starts. Runs that fail
    /// anyway are logged and left out of the result.
    pub fn run(&self) -> Result<Vec<RunResult>, ModelError> {
        for point in self.grid.combinations() {
            point.validate(&self.settings)?;
        }

        let jobs = self.jobs();
        let horizon = jobs.iter().map(|job| job.point.steps).max().unwrap_or(0);
        info!(
            combinations = self.grid.num_combinations(),
            runs = jobs.len(),
            horizon,
            "starting grid search"
        );

        let settings = self.settings;
        let builder = |i: usize| build_run(&jobs[i], &settings);
        let mut runner = ParallelRunner::new(jobs.len(), builder)
            .progress(progress_logger((jobs.len() / 10).max(1)));
        if let Some(n) = self.num_threads {
            runner = runner.num_threads(n);
        }
        let outcomes = runner.run(horizon);

        let results: Vec<RunResult> = jobs
            .iter()
            .zip(outcomes)
            .filter_map(|(job, outcome)| collect_run(job, outcome))
            .collect();
        info!(completed = results.len(), "grid search finished");
        Ok(results)
    }
}

/// Turn one run's outcome into a result, logging and dropping failures
fn collect_run(job: &Job, outcome: Result<Vec<Stats>, String>) -> Option<RunResult> {
    let stats = match outcome {
        Ok(stats) => stats,
        Err(e) => {
            warn!(run = job.run_id, seed = job.seed, error = %e, "run failed");
            return None;
        }
    };
    let Some(Stats::Population(stats)) = stats.into_iter().next() else {
        warn!(run = job.run_id, "run produced no stats");
        return None;
    };
    match RunResult::from_stats(job.run_id, job.seed, job.point, stats) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(run = job.run_id, seed = job.seed, error = %e, "run metrics undefined");
            None
        }
    }
}

fn build_run(job: &Job, settings: &ModelSettings) -> des::EventLoop<crate::Event, Stats> {
    match build_population(job, settings) {
        Ok(population) => crate::event_loop(population, job.point.steps),
        Err(e) => {
            warn!(run = job.run_id, seed = job.seed, error = %e, "could not build run");
            des::EventLoop::new(Vec::new(), Vec::new())
        }
    }
}

fn build_population(job: &Job, settings: &ModelSettings) -> Result<Population, ModelError> {
    let mut rng = StdRng::seed_from_u64(job.seed);
    let wealth = job.point.wealth_distribution().sample(job.point.num_agents, &mut rng)?;
    Population::new(job.point.model_params(settings), wealth, RngSource::new(rng))
}

/// Parameter a sweep can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    NumAgents,
    Deterrence,
    GammaAlpha,
    GammaBeta,
    Steps,
    Distribution,
    FractionStolen,
}

impl Parameter {
    pub const ALL: [Parameter; 7] = [
        Parameter::NumAgents,
        Parameter::Deterrence,
        Parameter::GammaAlpha,
        Parameter::GammaBeta,
        Parameter::Steps,
        Parameter::Distribution,
        Parameter::FractionStolen,
    ];

    /// Number of distinct values this parameter takes in `grid`
    pub fn num_values(&self, grid: &SweepGrid) -> usize {
        match self {
            Parameter::NumAgents => grid.num_agents.len(),
            Parameter::Deterrence => grid.deterrence.len(),
            Parameter::GammaAlpha => grid.gamma_alpha.len(),
            Parameter::GammaBeta => grid.gamma_beta.len(),
            Parameter::Steps => grid.steps.len(),
            Parameter::Distribution => grid.distribution.len(),
            Parameter::FractionStolen => grid.fraction_stolen.len(),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameter::NumAgents => "num_agents",
            Parameter::Deterrence => "deterrence",
            Parameter::GammaAlpha => "gamma_alpha",
            Parameter::GammaBeta => "gamma_beta",
            Parameter::Steps => "steps",
            Parameter::Distribution => "distribution",
            Parameter::FractionStolen => "fraction_stolen",
        };
        write!(f, "{name}")
    }
}

/// Scalar outcome summarized across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    CrimeRate,
    GiniEnd,
}

impl Target {
    pub fn value(&self, result: &RunResult) -> f64 {
        match self {
            Target::CrimeRate => result.crime_rate_end,
            Target::GiniEnd => result.gini_end,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::CrimeRate => write!(f, "crime_rate"),
            Target::GiniEnd => write!(f, "gini_end"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl MeanStd {
    /// Population statistics of `values`; all zero when empty
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return MeanStd {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        MeanStd {
            mean,
            std: variance.sqrt(),
            min,
            max,
        }
    }
}

/// Target statistics for the runs sharing one parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub parameter: Parameter,
    pub target: Target,
    pub value: String,
    pub count: usize,
    #[serde(flatten)]
    pub stats: MeanStd,
}

/// Group `results` by `parameter` and summarize `target` per group
///
/// Groups appear in the order their value is first seen.
pub fn summarize_by(results: &[RunResult], parameter: Parameter, target: Target) -> Vec<GroupSummary> {
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for result in results {
        let key = result.params.label(parameter);
        let value = target.value(result);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => groups.push((key, vec![value])),
        }
    }

    groups
        .into_iter()
        .map(|(value, values)| GroupSummary {
            parameter,
            target,
            value,
            count: values.len(),
            stats: MeanStd::from_values(&values),
        })
        .collect()
}

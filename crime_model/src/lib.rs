//! Wealth-disparity crime model
//!
//! A population of agents, each holding some wealth, is activated in random
//! order once per step. An agent compares itself with a randomly drawn peer
//! and, if the wealth gap beats the deterrence threshold, steals a random
//! share of the peer's wealth. Offending is a one-off: the thief is marked
//! and never acts again.
//!
//! Key pieces:
//! - [`Population`]: agent state, the per-step interaction rule, metrics history
//! - [`metrics`]: crime rate and the Lorenz-curve Gini coefficient
//! - [`grid_search`]: parameter sweeps over deterrence, theft fraction and
//!   initial wealth distribution
//!
//! Expected outcomes:
//! - Crime rate rises monotonically and saturates
//! - Lower deterrence means more crime and a faster reshuffle of wealth

use serde::Serialize;

pub mod agent;
pub mod collector;
pub mod error;
pub mod experiment;
pub mod grid_search;
pub mod metrics;
pub mod output;
pub mod params;
pub mod population;
pub mod random;
pub mod wealth;

pub use agent::{Agent, AgentRecord};
pub use error::{ExperimentError, ModelError};
pub use metrics::{MetricsHistory, MetricsRecord};
pub use params::{DeterrenceRule, MetricsSampling, ModelParams, TheftFraction};
pub use population::Population;
pub use random::{RandomSource, RngSource};
pub use wealth::WealthDistribution;

/// Events driving a population through a [`des::EventLoop`]
#[derive(Debug, Clone)]
pub enum Event {
    /// Advance the population by one step
    Step { step: usize },
}

/// Observable state of a population at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct PopulationStats {
    pub step_count: usize,
    pub crime_rate: f64,
    pub gini: f64,
    pub initial_wealth: Vec<f64>,
    pub wealth: Vec<f64>,
    pub offended: Vec<bool>,
    pub history: MetricsHistory,
}

impl PopulationStats {
    pub fn num_offenders(&self) -> usize {
        self.offended.iter().filter(|&&o| o).count()
    }
}

/// Combined stats enum for DES framework compatibility
#[derive(Debug, Clone)]
pub enum Stats {
    Population(PopulationStats),
}

/// Run `population` for `steps` steps through an event loop
pub fn simulate<R: RandomSource + 'static>(population: Population<R>, steps: usize) -> PopulationStats {
    let mut event_loop = event_loop(population, steps);
    event_loop.run(steps);

    match event_loop.stats().into_iter().next() {
        Some(Stats::Population(stats)) => stats,
        None => unreachable!("event loop built with exactly one population"),
    }
}

/// Event loop holding a single population limited to `steps` steps
pub fn event_loop<R: RandomSource + 'static>(
    population: Population<R>,
    steps: usize,
) -> des::EventLoop<Event, Stats> {
    let initial = if steps > 0 {
        vec![(0, Event::Step { step: 0 })]
    } else {
        Vec::new()
    };
    let agents: Vec<Box<dyn des::Agent<Event, Stats>>> =
        vec![Box::new(population.with_step_limit(steps))];
    des::EventLoop::new(initial, agents)
}

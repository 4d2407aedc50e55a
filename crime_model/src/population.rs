use des::Response;
use tracing::{debug, error, trace};

use crate::agent::{commit_theft, Agent, AgentRecord};
use crate::error::ModelError;
use crate::metrics::{self, MetricsHistory, MetricsRecord};
use crate::params::{MetricsSampling, ModelParams};
use crate::random::{RandomSource, RngSource};
use crate::{Event, PopulationStats, Stats};

/// The simulated population and everything one run needs to advance it
///
/// Agents are addressed by index; agent `i` starts with `wealth[i]`. The
/// population owns its random source so that a run is reproducible from the
/// source it was built with.
pub struct Population<R = RngSource> {
    agents: Vec<Agent>,
    params: ModelParams,
    source: R,
    step_count: usize,
    /// Agent wealth as of the last completed step
    wealth_snapshot: Vec<f64>,
    /// Metrics of the state after the last completed step
    current: MetricsRecord,
    initial_wealth: Vec<f64>,
    history: MetricsHistory,
    /// Steps after which the population stops rescheduling itself
    step_limit: Option<usize>,
}

impl Population<RngSource> {
    /// Population driven by a `StdRng` seeded with `seed`
    pub fn seeded(params: ModelParams, wealth: Vec<f64>, seed: u64) -> Result<Self, ModelError> {
        Population::new(params, wealth, RngSource::seeded(seed))
    }
}

impl<R: RandomSource> Population<R> {
    pub fn new(params: ModelParams, wealth: Vec<f64>, source: R) -> Result<Self, ModelError> {
        params.validate()?;
        validate_wealth(&wealth, params.num_agents)?;

        let agents: Vec<Agent> = wealth
            .iter()
            .enumerate()
            .map(|(id, &w)| Agent::new(id, w))
            .collect();
        let current = MetricsRecord::sample(0, &agents, &wealth)?;

        Ok(Population {
            agents,
            params,
            source,
            step_count: 0,
            wealth_snapshot: wealth.clone(),
            current,
            initial_wealth: wealth,
            history: MetricsHistory::new(),
            step_limit: None,
        })
    }

    /// Stop rescheduling after `steps` steps when driven by an event loop
    pub fn with_step_limit(mut self, steps: usize) -> Self {
        self.step_limit = Some(steps);
        self
    }

    /// Advance one tick: a random-order activation sweep over all agents
    ///
    /// Returns the metrics record appended to the history for this step. On
    /// error the agents, step count and history are left as they were; only
    /// the random source has moved on.
    pub fn step(&mut self) -> Result<MetricsRecord, ModelError> {
        let next_step = self.step_count + 1;
        let checkpoint = self.agents.clone();

        let crimes = self.activation_sweep();
        let wealth: Vec<f64> = self.agents.iter().map(|a| a.wealth()).collect();
        let post_step = match MetricsRecord::sample(next_step, &self.agents, &wealth) {
            Ok(record) => record,
            Err(e) => {
                self.agents = checkpoint;
                return Err(e);
            }
        };

        let record = match self.params.metrics_sampling {
            MetricsSampling::PreStep => MetricsRecord {
                step: next_step,
                ..self.current
            },
            MetricsSampling::PostStep => post_step,
        };
        self.wealth_snapshot = wealth;
        self.current = post_step;
        self.step_count = next_step;
        self.history.push(record);

        debug!(
            step = self.step_count,
            crimes,
            crime_rate = record.crime_rate,
            gini = record.gini,
            "step complete"
        );
        Ok(record)
    }

    fn activation_sweep(&mut self) -> usize {
        let mut order: Vec<usize> = (0..self.agents.len()).collect();
        self.source.shuffle(&mut order);

        let mut crimes = 0;
        for actor in order {
            if self.agents[actor].has_offended() {
                continue;
            }
            let Some(peer) = self.pick_peer(actor) else {
                continue;
            };
            if !self.agents[actor].would_offend(
                &self.agents[peer],
                self.params.deterrence_rule,
                self.params.deterrence,
            ) {
                continue;
            }

            let fraction = self.params.theft_fraction.sample(&mut self.source);
            let stolen = commit_theft(&mut self.agents, actor, peer, fraction);
            trace!(actor, peer, fraction, stolen, "crime committed");
            crimes += 1;
        }
        crimes
    }

    fn pick_peer(&mut self, actor: usize) -> Option<usize> {
        let n = self.agents.len();
        if self.params.allow_self_selection {
            return Some(self.source.index(n));
        }
        if n < 2 {
            return None;
        }
        let drawn = self.source.index(n - 1);
        Some(if drawn >= actor { drawn + 1 } else { drawn })
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent_records(&self) -> Vec<AgentRecord> {
        self.agents.iter().map(|a| a.record()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Always false: construction rejects empty populations
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn wealth_snapshot(&self) -> &[f64] {
        &self.wealth_snapshot
    }

    pub fn initial_wealth(&self) -> &[f64] {
        &self.initial_wealth
    }

    pub fn total_wealth(&self) -> f64 {
        self.agents.iter().map(|a| a.wealth()).sum()
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn crime_rate(&self) -> Result<f64, ModelError> {
        metrics::crime_rate(&self.agents)
    }

    pub fn gini(&self) -> Result<f64, ModelError> {
        metrics::gini(&self.wealth_snapshot)
    }

    pub fn population_stats(&self) -> PopulationStats {
        PopulationStats {
            step_count: self.step_count,
            crime_rate: self.current.crime_rate,
            gini: self.current.gini,
            initial_wealth: self.initial_wealth.clone(),
            wealth: self.wealth_snapshot.clone(),
            offended: self.agents.iter().map(|a| a.has_offended()).collect(),
            history: self.history.clone(),
        }
    }

    fn limit_reached(&self) -> bool {
        self.step_limit.is_some_and(|limit| self.step_count >= limit)
    }
}

fn validate_wealth(wealth: &[f64], num_agents: usize) -> Result<(), ModelError> {
    if wealth.len() != num_agents {
        return Err(ModelError::invalid(
            "wealth",
            format!("expected {num_agents} entries, got {}", wealth.len()),
        ));
    }
    if let Some((i, w)) = wealth
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(ModelError::invalid(
            "wealth",
            format!("entry {i} must be finite and non-negative, got {w}"),
        ));
    }
    let total: f64 = wealth.iter().sum();
    if !total.is_finite() {
        return Err(ModelError::invalid("wealth", "total wealth overflows"));
    }
    if total <= 0.0 {
        return Err(ModelError::invalid("wealth", "total wealth must be positive"));
    }
    Ok(())
}

impl<R: RandomSource> des::Agent<Event, Stats> for Population<R> {
    fn act(&mut self, current_t: usize, data: &Event) -> Response<Event, Stats> {
        match data {
            Event::Step { step } => {
                if self.limit_reached() {
                    return Response::new();
                }
                if let Err(e) = self.step() {
                    error!(step, error = %e, "step failed, halting run");
                    return Response::new();
                }
                if self.limit_reached() {
                    Response::new()
                } else {
                    Response::event(current_t + 1, Event::Step { step: step + 1 })
                }
            }
        }
    }

    fn stats(&self) -> Stats {
        Stats::Population(self.population_stats())
    }
}

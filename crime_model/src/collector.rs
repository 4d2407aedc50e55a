//! Per-step data collection for a single run
//!
//! Populations keep their own metrics history; the collector additionally
//! records every agent's state at each collection point so a run can be
//! inspected agent by agent afterwards.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{ExperimentError, ModelError};
use crate::metrics::MetricsRecord;
use crate::population::Population;
use crate::random::RandomSource;

/// Agent state at one collection point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentRow {
    pub step: usize,
    pub id: usize,
    pub has_offended: bool,
    pub wealth: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DataCollector {
    model_rows: Vec<MetricsRecord>,
    agent_rows: Vec<AgentRow>,
}

impl DataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the population as it stands now, tagged with its step count
    pub fn collect<R: RandomSource>(&mut self, population: &Population<R>) -> Result<(), ModelError> {
        let step = population.step_count();
        self.model_rows.push(MetricsRecord {
            step,
            crime_rate: population.crime_rate()?,
            gini: population.gini()?,
        });
        self.agent_rows
            .extend(population.agent_records().into_iter().map(|r| AgentRow {
                step,
                id: r.id,
                has_offended: r.has_offended,
                wealth: r.wealth,
            }));
        Ok(())
    }

    pub fn model_rows(&self) -> &[MetricsRecord] {
        &self.model_rows
    }

    pub fn agent_rows(&self) -> &[AgentRow] {
        &self.agent_rows
    }

    /// Agent rows belonging to one collection point
    pub fn agents_at(&self, step: usize) -> impl Iterator<Item = &AgentRow> {
        self.agent_rows.iter().filter(move |row| row.step == step)
    }

    /// Write `model.csv` and `agents.csv` into `dir`
    pub fn write_csv<P: AsRef<Path>>(&self, dir: P) -> Result<(), ExperimentError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut model = csv::Writer::from_path(dir.join("model.csv"))?;
        for row in &self.model_rows {
            model.serialize(row)?;
        }
        model.flush()?;

        let mut agents = csv::Writer::from_path(dir.join("agents.csv"))?;
        for row in &self.agent_rows {
            agents.serialize(row)?;
        }
        agents.flush()?;

        Ok(())
    }
}

//! Aggregate measurements of a population: crime rate and the Gini
//! coefficient of wealth, plus the append-only history they are kept in.

use serde::Serialize;

use crate::agent::Agent;
use crate::error::ModelError;

/// Share of agents that have ever offended
pub fn crime_rate(agents: &[Agent]) -> Result<f64, ModelError> {
    if agents.is_empty() {
        return Err(ModelError::DivisionByZero("crime rate of an empty population"));
    }
    let offenders = agents.iter().filter(|a| a.has_offended()).count();
    Ok(offenders as f64 / agents.len() as f64)
}

/// Discretized Lorenz curve of `wealth`
///
/// Returns `n + 1` points: a leading `0.0` followed by the cumulative share
/// of total wealth held by the poorest `1..=n` agents.
pub fn lorenz_curve(wealth: &[f64]) -> Result<Vec<f64>, ModelError> {
    if wealth.is_empty() {
        return Err(ModelError::InvalidInput("wealth array is empty".to_string()));
    }
    if let Some(bad) = wealth.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(ModelError::InvalidInput(format!(
            "wealth entries must be finite and non-negative, found {bad}"
        )));
    }

    let total: f64 = wealth.iter().sum();
    if !total.is_finite() {
        return Err(ModelError::InvalidInput(format!("total wealth overflows: {total}")));
    }
    if total <= 0.0 {
        return Err(ModelError::InvalidInput("total wealth is zero".to_string()));
    }

    let mut sorted = wealth.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut curve = Vec::with_capacity(sorted.len() + 1);
    curve.push(0.0);
    let mut cumulative = 0.0;
    for w in sorted {
        cumulative += w;
        curve.push(cumulative / total);
    }
    Ok(curve)
}

/// Gini coefficient via trapezoidal integration of the Lorenz curve
///
/// `G = (0.5 - B) / 0.5` where `B` is the area under the curve on a uniform
/// grid of step `1 / n`.
pub fn gini(wealth: &[f64]) -> Result<f64, ModelError> {
    let curve = lorenz_curve(wealth)?;
    let dx = 1.0 / (curve.len() - 1) as f64;
    let area: f64 = curve.windows(2).map(|w| (w[0] + w[1]) * 0.5 * dx).sum();

    Ok(((0.5 - area) / 0.5).clamp(0.0, 1.0))
}

/// Metrics taken once per completed step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsRecord {
    /// Value of the population's step counter once the step completed
    pub step: usize,
    pub crime_rate: f64,
    pub gini: f64,
}

impl MetricsRecord {
    pub fn sample(step: usize, agents: &[Agent], wealth: &[f64]) -> Result<Self, ModelError> {
        Ok(MetricsRecord {
            step,
            crime_rate: crime_rate(agents)?,
            gini: gini(wealth)?,
        })
    }
}

/// Append-only series of [`MetricsRecord`]s in step order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsHistory {
    records: Vec<MetricsRecord>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: MetricsRecord) {
        debug_assert!(
            self.records.last().map_or(true, |last| last.step < record.step),
            "metrics must be appended in step order"
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[MetricsRecord] {
        &self.records
    }

    pub fn first(&self) -> Option<&MetricsRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&MetricsRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn crime_rate_series(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.crime_rate).collect()
    }

    pub fn gini_series(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.gini).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn total_concentration_among_four() {
        // Lorenz [0, 0, 0, 0, 1], area 0.125
        assert_abs_diff_eq!(gini(&[1.0, 0.0, 0.0, 0.0]).unwrap(), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn perfect_equality_is_zero() {
        assert_abs_diff_eq!(gini(&[0.01; 100]).unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gini(&[3.0, 3.0, 3.0]).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn single_holder_approaches_one() {
        let mut previous = 0.0;
        for n in [2, 10, 100, 1000] {
            let mut wealth = vec![0.0; n];
            wealth[0] = 1.0;
            let g = gini(&wealth).unwrap();
            assert_abs_diff_eq!(g, (n as f64 - 1.0) / n as f64, epsilon = 1e-9);
            assert!(g > previous);
            previous = g;
        }
    }

    #[test]
    fn scale_and_order_invariant() {
        let wealth = [0.3, 0.05, 1.2, 0.7, 0.0, 2.5];
        let base = gini(&wealth).unwrap();

        let scaled: Vec<f64> = wealth.iter().map(|w| w * 37.5).collect();
        assert_abs_diff_eq!(gini(&scaled).unwrap(), base, epsilon = 1e-12);

        let mut reversed = wealth.to_vec();
        reversed.reverse();
        assert_abs_diff_eq!(gini(&reversed).unwrap(), base, epsilon = 1e-12);
    }

    #[test]
    fn lorenz_curve_is_monotone_and_ends_at_one() {
        let curve = lorenz_curve(&[0.7, 0.1, 0.2]).unwrap();
        assert_eq!(curve.len(), 4);
        assert_eq!(curve[0], 0.0);
        assert!(curve.windows(2).all(|w| w[0] <= w[1]));
        assert_abs_diff_eq!(curve[3], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(curve[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn gini_rejects_bad_input() {
        assert!(matches!(gini(&[]), Err(ModelError::InvalidInput(_))));
        assert!(matches!(gini(&[0.0, 0.0]), Err(ModelError::InvalidInput(_))));
        assert!(matches!(gini(&[1.0, -0.5]), Err(ModelError::InvalidInput(_))));
        assert!(matches!(gini(&[1.0, f64::NAN]), Err(ModelError::InvalidInput(_))));
    }

    #[test]
    fn overflowing_total_rejected() {
        // every entry finite, the sum is not
        assert!(matches!(
            gini(&[f64::MAX, f64::MAX, 1.0]),
            Err(ModelError::InvalidInput(_))
        ));
        assert!(lorenz_curve(&[f64::MAX, f64::MAX]).is_err());
    }

    #[test]
    fn crime_rate_counts_offenders() {
        let agents: Vec<Agent> = (0..4).map(|i| Agent::new(i, 1.0)).collect();
        assert_eq!(crime_rate(&agents).unwrap(), 0.0);
        assert!(matches!(crime_rate(&[]), Err(ModelError::DivisionByZero(_))));
    }

    #[test]
    fn history_series_follow_step_order() {
        let mut history = MetricsHistory::new();
        for step in 1..=3 {
            history.push(MetricsRecord {
                step,
                crime_rate: step as f64 / 4.0,
                gini: 0.5,
            });
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.first().map(|r| r.step), Some(1));
        assert_eq!(history.last().map(|r| r.step), Some(3));
        assert_eq!(history.crime_rate_series(), vec![0.25, 0.5, 0.75]);
        assert_eq!(history.gini_series(), vec![0.5; 3]);
    }
}

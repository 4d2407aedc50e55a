use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::random::RandomSource;

/// How the wealth gap is compared against the deterrence threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeterrenceRule {
    /// Offend iff `peer - own > deterrence`
    #[default]
    Absolute,
    /// Offend iff `peer * deterrence - own > 0`
    Relative,
}

impl DeterrenceRule {
    pub fn permits(&self, own_wealth: f64, peer_wealth: f64, deterrence: f64) -> bool {
        match self {
            DeterrenceRule::Absolute => peer_wealth - own_wealth > deterrence,
            DeterrenceRule::Relative => peer_wealth * deterrence - own_wealth > 0.0,
        }
    }
}

impl fmt::Display for DeterrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeterrenceRule::Absolute => write!(f, "absolute"),
            DeterrenceRule::Relative => write!(f, "relative"),
        }
    }
}

/// Distribution of the share of the victim's wealth taken per crime
///
/// Draws are clamped to `[0, 1]`, so a crime never moves wealth from the
/// thief to the victim and never leaves the victim below zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TheftFraction {
    /// Uniform on `[0, 1)`
    #[default]
    Uniform,
    Gaussian { mean: f64, std_dev: f64 },
    Fixed { value: f64 },
}

impl TheftFraction {
    pub fn sample<R: RandomSource + ?Sized>(&self, source: &mut R) -> f64 {
        let raw = match *self {
            TheftFraction::Uniform => source.unit(),
            TheftFraction::Gaussian { mean, std_dev } => mean + std_dev * source.standard_normal(),
            TheftFraction::Fixed { value } => value,
        };
        raw.clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match *self {
            TheftFraction::Uniform => Ok(()),
            TheftFraction::Gaussian { mean, std_dev } => {
                if !mean.is_finite() {
                    return Err(ModelError::invalid(
                        "theft_fraction.mean",
                        format!("must be finite, got {mean}"),
                    ));
                }
                if !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(ModelError::invalid(
                        "theft_fraction.std_dev",
                        format!("must be finite and non-negative, got {std_dev}"),
                    ));
                }
                Ok(())
            }
            TheftFraction::Fixed { value } => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ModelError::invalid(
                        "theft_fraction.value",
                        format!("must lie in [0, 1], got {value}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TheftFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TheftFraction::Uniform => write!(f, "uniform"),
            TheftFraction::Gaussian { mean, std_dev } => write!(f, "gaussian({mean}, {std_dev})"),
            TheftFraction::Fixed { value } => write!(f, "fixed({value})"),
        }
    }
}

/// When the per-step metrics record is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsSampling {
    /// State before the activation sweep
    PreStep,
    /// State after the activation sweep
    #[default]
    PostStep,
}

/// Validated model configuration for a single run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub num_agents: usize,
    pub deterrence: f64,
    #[serde(default)]
    pub deterrence_rule: DeterrenceRule,
    #[serde(default)]
    pub theft_fraction: TheftFraction,
    #[serde(default)]
    pub metrics_sampling: MetricsSampling,
    /// Whether an agent may draw itself as its peer
    #[serde(default = "default_self_selection")]
    pub allow_self_selection: bool,
}

fn default_self_selection() -> bool {
    true
}

impl ModelParams {
    pub fn new(num_agents: usize, deterrence: f64) -> Self {
        ModelParams {
            num_agents,
            deterrence,
            ..Self::default()
        }
    }

    /// Uniform theft fraction and absolute deterrence
    pub fn uniform_theft(num_agents: usize, deterrence: f64) -> Self {
        Self::new(num_agents, deterrence)
    }

    /// Gaussian theft fraction and absolute deterrence
    pub fn gaussian_theft(num_agents: usize, deterrence: f64, mean: f64, std_dev: f64) -> Self {
        ModelParams {
            theft_fraction: TheftFraction::Gaussian { mean, std_dev },
            ..Self::new(num_agents, deterrence)
        }
    }

    pub fn with_rule(mut self, rule: DeterrenceRule) -> Self {
        self.deterrence_rule = rule;
        self
    }

    pub fn with_theft_fraction(mut self, theft_fraction: TheftFraction) -> Self {
        self.theft_fraction = theft_fraction;
        self
    }

    pub fn with_sampling(mut self, sampling: MetricsSampling) -> Self {
        self.metrics_sampling = sampling;
        self
    }

    pub fn with_self_selection(mut self, allow: bool) -> Self {
        self.allow_self_selection = allow;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.num_agents == 0 {
            return Err(ModelError::invalid("num_agents", "population must not be empty"));
        }
        if !self.deterrence.is_finite() {
            return Err(ModelError::invalid(
                "deterrence",
                format!("must be finite, got {}", self.deterrence),
            ));
        }
        match self.deterrence_rule {
            DeterrenceRule::Absolute if self.deterrence < 0.0 => {
                return Err(ModelError::invalid(
                    "deterrence",
                    format!("absolute threshold must be non-negative, got {}", self.deterrence),
                ));
            }
            DeterrenceRule::Relative if !(0.0..=1.0).contains(&self.deterrence) => {
                return Err(ModelError::invalid(
                    "deterrence",
                    format!("relative multiplier must lie in [0, 1], got {}", self.deterrence),
                ));
            }
            _ => {}
        }
        self.theft_fraction.validate()
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams {
            num_agents: 100,
            deterrence: 0.1,
            deterrence_rule: DeterrenceRule::Absolute,
            theft_fraction: TheftFraction::Uniform,
            metrics_sampling: MetricsSampling::PostStep,
            allow_self_selection: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RngSource;

    #[test]
    fn absolute_rule_needs_strict_gap() {
        let rule = DeterrenceRule::Absolute;
        assert!(rule.permits(0.1, 0.2, 0.05));
        assert!(!rule.permits(0.1, 0.15, 0.05));
        assert!(!rule.permits(0.3, 0.3, 0.0));
    }

    #[test]
    fn relative_rule_scales_peer_wealth() {
        let rule = DeterrenceRule::Relative;
        // 0.5 * 1.0 - 0.4 > 0
        assert!(rule.permits(0.4, 1.0, 0.5));
        // 0.5 * 1.0 - 0.6 < 0
        assert!(!rule.permits(0.6, 1.0, 0.5));
    }

    #[test]
    fn gaussian_draws_are_clamped() {
        let wide = TheftFraction::Gaussian {
            mean: 0.5,
            std_dev: 5.0,
        };
        let mut source = RngSource::seeded(11);
        let draws: Vec<f64> = (0..2000).map(|_| wide.sample(&mut source)).collect();

        assert!(draws.iter().all(|f| (0.0..=1.0).contains(f)));
        assert!(draws.contains(&0.0));
        assert!(draws.contains(&1.0));
    }

    #[test]
    fn fixed_fraction_ignores_source() {
        let mut source = RngSource::seeded(0);
        assert_eq!(TheftFraction::Fixed { value: 0.25 }.sample(&mut source), 0.25);
    }

    #[test]
    fn empty_population_rejected() {
        let err = ModelParams::new(0, 0.1).validate().unwrap_err();
        assert!(matches!(err, ModelError::InvalidParameter { name: "num_agents", .. }));
    }

    #[test]
    fn deterrence_ranges_depend_on_rule() {
        assert!(ModelParams::new(10, -0.1).validate().is_err());
        assert!(ModelParams::new(10, 5.0).validate().is_ok());
        assert!(ModelParams::new(10, 5.0)
            .with_rule(DeterrenceRule::Relative)
            .validate()
            .is_err());
        assert!(ModelParams::new(10, 0.8)
            .with_rule(DeterrenceRule::Relative)
            .validate()
            .is_ok());
        assert!(ModelParams::new(10, f64::NAN).validate().is_err());
    }

    #[test]
    fn theft_fraction_parameters_checked() {
        assert!(ModelParams::gaussian_theft(10, 0.1, 0.3, -0.1).validate().is_err());
        assert!(ModelParams::new(10, 0.1)
            .with_theft_fraction(TheftFraction::Fixed { value: 1.5 })
            .validate()
            .is_err());
    }

    #[test]
    fn deserializes_from_toml() {
        let params: ModelParams = toml::from_str(
            r#"
            num_agents = 50
            deterrence = 0.2
            deterrence_rule = "relative"
            metrics_sampling = "pre_step"
            theft_fraction = { kind = "gaussian", mean = 0.3, std_dev = 0.05 }
            "#,
        )
        .unwrap();

        assert_eq!(params.num_agents, 50);
        assert_eq!(params.deterrence_rule, DeterrenceRule::Relative);
        assert_eq!(params.metrics_sampling, MetricsSampling::PreStep);
        assert!(params.allow_self_selection);
        assert_eq!(
            params.theft_fraction,
            TheftFraction::Gaussian {
                mean: 0.3,
                std_dev: 0.05
            }
        );
    }
}

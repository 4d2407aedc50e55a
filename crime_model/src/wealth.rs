use std::fmt;

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Generator for initial wealth arrays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WealthDistribution {
    /// Gamma(shape, scale)
    Gamma { shape: f64, scale: f64 },
    /// Uniform on `[low, high)`
    Uniform { low: f64, high: f64 },
    /// Everyone starts with `value`
    Equal { value: f64 },
}

impl WealthDistribution {
    pub fn validate(&self) -> Result<(), ModelError> {
        match *self {
            WealthDistribution::Gamma { shape, scale } => {
                if !(shape.is_finite() && scale.is_finite()) || shape <= 0.0 || scale <= 0.0 {
                    return Err(ModelError::invalid(
                        "gamma",
                        format!("shape and scale must be positive, got shape={shape}, scale={scale}"),
                    ));
                }
            }
            WealthDistribution::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite()) || low < 0.0 || low >= high {
                    return Err(ModelError::invalid(
                        "uniform",
                        format!("need 0 <= low < high, got [{low}, {high})"),
                    ));
                }
            }
            WealthDistribution::Equal { value } => {
                if !value.is_finite() || value < 0.0 {
                    return Err(ModelError::invalid(
                        "equal",
                        format!("value must be finite and non-negative, got {value}"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Draw `n` initial wealth values
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>, ModelError> {
        self.validate()?;
        match *self {
            WealthDistribution::Gamma { shape, scale } => {
                let gamma = Gamma::new(shape, scale).map_err(|e| {
                    ModelError::invalid("gamma", format!("shape={shape}, scale={scale}: {e}"))
                })?;
                Ok((0..n).map(|_| gamma.sample(rng)).collect())
            }
            WealthDistribution::Uniform { low, high } => {
                Ok((0..n).map(|_| rng.random_range(low..high)).collect())
            }
            WealthDistribution::Equal { value } => Ok(vec![value; n]),
        }
    }
}

impl fmt::Display for WealthDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WealthDistribution::Gamma { shape, scale } => write!(f, "gamma({shape}, {scale})"),
            WealthDistribution::Uniform { low, high } => write!(f, "uniform({low}, {high})"),
            WealthDistribution::Equal { value } => write!(f, "equal({value})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn gamma_mean_close_to_shape_times_scale() {
        let mut rng = StdRng::seed_from_u64(42);
        let wealth = WealthDistribution::Gamma {
            shape: 2.0,
            scale: 0.5,
        }
        .sample(20_000, &mut rng)
        .unwrap();

        let mean = wealth.iter().sum::<f64>() / wealth.len() as f64;
        assert!((mean - 1.0).abs() < 0.05, "mean was {mean}");
        assert!(wealth.iter().all(|w| w.is_finite() && *w >= 0.0));
    }

    #[test]
    fn uniform_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let wealth = WealthDistribution::Uniform { low: 0.2, high: 0.4 }
            .sample(500, &mut rng)
            .unwrap();
        assert_eq!(wealth.len(), 500);
        assert!(wealth.iter().all(|w| (0.2..0.4).contains(w)));
    }

    #[test]
    fn equal_fills_constant() {
        let mut rng = StdRng::seed_from_u64(1);
        let wealth = WealthDistribution::Equal { value: 0.01 }
            .sample(100, &mut rng)
            .unwrap();
        assert_eq!(wealth, vec![0.01; 100]);
    }

    #[test]
    fn bad_parameters_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(WealthDistribution::Gamma {
            shape: -1.0,
            scale: 1.0
        }
        .sample(10, &mut rng)
        .is_err());
        assert!(WealthDistribution::Uniform { low: 1.0, high: 0.5 }
            .sample(10, &mut rng)
            .is_err());
        assert!(WealthDistribution::Equal { value: -0.1 }
            .sample(10, &mut rng)
            .is_err());
    }

    #[test]
    fn same_seed_same_wealth() {
        let dist = WealthDistribution::Gamma {
            shape: 1.5,
            scale: 2.0,
        };
        let a = dist.sample(50, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = dist.sample(50, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }
}

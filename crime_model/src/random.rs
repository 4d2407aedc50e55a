use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Source of every random draw the model makes
///
/// The population owns one of these and threads it through each step, so a
/// run is fully determined by the source it was built with.
pub trait RandomSource {
    /// Permute `order` uniformly at random in place
    fn shuffle(&mut self, order: &mut [usize]);

    /// Uniform index in `0..n` (`n > 0`)
    fn index(&mut self, n: usize) -> usize;

    /// Uniform draw in `[0, 1)`
    fn unit(&mut self) -> f64;

    /// Draw from N(0, 1)
    fn standard_normal(&mut self) -> f64;
}

/// [`RandomSource`] backed by a `rand` generator
#[derive(Debug, Clone)]
pub struct RngSource<R = StdRng> {
    rng: R,
}

impl RngSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        RngSource {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        RngSource { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn shuffle(&mut self, order: &mut [usize]) {
        order.shuffle(&mut self.rng);
    }

    fn index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }

    fn unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn standard_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}

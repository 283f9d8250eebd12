use rand::Rng;
use rand_distr::{Distribution, Uniform};

use super::ParamGen;
use crate::{MlErr, Result};

/// A parameter generator that follows a certain probabilistic distribution.
pub struct RandParamGen<'r, R: Rng, D: Distribution<f32>> {
    rng: &'r mut R,
    distribution: D,
    remaining: usize,
}

impl<'r, R: Rng, D: Distribution<f32>> RandParamGen<'r, R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: &'r mut R, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<'r, R: Rng> RandParamGen<'r, R, Uniform<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(rng: &'r mut R, limit: usize, low: f32, high: f32) -> Result<Self> {
        let distribution = match Uniform::new(low, high) {
            Ok(distribution) => distribution,
            Err(e) => return Err(MlErr::InvalidParam(e.to_string())),
        };

        Ok(Self::new(rng, distribution, limit))
    }

    /// Creates a new `RandParamGen` parameter generator using Xavier (Glorot) uniform
    /// initialization, the usual default for dense kernels.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn xavier_uniform(
        rng: &'r mut R,
        limit: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Self> {
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(rng, limit, -range, range)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<'_, R, D> {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;

        let sample = (0..n)
            .map(|_| self.distribution.sample(&mut *self.rng))
            .collect();

        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn exact() {
        const SIZE: usize = 10;
        let mut rng = StdRng::seed_from_u64(42);

        let mut param_gen = RandParamGen::uniform(&mut rng, SIZE, -1., 1.).unwrap();
        let sample = param_gen.sample(SIZE).unwrap();

        assert_eq!(sample.len(), SIZE);
        assert!(sample.iter().all(|v| (-1. ..1.).contains(v)));
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn xavier_stays_within_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let bound = (6. / (64. + 128.) as f32).sqrt();

        let mut param_gen = RandParamGen::xavier_uniform(&mut rng, 64 * 128, 64, 128).unwrap();
        let sample = param_gen.sample(64 * 128).unwrap();

        assert!(sample.iter().all(|v| v.abs() <= bound));
    }

    #[test]
    fn invalid_range() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(RandParamGen::uniform(&mut rng, 1, 1., -1.).is_err());
    }
}

use crate::{MlErr, Result};

/// Produces the initial values of a model's parameters, in the order they're laid out in the
/// flat parameter buffer.
pub trait ParamGen {
    /// Samples up to `n` values.
    ///
    /// # Returns
    /// `None` once the generator is exhausted, otherwise between one and `n` values.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Appends exactly `n` values to `params`.
    ///
    /// # Arguments
    /// * `params` - The buffer being initialized.
    /// * `n` - The amount of values to append.
    ///
    /// # Returns
    /// An `InvalidParam` error if the generator runs out before producing `n` values.
    fn fill(&mut self, params: &mut Vec<f32>, n: usize) -> Result<()> {
        let mut missing = n;

        while missing > 0 {
            let Some(values) = self.sample(missing).filter(|v| !v.is_empty()) else {
                return Err(MlErr::InvalidParam(format!(
                    "parameter generator exhausted {missing} value(s) short of {n}"
                )));
            };

            missing -= values.len();
            params.extend(values);
        }

        Ok(())
    }
}

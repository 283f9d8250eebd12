use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::{Result, arch::loss::LossFn, training::StepStats};

/// A model that doesn't own its parameters, they live in a flat buffer handed in on every call.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Generates a fresh set of initial parameters for the model.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>>;

    /// Computes the model's output for a batch without mutating the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch, one sample per row.
    fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model
    /// over a single batch. `params` are left untouched, updating them is the optimizer's job.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient, same size as `params`.
    /// * `loss_fn` - The loss function.
    /// * `x` - The input batch.
    /// * `y` - The expected output for the batch.
    ///
    /// # Returns
    /// The loss and hit count over the batch.
    fn backprop<L: LossFn>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<StepStats>;
}

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, layers::Layer, loss::LossFn};
use crate::{MlErr, Result, metrics, training::StepStats};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns one line per layer with its shape and parameter count.
    pub fn summary(&self) -> Vec<String> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                format!("layer_{} {} {} params", i + 1, layer.describe(), layer.size())
            })
            .collect()
    }

    /// Makes a forward pass through the network, caching what backprop needs.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward<'x>(
        &'x mut self,
        params: &[f32],
        mut x: ArrayView2<'x, f32>,
    ) -> Result<ArrayView2<'x, f32>> {
        let ranges = self.param_ranges(params.len())?;

        for (layer, &(start, end)) in self.layers.iter_mut().zip(&ranges) {
            x = layer.forward(&params[start..end], x)?;
        }

        Ok(x)
    }

    /// Splits the flat parameter buffer into each layer's `(start, end)` range.
    fn param_ranges(&self, len: usize) -> Result<Vec<(usize, usize)>> {
        let size = self.size();
        if len != size {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: len,
                expected: size,
            });
        }

        let mut start = 0;
        let ranges = self
            .layers
            .iter()
            .map(|layer| {
                let range = (start, start + layer.size());
                start = range.1;
                range
            })
            .collect();

        Ok(ranges)
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let mut params = Vec::with_capacity(self.size());

        for layer in &self.layers {
            params.extend(layer.init_params(rng)?);
        }

        Ok(params)
    }

    fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let ranges = self.param_ranges(params.len())?;
        let mut out = x.to_owned();

        for (layer, &(start, end)) in self.layers.iter().zip(&ranges) {
            out = layer.predict(&params[start..end], out.view())?;
        }

        Ok(out)
    }

    fn backprop<L: LossFn>(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        loss_fn: &L,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
    ) -> Result<StepStats> {
        if grad.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let ranges = self.param_ranges(params.len())?;

        let y_pred = self.forward(params, x)?;
        if y_pred.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "model output width",
                got: y_pred.ncols(),
                expected: y.ncols(),
            });
        }

        let loss = loss_fn.loss(y_pred, y);
        let hits = metrics::categorical_hits(y_pred, y);
        let mut d_last = loss_fn.loss_prime(y_pred, y);
        let mut d = d_last.view_mut();

        for (layer, &(start, end)) in self.layers.iter_mut().zip(&ranges).rev() {
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
        }

        Ok(StepStats::new(loss, hits, x.nrows()))
    }
}

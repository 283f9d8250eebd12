use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use rand::Rng;

use super::Dense;
use crate::{Result, arch::activations::ActFn};

/// The layers a `Sequential` model can be built from.
#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
        }
    }

    /// Returns a one line description of the layer for model summaries.
    pub fn describe(&self) -> String {
        match self {
            Self::Dense(l) => {
                let (fan_in, fan_out) = l.dim();
                let act = l.act_fn().map(|a| a.name()).unwrap_or("linear");
                format!("dense ({fan_in} -> {fan_out}, {act})")
            }
        }
    }

    pub fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>> {
        match self {
            Self::Dense(l) => l.init_params(rng),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x),
        }
    }

    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.predict(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayViewMut2<f32>,
    ) -> Result<ArrayViewMut2<'_, f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d),
        }
    }
}

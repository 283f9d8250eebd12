use ndarray::prelude::*;
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::activations::ActFn,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
};

/// A fully connected layer, `a = act_fn(x · w + b)`.
///
/// The layer doesn't own its parameters, it views a slice of the model's flat parameter
/// buffer laid out as the `(in, out)` weight matrix in row-major order followed by the
/// `out` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
    a: Array2<f32>,

    // Backward metadata
    d: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output widths of the layer.
    /// * `act_fn` - The activation applied to the output, if any.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros.clone(),
            a: zeros.clone(),
            d: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn act_fn(&self) -> Option<ActFn> {
        self.act_fn
    }

    /// Generates the initial parameters for this layer: Xavier uniform weights and zero biases.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// A vector of `size()` parameters or an error if the distribution couldn't be built.
    pub fn init_params<R: Rng>(&self, rng: &mut R) -> Result<Vec<f32>> {
        let (fan_in, fan_out) = self.dim;
        let w_size = fan_in * fan_out;

        let mut weights = RandParamGen::xavier_uniform(rng, w_size, fan_in, fan_out)?;
        let mut biases = ConstParamGen::zeros(fan_out);

        let mut params = Vec::with_capacity(self.size);
        weights.fill(&mut params, w_size)?;
        biases.fill(&mut params, fan_out)?;
        Ok(params)
    }

    /// Makes a forward pass through the layer, caching what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// A view of the layer's output or an error if the shapes don't match.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        self.z = self.affine(params, x)?;
        self.x = x.to_owned();

        let Some(ref act_fn) = self.act_fn else {
            return Ok(self.z.view());
        };

        self.a = Array2::zeros(self.z.raw_dim());
        act_fn.f(&self.z, &mut self.a);
        Ok(self.a.view())
    }

    /// Makes a forward pass without touching the cached metadata.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The layer's output or an error if the shapes don't match.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.affine(params, x)?;

        let Some(ref act_fn) = self.act_fn else {
            return Ok(z);
        };

        let mut a = Array2::zeros(z.raw_dim());
        act_fn.f(&z, &mut a);
        Ok(a)
    }

    /// Back propagates `d` through the layer, writing this layer's gradient into `grad`.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `grad` - This layer's slice of the gradient, overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: ArrayViewMut2<f32>,
    ) -> Result<ArrayViewMut2<'_, f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense backward delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            act_fn.df(&self.z, &self.a, &mut d);
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        dw.assign(&self.x.t().dot(&d));
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        self.d = d.dot(&w.t());

        Ok(self.d.view_mut())
    }

    fn affine(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input width",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        Ok(x.dot(&w) + &b)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

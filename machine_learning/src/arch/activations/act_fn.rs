use ndarray::{Array2, ArrayViewMut2, Zip};

use super::{Relu, Softmax};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActFn {
    Relu(Relu),
    Softmax(Softmax),
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu(Relu::new())
    }

    pub fn softmax() -> Self {
        Self::Softmax(Softmax::new())
    }

    /// The name this activation is known by in model summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu(_) => "relu",
            Self::Softmax(_) => "softmax",
        }
    }

    /// Activates every row of `z` and writes it to `a`.
    ///
    /// # Arguments
    /// * `z` - The layer's pre-activations.
    /// * `a` - The output buffer, must share `z`'s shape.
    pub fn f(&self, z: &Array2<f32>, a: &mut Array2<f32>) {
        match self {
            Self::Relu(act) => a.zip_mut_with(z, |a, &z| *a = act.f(z)),
            Self::Softmax(act) => Zip::from(z.rows())
                .and(a.rows_mut())
                .for_each(|z, a| act.f(z, a)),
        }
    }

    /// Back propagates `d` through this activation in place.
    ///
    /// # Arguments
    /// * `z` - The pre-activations cached on the forward pass.
    /// * `a` - The activations cached on the forward pass.
    /// * `d` - The derivative of the loss with respect to `a`, becomes the derivative with respect to `z`.
    pub fn df(&self, z: &Array2<f32>, a: &Array2<f32>, d: &mut ArrayViewMut2<f32>) {
        match self {
            Self::Relu(act) => d.zip_mut_with(z, |d, &z| *d *= act.df(z)),
            Self::Softmax(act) => Zip::from(a.rows())
                .and(d.rows_mut())
                .for_each(|a, d| act.df(a, d)),
        }
    }
}

use ndarray::{ArrayView1, ArrayViewMut1};

/// Normalized exponential over a whole row of pre-activations.
///
/// Unlike the element-wise activations, every output depends on the entire row, so this
/// works on rows instead of scalars.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Softmax;

impl Softmax {
    pub fn new() -> Self {
        Self
    }

    /// Writes the softmax of `z` into `a`.
    ///
    /// The row maximum is subtracted before exponentiating so large logits can't overflow.
    ///
    /// # Arguments
    /// * `z` - A row of pre-activations.
    /// * `a` - The output row, must have the same length as `z`.
    pub fn f(&self, z: ArrayView1<f32>, mut a: ArrayViewMut1<f32>) {
        let max = z.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        a.zip_mut_with(&z, |a, &z| *a = (z - max).exp());

        let sum = a.sum();
        a.mapv_inplace(|v| v / sum);
    }

    /// Turns `d`, the derivative of the loss with respect to this row's outputs, into the
    /// derivative with respect to its inputs (the Jacobian-vector product).
    ///
    /// # Arguments
    /// * `a` - The outputs produced by `f` for this row.
    /// * `d` - The incoming derivative, overwritten in place.
    pub fn df(&self, a: ArrayView1<f32>, mut d: ArrayViewMut1<f32>) {
        let dot = d.dot(&a);
        d.zip_mut_with(&a, |d, &a| *d = a * (*d - dot));
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, array};

    use super::*;

    #[test]
    fn rows_sum_to_one() {
        let z = array![1.0_f32, 2.0, 3.0, -4.0];
        let mut a = Array1::zeros(4);
        Softmax.f(z.view(), a.view_mut());

        assert!((a.sum() - 1.0).abs() < 1e-6);
        assert!(a.iter().all(|&v| v > 0.0));
        assert!(a[2] > a[1] && a[1] > a[0] && a[0] > a[3]);
    }

    #[test]
    fn large_logits_do_not_overflow() {
        let z = array![1000.0_f32, 1000.0];
        let mut a = Array1::zeros(2);
        Softmax.f(z.view(), a.view_mut());

        assert!((a[0] - 0.5).abs() < 1e-6);
        assert!((a[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn gradient_of_uniform_upstream_is_zero() {
        // Shifting every output by the same amount doesn't change a normalized row.
        let a = array![0.2_f32, 0.3, 0.5];
        let mut d = array![1.0_f32, 1.0, 1.0];
        Softmax.df(a.view(), d.view_mut());

        assert!(d.iter().all(|v| v.abs() < 1e-6));
    }
}

use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

const DEFAULT_EPSILON: f32 = 1e-7;

/// Categorical cross-entropy between one-hot targets and predicted class probabilities.
///
/// Predictions are clipped to `[epsilon, 1 - epsilon]` before taking their logarithm.
#[derive(Clone, Copy, Debug)]
pub struct CategoricalCrossEntropy {
    epsilon: f32,
}

impl CategoricalCrossEntropy {
    /// Returns a new `CategoricalCrossEntropy` with the default clipping epsilon.
    pub fn new() -> Self {
        Self::with_epsilon(DEFAULT_EPSILON)
    }

    pub fn with_epsilon(epsilon: f32) -> Self {
        Self { epsilon }
    }

    fn clip(&self, p: f32) -> f32 {
        p.clamp(self.epsilon, 1. - self.epsilon)
    }
}

impl Default for CategoricalCrossEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl LossFn for CategoricalCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let rows = y_pred.nrows();
        if rows == 0 {
            return 0.;
        }

        let mut total = 0.;
        Zip::from(&y_pred).and(&y).for_each(|&p, &t| {
            total -= t * self.clip(p).ln();
        });

        total / rows as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let rows = y_pred.nrows().max(1) as f32;

        Zip::from(&y_pred)
            .and(&y)
            .map_collect(|&p, &t| -t / (self.clip(p) * rows))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn perfect_prediction_has_near_zero_loss() {
        let y = array![[0., 1., 0.]];
        let loss = CategoricalCrossEntropy::new().loss(y.view(), y.view());

        assert!(loss < 1e-5);
    }

    #[test]
    fn uniform_prediction_loss_is_log_of_classes() {
        let y_pred = array![[0.25, 0.25, 0.25, 0.25], [0.25, 0.25, 0.25, 0.25]];
        let y = array![[1., 0., 0., 0.], [0., 0., 0., 1.]];

        let loss = CategoricalCrossEntropy::new().loss(y_pred.view(), y.view());
        assert!((loss - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn derivative_only_flows_through_the_target_class() {
        let y_pred = array![[0.5, 0.5]];
        let y = array![[1., 0.]];

        let loss_fn = CategoricalCrossEntropy::new();
        let d = loss_fn.loss_prime(y_pred.view(), y.view());
        assert!((d[[0, 0]] + 2.).abs() < 1e-5);
        assert_eq!(d[[0, 1]], 0.);
    }
}

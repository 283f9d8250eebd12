use std::sync::Arc;

use log::info;
use machine_learning::arch::{Model, Sequential, activations::ActFn, layers::Layer};
use ndarray::{Array2, ArrayView2};
use parking_lot::RwLock;
use rand::Rng;

use crate::{Result, sample::SAMPLE_LEN};

/// Width of a classifier input row, one feature per grid cell.
pub const INPUT_WIDTH: usize = SAMPLE_LEN;

/// Amount of digit classes the classifier tells apart.
pub const NUM_CLASSES: usize = 10;

const HIDDEN: [usize; 2] = [128, 64];

/// Builds the untrained network: two relu hidden layers and a softmax output.
pub fn architecture() -> Sequential {
    let [h1, h2] = HIDDEN;

    Sequential::new([
        Layer::dense((INPUT_WIDTH, h1), Some(ActFn::relu())),
        Layer::dense((h1, h2), Some(ActFn::relu())),
        Layer::dense((h2, NUM_CLASSES), Some(ActFn::softmax())),
    ])
}

/// A digit classifier: the network together with the parameters it was trained to.
#[derive(Debug, Clone)]
pub struct Classifier {
    net: Sequential,
    params: Vec<f32>,
}

impl Classifier {
    /// Creates a classifier with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `rng` - The random number generator the initial weights are drawn from.
    pub fn init<R: Rng>(rng: &mut R) -> Result<Self> {
        let net = architecture();
        let params = net.init_params(rng)?;
        Ok(Self { net, params })
    }

    /// Wraps an already trained network.
    pub fn from_parts(net: Sequential, params: Vec<f32>) -> Self {
        Self { net, params }
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn into_parts(self) -> (Sequential, Vec<f32>) {
        (self.net, self.params)
    }

    /// Computes the class probabilities of every row in `x`.
    ///
    /// # Arguments
    /// * `x` - A `(rows, INPUT_WIDTH)` batch of samples.
    ///
    /// # Returns
    /// A `(rows, NUM_CLASSES)` matrix whose rows sum to one.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        Ok(self.net.predict(&self.params, x)?)
    }

    pub fn summary(&self) -> Vec<String> {
        let mut lines = self.net.summary();
        lines.push(format!("total {} params", self.net.size()));
        lines
    }
}

/// The shared slot holding the current trained classifier, empty until the first training
/// run succeeds.
///
/// Readers clone out an `Arc` so a publish never waits on an in-flight prediction.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    slot: Arc<RwLock<Option<Arc<Classifier>>>>,
}

impl ModelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current classifier, if any.
    pub fn publish(&self, classifier: Classifier) {
        *self.slot.write() = Some(Arc::new(classifier));
        info!("published a new classifier");
    }

    pub fn current(&self) -> Option<Arc<Classifier>> {
        self.slot.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.slot.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn architecture_has_expected_size() {
        let net = architecture();
        let expected = 64 * 128 + 128 + 128 * 64 + 64 + 64 * 10 + 10;
        assert_eq!(net.size(), expected);
    }

    #[test]
    fn forward_gives_distributions() {
        let mut rng = StdRng::seed_from_u64(7);
        let classifier = Classifier::init(&mut rng).unwrap();
        let x = Array2::from_shape_fn((3, INPUT_WIDTH), |(i, j)| ((i + j) % 2) as f32);

        let out = classifier.forward(x.view()).unwrap();
        assert_eq!(out.dim(), (3, NUM_CLASSES));
        for row in out.rows() {
            assert!((row.sum() - 1.).abs() < 1e-5);
        }
    }

    #[test]
    fn summary_lists_every_layer() {
        let mut rng = StdRng::seed_from_u64(0);
        let classifier = Classifier::init(&mut rng).unwrap();
        let summary = classifier.summary();

        assert_eq!(summary.len(), 4);
        assert!(summary[0].starts_with("layer_1 dense (64 -> 128, relu)"));
        assert!(summary[3].starts_with("total"));
    }

    #[test]
    fn handle_starts_empty_and_publishes() {
        let handle = ModelHandle::new();
        assert!(!handle.is_ready());
        assert!(handle.current().is_none());

        let mut rng = StdRng::seed_from_u64(1);
        handle.publish(Classifier::init(&mut rng).unwrap());

        let other = handle.clone();
        assert!(other.is_ready());
        assert!(other.current().is_some());
    }
}

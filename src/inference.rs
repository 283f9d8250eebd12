use machine_learning::metrics;
use ndarray::{ArrayView1, ArrayView2};

use crate::{
    Result, Sample,
    model::{INPUT_WIDTH, ModelHandle},
};

/// Answers predictions from whatever classifier is currently published.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    model: ModelHandle,
}

impl InferenceEngine {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_ready()
    }

    /// Predicts the digit drawn in `sample`.
    ///
    /// # Returns
    /// The most probable class, the lowest one on ties, or `None` if no classifier was
    /// trained yet. Errors only if the published classifier can't run the forward pass.
    pub fn predict(&self, sample: &Sample) -> Result<Option<u8>> {
        let Some(probs) = self.probabilities(sample)? else {
            return Ok(None);
        };

        let class = metrics::argmax(ArrayView1::from(probs.as_slice()));
        Ok(Some(class as u8))
    }

    /// The class probabilities of `sample`, `None` if no classifier was trained yet.
    pub fn probabilities(&self, sample: &Sample) -> Result<Option<Vec<f32>>> {
        let Some(classifier) = self.model.current() else {
            return Ok(None);
        };

        let features = sample.features();
        let x = ArrayView2::from_shape((1, INPUT_WIDTH), &features[..])
            .map_err(machine_learning::MlErr::from)?;
        let out = classifier.forward(x)?;

        Ok(Some(out.row(0).to_vec()))
    }
}

/// Statistics produced by a single training step over one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    loss: f32,
    hits: usize,
    samples: usize,
}

impl StepStats {
    /// Creates a new `StepStats`.
    ///
    /// # Arguments
    /// * `loss` - The mean loss over the batch.
    /// * `hits` - The amount of correctly classified samples.
    /// * `samples` - The amount of samples in the batch.
    pub fn new(loss: f32, hits: usize, samples: usize) -> Self {
        Self {
            loss,
            hits,
            samples,
        }
    }

    pub fn loss(&self) -> f32 {
        self.loss
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

/// The metrics of one epoch. Validation metrics are absent when there was nothing to validate on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

/// The per-epoch record of a `fit` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitHistory {
    epochs: Vec<EpochStats>,
}

impl FitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stats: EpochStats) {
        self.epochs.push(stats);
    }

    pub fn epochs(&self) -> &[EpochStats] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// The training accuracy of the last epoch.
    pub fn final_accuracy(&self) -> Option<f32> {
        self.epochs.last().map(|e| e.accuracy)
    }

    pub fn final_loss(&self) -> Option<f32> {
        self.epochs.last().map(|e| e.loss)
    }
}

use std::num::NonZeroUsize;

use log::debug;
use rand::Rng;

use super::{EpochStats, FitHistory};
use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    metrics,
    optimization::Optimizer,
};

/// A model `ModelTrainer`. Contains the relevant components needed for training a model,
/// including the model itself.
pub struct ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: M,
    optimizer: O,
    loss_fn: L,

    epochs: NonZeroUsize,
    batch_size: NonZeroUsize,
    shuffle: bool,
    rng: R,
}

impl<M, O, L, R> ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - The optimizer that dictates how to update the parameters after each batch.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `epochs` - The amount of passes over the training data per `fit` call.
    /// * `batch_size` - The amount of rows per gradient step.
    /// * `shuffle` - Whether the training rows are shuffled before each epoch.
    /// * `rng` - A random number generator.
    pub fn new(
        model: M,
        optimizer: O,
        loss_fn: L,
        epochs: NonZeroUsize,
        batch_size: NonZeroUsize,
        shuffle: bool,
        rng: R,
    ) -> Self {
        Self {
            model,
            optimizer,
            loss_fn,
            epochs,
            batch_size,
            shuffle,
            rng,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Trains the model for the configured amount of epochs, **`params` gets updated** after
    /// every batch. The validation data is only ever used to measure the model.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `train` - The training data.
    /// * `validation` - The validation data, if any.
    /// * `should_stop` - Polled before every batch, stops the fit when it returns `true`.
    /// * `on_epoch` - Called with the metrics of every finished epoch.
    ///
    /// # Returns
    /// The history of the fit, or an error if the shapes don't line up, the fit was stopped or
    /// the parameters diverged.
    pub fn fit<S, E>(
        &mut self,
        params: &mut [f32],
        train: &mut Dataset,
        validation: Option<&Dataset>,
        should_stop: S,
        mut on_epoch: E,
    ) -> Result<FitHistory>
    where
        S: Fn() -> bool,
        E: FnMut(&EpochStats),
    {
        if train.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let validation = validation.filter(|v| !v.is_empty());
        let mut grad = vec![0.; params.len()];
        let mut history = FitHistory::new();

        for epoch in 1..=self.epochs.get() {
            if self.shuffle {
                train.shuffle(&mut self.rng);
            }

            let mut loss = 0.;
            let mut hits = 0;
            let mut samples = 0;

            for (x, y) in train.batches(self.batch_size) {
                if should_stop() {
                    return Err(MlErr::Interrupted { epoch });
                }

                let step = self
                    .model
                    .backprop(params, &mut grad, &self.loss_fn, x, y)?;
                self.optimizer.update_params(&grad, params)?;

                loss += step.loss() * step.samples() as f32;
                hits += step.hits();
                samples += step.samples();
            }

            let (val_loss, val_accuracy) = match validation {
                Some(val) => {
                    let (l, a) = self.evaluate(params, val)?;
                    (Some(l), Some(a))
                }
                None => (None, None),
            };

            if !loss.is_finite() || params.iter().any(|p| !p.is_finite()) {
                return Err(MlErr::Diverged { epoch });
            }

            let stats = EpochStats {
                epoch,
                loss: loss / samples as f32,
                accuracy: hits as f32 / samples as f32,
                val_loss,
                val_accuracy,
            };

            debug!(
                "epoch {epoch}/{}: loss {:.4}, acc {:.4}, val_loss {val_loss:?}, val_acc {val_accuracy:?}",
                self.epochs, stats.loss, stats.accuracy
            );

            on_epoch(&stats);
            history.push(stats);
        }

        Ok(history)
    }

    /// Measures the model over a whole dataset without updating it.
    ///
    /// # Returns
    /// The mean loss and the accuracy.
    pub fn evaluate(&self, params: &[f32], data: &Dataset) -> Result<(f32, f32)> {
        if data.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let y_pred = self.model.predict(params, data.x())?;
        let loss = self.loss_fn.loss(y_pred.view(), data.y());
        let hits = metrics::categorical_hits(y_pred.view(), data.y());

        Ok((loss, hits as f32 / data.len() as f32))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use ndarray::Array2;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        arch::{Sequential, activations::ActFn, layers::Layer, loss::CategoricalCrossEntropy},
        dataset::one_hot,
        optimization::Adam,
    };

    fn trainer(epochs: usize) -> ModelTrainer<Sequential, Adam, CategoricalCrossEntropy, StdRng> {
        trainer_with_beta1(epochs, 0.9)
    }

    fn trainer_with_beta1(
        epochs: usize,
        beta1: f32,
    ) -> ModelTrainer<Sequential, Adam, CategoricalCrossEntropy, StdRng> {
        let model = Sequential::new([
            Layer::dense((2, 8), Some(ActFn::relu())),
            Layer::dense((8, 2), Some(ActFn::softmax())),
        ]);
        let optimizer = Adam::new(model.size(), 0.05, beta1, 0.999, 1e-7);

        ModelTrainer::new(
            model,
            optimizer,
            CategoricalCrossEntropy::new(),
            NonZeroUsize::new(epochs).unwrap(),
            NonZeroUsize::new(4).unwrap(),
            true,
            StdRng::seed_from_u64(21),
        )
    }

    // Class 1 iff the first coordinate is the larger one.
    fn separable() -> Dataset {
        let points = [
            [1., 0.],
            [0., 1.],
            [0.9, 0.2],
            [0.1, 0.8],
            [0.7, 0.1],
            [0.3, 0.9],
            [0.8, 0.4],
            [0.2, 0.6],
        ];
        let x = Array2::from_shape_fn((points.len(), 2), |(i, j)| points[i][j]);
        let labels: Vec<usize> = points.iter().map(|p| (p[0] > p[1]) as usize).collect();

        Dataset::new(x, one_hot(&labels, 2).unwrap()).unwrap()
    }

    #[test]
    fn learns_a_separable_problem() {
        let mut trainer = trainer(150);
        let mut params = trainer
            .model()
            .init_params(&mut StdRng::seed_from_u64(1))
            .unwrap();
        let mut train = separable();

        let history = trainer
            .fit(&mut params, &mut train, None, || false, |_| {})
            .unwrap();

        assert_eq!(history.len(), 150);
        assert!(history.final_loss().unwrap() < history.epochs()[0].loss);
        assert_eq!(history.final_accuracy(), Some(1.));
    }

    #[test]
    fn reports_validation_metrics_every_epoch() {
        let mut trainer = trainer(3);
        let mut params = trainer
            .model()
            .init_params(&mut StdRng::seed_from_u64(2))
            .unwrap();
        let (mut train, val) = separable().split_at(6).unwrap();

        let mut seen = Vec::new();
        trainer
            .fit(&mut params, &mut train, Some(&val), || false, |e| {
                seen.push(e.epoch)
            })
            .unwrap();

        assert_eq!(seen, [1, 2, 3]);
    }

    #[test]
    fn empty_validation_yields_no_metrics() {
        let mut trainer = trainer(1);
        let mut params = trainer
            .model()
            .init_params(&mut StdRng::seed_from_u64(3))
            .unwrap();
        let (mut train, val) = separable().split_at(8).unwrap();

        let history = trainer
            .fit(&mut params, &mut train, Some(&val), || false, |_| {})
            .unwrap();

        assert_eq!(history.epochs()[0].val_loss, None);
    }

    #[test]
    fn stops_when_asked() {
        let mut trainer = trainer(10);
        let mut params = trainer
            .model()
            .init_params(&mut StdRng::seed_from_u64(4))
            .unwrap();
        let mut train = separable();
        let polls = Cell::new(0);

        let res = trainer.fit(
            &mut params,
            &mut train,
            None,
            || {
                polls.set(polls.get() + 1);
                polls.get() > 3
            },
            |_| {},
        );

        assert!(matches!(res, Err(MlErr::Interrupted { epoch: 2 })));
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let mut trainer = trainer(1);
        let mut params = vec![0.; trainer.model().size()];
        let (mut empty, _) = separable().split_at(0).unwrap();

        let res = trainer.fit(&mut params, &mut empty, None, || false, |_| {});
        assert!(matches!(res, Err(MlErr::EmptyDataset)));
    }

    #[test]
    fn non_finite_parameters_stop_the_fit() {
        // beta1 = 1 zeroes Adam's bias correction.
        let mut trainer = trainer_with_beta1(5, 1.);
        let mut params = trainer
            .model()
            .init_params(&mut StdRng::seed_from_u64(5))
            .unwrap();
        let mut train = separable();
        let mut epochs = 0;

        let res = trainer.fit(&mut params, &mut train, None, || false, |_| epochs += 1);

        assert!(matches!(res, Err(MlErr::Diverged { epoch: 1 })));
        assert_eq!(epochs, 0);
    }
}

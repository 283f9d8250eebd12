use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, error, info, warn};
use machine_learning::{
    MlErr,
    arch::loss::CategoricalCrossEntropy,
    dataset::{Dataset as Tensors, one_hot},
    optimization::Adam,
    training::{FitHistory, ModelTrainer},
};
use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::task;
use tokio_util::sync::CancellationToken;

use crate::{
    RecognizerErr, Result, Sample,
    config::{OptimizerConfig, SplitConfig, TrainingConfig},
    dataset::Dataset,
    events::{EventSink, TrainingEvent},
    model::{Classifier, INPUT_WIDTH, ModelHandle, NUM_CLASSES},
};

/// The outcome of a successful training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Training accuracy of the last epoch.
    pub accuracy: f32,
    pub history: FitHistory,
    pub num_train: usize,
    pub num_val: usize,
    /// Positions, in flattened order, of the samples held out for validation.
    pub validation: Vec<usize>,
}

/// Turns dataset snapshots into published classifiers, one run at a time.
///
/// Every run builds a fresh classifier and only publishes it to the `ModelHandle` once the
/// fit finished. A failed or cancelled run leaves the current classifier in place.
pub struct TrainingPipeline {
    config: TrainingConfig,
    model: ModelHandle,
    training: Arc<AtomicBool>,
    events: EventSink,
}

impl TrainingPipeline {
    /// Creates a new `TrainingPipeline`.
    ///
    /// # Arguments
    /// * `config` - The training hyperparameters.
    /// * `model` - Where trained classifiers are published.
    ///
    /// # Returns
    /// The pipeline or `InvalidConfig` if the hyperparameters can't train a model.
    pub fn new(config: TrainingConfig, model: ModelHandle) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            model,
            training: Arc::new(AtomicBool::new(false)),
            events: EventSink::none(),
        })
    }

    /// Reports the progress of every run to `events`.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Acquire)
    }

    /// Trains a fresh classifier on `dataset` and publishes it.
    ///
    /// Invalid input is rejected before any tensor is built. The fit itself runs on the
    /// blocking pool and polls `cancel` before every batch.
    ///
    /// # Arguments
    /// * `dataset` - A snapshot of the labeled samples.
    /// * `cancel` - Aborts the run when cancelled.
    ///
    /// # Returns
    /// The training report, or an error if another run is in flight, the input is invalid,
    /// the run was cancelled or the fit failed.
    pub async fn train(
        &self,
        dataset: Dataset,
        cancel: CancellationToken,
    ) -> Result<TrainingReport> {
        let guard = TrainingGuard::acquire(&self.training).ok_or_else(|| {
            warn!("training requested while another run is in flight");
            RecognizerErr::TrainingInProgress
        })?;

        let res = self.run(guard, &dataset, cancel).await;

        match &res {
            Ok(report) => {
                info!(
                    "training finished: accuracy {:.4} over {} epoch(s)",
                    report.accuracy,
                    report.history.len()
                );
                self.events.send(TrainingEvent::Finished {
                    accuracy: report.accuracy,
                });
            }
            Err(RecognizerErr::Cancelled) => {
                warn!("training cancelled, keeping the current classifier");
                self.events.send(TrainingEvent::Cancelled);
            }
            Err(e) if e.is_rejection() => {
                warn!("training rejected: {e}");
                self.events.send(TrainingEvent::Rejected {
                    error: e.to_string(),
                });
            }
            Err(e) => {
                error!("training failed: {e}");
                self.events.send(TrainingEvent::Failed {
                    error: e.to_string(),
                });
            }
        }

        res
    }

    async fn run(
        &self,
        guard: TrainingGuard,
        dataset: &Dataset,
        cancel: CancellationToken,
    ) -> Result<TrainingReport> {
        let (samples, labels) = flatten(dataset)?;
        if samples.is_empty() {
            return Err(RecognizerErr::EmptyDataset);
        }

        let (num_train, num_val) = split_sizes(samples.len(), self.config.split_ratio);
        if num_train == 0 {
            return Err(RecognizerErr::EmptyTrainingPartition {
                samples: samples.len(),
            });
        }

        info!(
            "training on {} sample(s): {num_train} train, {num_val} validation",
            samples.len()
        );
        self.events.send(TrainingEvent::Started {
            samples: samples.len(),
            train: num_train,
            validation: num_val,
        });

        let config = self.config.clone();
        let model = self.model.clone();
        let events = self.events.clone();

        task::spawn_blocking(move || -> Result<TrainingReport> {
            let _guard = guard;
            let run = FitRun {
                config: &config,
                samples: &samples,
                labels: &labels,
                num_train,
                num_val,
                cancel: &cancel,
                events: &events,
            };

            let (classifier, report) = run.fit()?;
            model.publish(classifier);
            Ok(report)
        })
        .await
        .map_err(|e| io::Error::other(format!("training task join error: {e}")))?
    }
}

/// The blocking part of a training run.
struct FitRun<'a> {
    config: &'a TrainingConfig,
    samples: &'a [Sample],
    labels: &'a [usize],
    num_train: usize,
    num_val: usize,
    cancel: &'a CancellationToken,
    events: &'a EventSink,
}

impl FitRun<'_> {
    fn fit(self) -> Result<(Classifier, TrainingReport)> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        if self.config.split == SplitConfig::Shuffled {
            order.shuffle(&mut rng);
        }
        let (mut train, validation) = self.tensors(&order)?.split_at(self.num_train)?;

        let classifier = Classifier::init(&mut rng)?;
        for line in classifier.summary() {
            info!("{line}");
        }
        let (net, mut params) = classifier.into_parts();

        let OptimizerConfig::Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config.optimizer;
        let optimizer = Adam::new(params.len(), learning_rate, beta1, beta2, epsilon);

        let epochs = self.config.epochs;
        let mut trainer = ModelTrainer::new(
            net,
            optimizer,
            CategoricalCrossEntropy::new(),
            epochs,
            self.config.batch_size,
            self.config.shuffle_batches,
            rng,
        );

        let history = trainer.fit(
            &mut params,
            &mut train,
            Some(&validation),
            || self.cancel.is_cancelled(),
            |stats| self.events.send(TrainingEvent::epoch(stats, epochs.get())),
        )?;

        let accuracy = history.final_accuracy().unwrap_or_default();
        let report = TrainingReport {
            accuracy,
            history,
            num_train: self.num_train,
            num_val: self.num_val,
            validation: order.split_off(self.num_train),
        };

        Ok((Classifier::from_parts(trainer.into_model(), params), report))
    }

    /// Builds the feature and one-hot target tensors with their rows in `order`.
    fn tensors(&self, order: &[usize]) -> Result<Tensors> {
        let features: Vec<f32> = order
            .iter()
            .flat_map(|&i| self.samples[i].features())
            .collect();
        let labels: Vec<usize> = order.iter().map(|&i| self.labels[i]).collect();

        let x = Array2::from_shape_vec((order.len(), INPUT_WIDTH), features)
            .map_err(MlErr::from)?;
        let y = one_hot(&labels, NUM_CLASSES)?;

        Ok(Tensors::new(x, y)?)
    }
}

/// Holds the single-flight flag for as long as a run is alive.
struct TrainingGuard {
    flag: Arc<AtomicBool>,
}

impl TrainingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for TrainingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Maps label text to its class.
///
/// # Returns
/// The class in `0..NUM_CLASSES` or `LabelOutOfRange` if the text doesn't name one.
pub fn label_class(label: &str) -> Result<usize> {
    label
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&class| class < NUM_CLASSES)
        .ok_or_else(|| RecognizerErr::LabelOutOfRange {
            label: label.to_string(),
        })
}

/// Flattens a dataset into parallel sequences of samples and classes, labels in key order and
/// samples in insertion order. Labels without samples are skipped.
///
/// # Returns
/// The samples and their classes, or `LabelOutOfRange` for the first label with samples that
/// doesn't name a class.
pub fn flatten(dataset: &Dataset) -> Result<(Vec<Sample>, Vec<usize>)> {
    let mut samples = Vec::new();
    let mut labels = Vec::new();

    for (label, drawn) in dataset.iter().filter(|(_, drawn)| !drawn.is_empty()) {
        let class = label_class(label)?;
        debug!("label {label:?}: {} sample(s)", drawn.len());

        samples.extend_from_slice(drawn);
        labels.extend(std::iter::repeat_n(class, drawn.len()));
    }

    Ok((samples, labels))
}

/// Sizes of the training and validation partitions of `n` rows, the training partition
/// being the first `floor(n * ratio)` of them.
pub fn split_sizes(n: usize, ratio: f32) -> (usize, usize) {
    let train = ((n as f64 * ratio as f64).floor() as usize).min(n);
    (train, n - train)
}

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use recognizer::{
    Dataset, EventSink, InferenceEngine, ModelHandle, RecognizerErr, Sample, TrainingConfig,
    TrainingEvent, TrainingPipeline,
    config::{OptimizerConfig, SplitConfig},
    dataset::seed_dataset,
    pipeline,
};
use tokio::time;
use tokio_util::sync::CancellationToken;

fn config(epochs: usize) -> TrainingConfig {
    TrainingConfig {
        epochs: NonZeroUsize::new(epochs).unwrap(),
        seed: Some(42),
        ..TrainingConfig::default()
    }
}

/// One distinct drawing per digit: a horizontal bar on the digit's row plus a dot in its column.
fn one_per_digit() -> Dataset {
    (0..10)
        .map(|digit| {
            let mut grid = [0; 64];
            let row = digit % 8;
            for col in 0..8 {
                grid[row * 8 + col] = 1;
            }
            grid[(7 - row) * 8 + digit % 8] = 1;
            if digit >= 8 {
                grid[digit - 8] ^= 1;
                grid[63 - digit] = 1;
            }

            (digit.to_string(), vec![Sample::new(&grid).unwrap()])
        })
        .collect()
}

#[tokio::test]
async fn empty_dataset_is_rejected() {
    let model = ModelHandle::new();
    let pipeline = TrainingPipeline::new(config(30), model.clone()).unwrap();

    let res = pipeline.train(Dataset::new(), CancellationToken::new()).await;
    assert!(matches!(res, Err(RecognizerErr::EmptyDataset)));
    assert!(!model.is_ready());
    assert!(!pipeline.is_training());
}

#[tokio::test]
async fn labels_without_samples_count_as_empty() {
    let pipeline = TrainingPipeline::new(config(30), ModelHandle::new()).unwrap();
    let mut dataset = Dataset::new();
    dataset.insert("5".into(), vec![]);

    let res = pipeline.train(dataset, CancellationToken::new()).await;
    assert!(matches!(res, Err(RecognizerErr::EmptyDataset)));
}

#[tokio::test]
async fn one_sample_per_digit_trains_and_predicts() {
    let model = ModelHandle::new();
    let pipeline = TrainingPipeline::new(config(30), model.clone()).unwrap();
    let dataset = one_per_digit();

    let report = pipeline
        .train(dataset.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.num_train, 8);
    assert_eq!(report.num_val, 2);
    assert_eq!(report.history.len(), 30);
    assert!((0. ..=1.).contains(&report.accuracy));
    assert_eq!(report.history.final_accuracy(), Some(report.accuracy));
    assert!(report.history.epochs().iter().all(|e| e.val_loss.is_some()));
    assert!(model.is_ready());

    let engine = InferenceEngine::new(model.clone());
    for sample in dataset.values().flatten() {
        let digit = engine.predict(sample).unwrap().unwrap();
        assert!(digit <= 9);

        let probs = engine.probabilities(sample).unwrap().unwrap();
        let total: f32 = probs.iter().sum();
        assert!((total - 1.).abs() < 1e-4);
    }

    let classifier = model.current().unwrap();
    assert!(classifier.params().iter().all(|p| p.is_finite()));
}

#[tokio::test]
async fn a_single_sample_leaves_nothing_to_train_on() {
    let model = ModelHandle::new();
    let pipeline = TrainingPipeline::new(config(30), model.clone()).unwrap();
    let mut dataset = Dataset::new();
    dataset.insert("1".into(), vec![Sample::blank()]);

    let res = pipeline.train(dataset, CancellationToken::new()).await;
    assert!(matches!(
        res,
        Err(RecognizerErr::EmptyTrainingPartition { samples: 1 })
    ));
    assert!(!model.is_ready());
}

#[tokio::test]
async fn out_of_range_label_is_rejected_before_training() {
    let (events, mut rx) = EventSink::channel();
    let model = ModelHandle::new();
    let pipeline = TrainingPipeline::new(config(30), model.clone())
        .unwrap()
        .with_events(events);

    let mut dataset = seed_dataset().unwrap();
    dataset.insert("42".into(), vec![Sample::blank()]);

    let res = pipeline.train(dataset, CancellationToken::new()).await;
    assert!(matches!(
        res,
        Err(RecognizerErr::LabelOutOfRange { label }) if label == "42"
    ));
    assert!(!model.is_ready());

    assert!(matches!(rx.try_recv(), Ok(TrainingEvent::Rejected { .. })));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn cancelled_training_does_not_publish() {
    let (events, mut rx) = EventSink::channel();
    let model = ModelHandle::new();
    let pipeline = TrainingPipeline::new(config(30), model.clone())
        .unwrap()
        .with_events(events);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let res = pipeline.train(seed_dataset().unwrap(), cancel).await;
    assert!(matches!(res, Err(RecognizerErr::Cancelled)));
    assert!(!model.is_ready());

    assert!(matches!(rx.try_recv(), Ok(TrainingEvent::Started { .. })));
    assert_eq!(rx.try_recv().unwrap(), TrainingEvent::Cancelled);
}

#[tokio::test]
async fn concurrent_training_is_rejected() {
    let model = ModelHandle::new();
    let pipeline = TrainingPipeline::new(config(1_000_000), model.clone()).unwrap();
    let pipeline = Arc::new(pipeline);
    let cancel = CancellationToken::new();

    let running = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            pipeline.train(seed_dataset().unwrap(), cancel).await
        })
    };

    while !pipeline.is_training() {
        time::sleep(Duration::from_millis(1)).await;
    }

    let res = pipeline
        .train(seed_dataset().unwrap(), CancellationToken::new())
        .await;
    assert!(matches!(res, Err(RecognizerErr::TrainingInProgress)));

    cancel.cancel();
    let res = running.await.unwrap();
    assert!(matches!(res, Err(RecognizerErr::Cancelled)));
    assert!(!model.is_ready());
    assert!(!pipeline.is_training());
}

#[tokio::test]
async fn progress_is_reported_in_order() {
    let (events, mut rx) = EventSink::channel();
    let pipeline = TrainingPipeline::new(config(3), ModelHandle::new())
        .unwrap()
        .with_events(events);

    let report = pipeline
        .train(seed_dataset().unwrap(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        rx.try_recv().unwrap(),
        TrainingEvent::Started {
            samples: 20,
            train: 17,
            validation: 3,
        }
    );
    for expected in 1..=3 {
        match rx.try_recv().unwrap() {
            TrainingEvent::Epoch { epoch, epochs, .. } => {
                assert_eq!(epoch, expected);
                assert_eq!(epochs, 3);
            }
            other => panic!("expected an epoch, got {other:?}"),
        }
    }
    assert_eq!(
        rx.try_recv().unwrap(),
        TrainingEvent::Finished {
            accuracy: report.accuracy
        }
    );
}

#[tokio::test]
async fn retraining_replaces_the_classifier() {
    let model = ModelHandle::new();
    let pipeline = TrainingPipeline::new(config(2), model.clone()).unwrap();

    pipeline
        .train(seed_dataset().unwrap(), CancellationToken::new())
        .await
        .unwrap();
    let first = model.current().unwrap();

    pipeline
        .train(seed_dataset().unwrap(), CancellationToken::new())
        .await
        .unwrap();
    let second = model.current().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn predict_before_training_gives_nothing() {
    let engine = InferenceEngine::new(ModelHandle::new());
    assert_eq!(engine.predict(&Sample::blank()).unwrap(), None);
}

#[test]
fn unstable_optimizer_is_rejected_up_front() {
    let unstable = TrainingConfig {
        optimizer: OptimizerConfig::Adam {
            learning_rate: 0.001,
            beta1: 1.0,
            beta2: 0.999,
            epsilon: 1e-7,
        },
        ..config(30)
    };

    let res = TrainingPipeline::new(unstable, ModelHandle::new());
    assert!(matches!(res, Err(RecognizerErr::InvalidConfig(_))));

    let no_training = TrainingConfig {
        split_ratio: 0.,
        ..config(30)
    };
    let res = TrainingPipeline::new(no_training, ModelHandle::new());
    assert!(matches!(res, Err(RecognizerErr::InvalidConfig(_))));
}

async fn train_split(config: TrainingConfig) -> Vec<usize> {
    let pipeline = TrainingPipeline::new(config, ModelHandle::new()).unwrap();
    let report = pipeline
        .train(seed_dataset().unwrap(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.validation.len(), report.num_val);
    report.validation
}

#[tokio::test]
async fn ordered_split_validates_on_the_last_samples() {
    let validation = train_split(config(1)).await;
    assert_eq!(validation, [17, 18, 19]);

    let (_, labels) = pipeline::flatten(&seed_dataset().unwrap()).unwrap();
    let held_out: Vec<_> = validation.iter().map(|&i| labels[i]).collect();
    assert_eq!(held_out, [8, 9, 9]);
}

#[tokio::test]
async fn shuffled_split_follows_the_seed() {
    let shuffled = |seed| TrainingConfig {
        split: SplitConfig::Shuffled,
        seed: Some(seed),
        ..config(1)
    };

    let first = train_split(shuffled(7)).await;
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|&i| i < 20));
    let mut unique = first.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), 3);

    assert_eq!(train_split(shuffled(7)).await, first);

    let mut partitions = Vec::new();
    for seed in 0..5 {
        partitions.push(train_split(shuffled(seed)).await);
    }
    assert!(partitions.iter().any(|p| *p != [17, 18, 19]));
}

#[tokio::test]
async fn unshuffled_batches_are_deterministic() {
    let unshuffled = TrainingConfig {
        shuffle_batches: false,
        ..config(3)
    };

    let run = |config: TrainingConfig| async move {
        let model = ModelHandle::new();
        let pipeline = TrainingPipeline::new(config, model.clone()).unwrap();
        let report = pipeline
            .train(seed_dataset().unwrap(), CancellationToken::new())
            .await
            .unwrap();
        (report.history, model.current().unwrap())
    };

    let (first, a) = run(unshuffled.clone()).await;
    let (second, b) = run(unshuffled).await;
    assert_eq!(first, second);
    assert_eq!(a.params(), b.params());
}

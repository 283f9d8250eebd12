use machine_learning::training::EpochStats;
use tokio::sync::mpsc;

/// Progress of a training run, as seen from outside the blocking pool.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    /// The samples were flattened and split.
    Started {
        samples: usize,
        train: usize,
        validation: usize,
    },
    Epoch {
        epoch: usize,
        epochs: usize,
        loss: f32,
        accuracy: f32,
        val_loss: Option<f32>,
        val_accuracy: Option<f32>,
    },
    /// The classifier was published.
    Finished { accuracy: f32 },
    Cancelled,
    /// The snapshot was invalid, nothing was trained.
    Rejected { error: String },
    /// The fit itself failed.
    Failed { error: String },
}

impl TrainingEvent {
    pub(crate) fn epoch(stats: &EpochStats, epochs: usize) -> Self {
        Self::Epoch {
            epoch: stats.epoch,
            epochs,
            loss: stats.loss,
            accuracy: stats.accuracy,
            val_loss: stats.val_loss,
            val_accuracy: stats.val_accuracy,
        }
    }
}

/// The sending half of an optional event stream. Sending never fails: events are dropped when
/// nobody is listening.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<TrainingEvent>>,
}

impl EventSink {
    /// A sink that drops every event.
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a connected sink and the receiver its events arrive at.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TrainingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn send(&self, event: TrainingEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

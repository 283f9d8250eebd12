use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The recognizer's result type.
pub type Result<T> = std::result::Result<T, RecognizerErr>;

/// Every failure the dataset, training and storage layers can report.
///
/// A prediction requested before any successful training is not an error, `predict`
/// returns `None` for it.
#[derive(Debug)]
pub enum RecognizerErr {
    /// A sample with the wrong length or a value other than 0 or 1.
    InvalidSample { len: usize, reason: &'static str },
    /// Training was requested with no samples at all.
    EmptyDataset,
    /// A label whose text doesn't name a class in `0..=9`.
    LabelOutOfRange { label: String },
    /// The split left no rows to fit on.
    EmptyTrainingPartition { samples: usize },
    /// Another training run is in flight.
    TrainingInProgress,
    /// The training run was cancelled before it finished.
    Cancelled,
    /// The numerical layer failed while building, compiling or fitting the model.
    TrainingFailure(MlErr),
    InvalidConfig(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for RecognizerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSample { len, reason } => {
                write!(f, "invalid sample of length {len}: {reason}")
            }
            Self::EmptyDataset => write!(f, "dataset empty, add some samples before training"),
            Self::LabelOutOfRange { label } => {
                write!(f, "label {label:?} is not a class between 0 and 9")
            }
            Self::EmptyTrainingPartition { samples } => write!(
                f,
                "{samples} sample(s) leave nothing to train on after the validation split"
            ),
            Self::TrainingInProgress => write!(f, "a training run is already in progress"),
            Self::Cancelled => write!(f, "training was cancelled"),
            Self::TrainingFailure(e) => write!(f, "training failed: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl RecognizerErr {
    /// Whether the input was turned down before any training work started.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidSample { .. }
                | Self::EmptyDataset
                | Self::LabelOutOfRange { .. }
                | Self::EmptyTrainingPartition { .. }
        )
    }
}

impl Error for RecognizerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TrainingFailure(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for RecognizerErr {
    fn from(e: MlErr) -> Self {
        match e {
            MlErr::Interrupted { .. } => Self::Cancelled,
            e => Self::TrainingFailure(e),
        }
    }
}

impl From<io::Error> for RecognizerErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for RecognizerErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

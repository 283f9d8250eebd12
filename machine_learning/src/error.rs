use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    EmptyDataset,
    InvalidLabel {
        label: usize,
        classes: usize,
    },
    InvalidParam(String),
    Interrupted {
        epoch: usize,
    },
    Diverged {
        epoch: usize,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::Shape(e) => write!(f, "Invalid array shape: {e}"),
            MlErr::EmptyDataset => write!(f, "Tried to fit a model on an empty dataset"),
            MlErr::InvalidLabel { label, classes } => write!(
                f,
                "The label {label} is out of range for a one-hot encoding of {classes} classes"
            ),
            MlErr::InvalidParam(msg) => write!(f, "Invalid parameter: {msg}"),
            MlErr::Interrupted { epoch } => {
                write!(f, "Training was interrupted during epoch {epoch}")
            }
            MlErr::Diverged { epoch } => write!(
                f,
                "The loss or the parameters stopped being finite during epoch {epoch}"
            ),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

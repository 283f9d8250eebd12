pub mod config;
pub mod dataset;
mod error;
pub mod events;
pub mod inference;
pub mod model;
pub mod pipeline;
mod sample;
pub mod storage;

pub use config::{AppConfig, TrainingConfig};
pub use dataset::{Dataset, DatasetStore};
pub use error::{RecognizerErr, Result};
pub use events::{EventSink, TrainingEvent};
pub use inference::InferenceEngine;
pub use model::{Classifier, ModelHandle};
pub use pipeline::{TrainingPipeline, TrainingReport};
pub use sample::{GRID_SIDE, SAMPLE_LEN, Sample};

mod history;
mod model_trainer;

pub use history::{EpochStats, FitHistory, StepStats};
pub use model_trainer::ModelTrainer;

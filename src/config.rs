use std::{env, fs, num::NonZeroUsize, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{RecognizerErr, Result};

const CONFIG_ENV: &str = "RECOGNIZER_CONFIG";
const DATA_DIR_ENV: &str = "RECOGNIZER_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_EPOCHS: NonZeroUsize = NonZeroUsize::new(30).unwrap();
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(32).unwrap();

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// How the flattened samples are divided into the training and validation partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitConfig {
    /// The first rows in dataset order train, the rest validate.
    #[default]
    Ordered,
    /// The rows are shuffled with the configured seed before splitting.
    Shuffled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    /// Fraction of the samples used for training, in `(0, 1]`.
    pub split_ratio: f32,
    pub split: SplitConfig,
    /// Shuffle the training partition before every epoch.
    pub shuffle_batches: bool,
    pub seed: Option<u64>,
    pub optimizer: OptimizerConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            split_ratio: 0.85,
            split: SplitConfig::Ordered,
            shuffle_batches: true,
            seed: None,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Checks the values serde can't.
    pub fn validate(&self) -> Result<()> {
        if !(self.split_ratio > 0. && self.split_ratio <= 1.) {
            return Err(RecognizerErr::InvalidConfig(format!(
                "split_ratio must be in (0, 1], got {}",
                self.split_ratio
            )));
        }

        let OptimizerConfig::Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.optimizer;

        if learning_rate <= 0. || epsilon <= 0. {
            return Err(RecognizerErr::InvalidConfig(
                "adam learning_rate and epsilon must be positive".into(),
            ));
        }

        if !(0. ..1.).contains(&beta1) || !(0. ..1.).contains(&beta2) {
            return Err(RecognizerErr::InvalidConfig(
                "adam betas must be in [0, 1)".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the dataset document is stored in.
    pub data_dir: PathBuf,
    pub training: TrainingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            training: TrainingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses and validates a JSON config, missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.training.validate()?;
        Ok(config)
    }

    /// Builds the config from the file named by `RECOGNIZER_CONFIG`, if set, and lets
    /// `RECOGNIZER_DATA_DIR` override the data directory.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => {
                let json = fs::read_to_string(&path).map_err(|e| {
                    RecognizerErr::InvalidConfig(format!("cannot read '{path}': {e}"))
                })?;
                Self::from_json(&json)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(dir) = env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

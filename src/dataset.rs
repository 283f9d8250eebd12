use std::{collections::BTreeMap, sync::Arc};

use log::{debug, info};

use crate::{Result, Sample, storage::KeyValueStore};

/// The key the whole dataset document is stored under.
pub const STORAGE_KEY: &str = "matrix-dataset";

const SEED_DATASET: &str = include_str!("../assets/seed_dataset.json");

/// Label text mapped to its samples in insertion order, most recent last.
pub type Dataset = BTreeMap<String, Vec<Sample>>;

/// A label as it's shown to the user, samples most recent first.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelView<'a> {
    pub label: &'a str,
    pub samples: Vec<&'a Sample>,
}

impl LabelView<'_> {
    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

/// Owns the labeled samples and writes the whole dataset to durable storage after every
/// mutation.
pub struct DatasetStore {
    dataset: Dataset,
    storage: Arc<dyn KeyValueStore>,
}

impl DatasetStore {
    /// Loads the dataset stored under `STORAGE_KEY`, falling back to the bundled seed
    /// dataset if nothing was stored yet.
    ///
    /// # Arguments
    /// * `storage` - The durable storage the dataset lives in.
    ///
    /// # Returns
    /// The store or an error if the stored document can't be read or parsed.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let dataset = match storage.get(STORAGE_KEY)? {
            Some(doc) => serde_json::from_str(&doc)?,
            None => {
                info!("no stored dataset under {STORAGE_KEY:?}, starting from the seed dataset");
                seed_dataset()?
            }
        };

        Ok(Self { dataset, storage })
    }

    /// Creates a store holding `dataset`, nothing is written until the first mutation.
    pub fn with_dataset(storage: Arc<dyn KeyValueStore>, dataset: Dataset) -> Self {
        Self { dataset, storage }
    }

    pub fn empty(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_dataset(storage, Dataset::new())
    }

    /// Appends `sample` to `label`'s samples, creating the label if it's new.
    ///
    /// The in-memory dataset is updated even if persisting it fails.
    pub fn add(&mut self, label: &str, sample: Sample) -> Result<()> {
        let samples = self.dataset.entry(label.to_string()).or_default();
        samples.push(sample);
        debug!("added sample to {label:?}, now {} sample(s)", samples.len());

        self.persist()
    }

    /// Validates raw cell values and appends them as a sample, see `add`.
    pub fn add_cells(&mut self, label: &str, cells: &[u8]) -> Result<()> {
        let sample = Sample::new(cells)?;
        self.add(label, sample)
    }

    /// Removes the sample at `index` counting from the most recently added one.
    ///
    /// Unknown labels are ignored. An index past the end leaves the samples untouched but
    /// the dataset is still written back.
    ///
    /// # Returns
    /// The removed sample, if any.
    pub fn remove(&mut self, label: &str, index: usize) -> Result<Option<Sample>> {
        let Some(samples) = self.dataset.get_mut(label) else {
            debug!("remove on unknown label {label:?} ignored");
            return Ok(None);
        };

        let pos = samples
            .len()
            .checked_sub(index)
            .and_then(|n| n.checked_sub(1));
        let removed = pos.map(|pos| samples.remove(pos));

        self.persist()?;
        Ok(removed)
    }

    /// Returns a point-in-time copy of the whole dataset.
    pub fn snapshot(&self) -> Dataset {
        self.dataset.clone()
    }

    pub fn samples(&self, label: &str) -> Option<&[Sample]> {
        self.dataset.get(label).map(Vec::as_slice)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.dataset.keys().map(String::as_str)
    }

    /// Total amount of samples over every label.
    pub fn len(&self) -> usize {
        self.dataset.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dataset in the order it's shown: labels reversed, samples most recent first.
    /// Indices into `samples` are the ones `remove` takes.
    pub fn display(&self) -> Vec<LabelView<'_>> {
        self.dataset
            .iter()
            .rev()
            .map(|(label, samples)| LabelView {
                label,
                samples: samples.iter().rev().collect(),
            })
            .collect()
    }

    fn persist(&self) -> Result<()> {
        let doc = serde_json::to_string(&self.dataset)?;
        self.storage.set(STORAGE_KEY, &doc)
    }
}

/// The dataset bundled with the application, a couple of drawings per digit.
pub fn seed_dataset() -> Result<Dataset> {
    Ok(serde_json::from_str(SEED_DATASET)?)
}

use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset, each row of `x` pairs with the same row of `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The features, one sample per row.
    /// * `y` - The targets, one sample per row.
    ///
    /// # Returns
    /// A new `Dataset` or an error if `x` and `y` have a different amount of rows.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset targets",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Splits the dataset in two at row `mid`, keeping the row order.
    ///
    /// # Returns
    /// The rows `[0, mid)` and `[mid, len)` or an error if `mid` is out of bounds.
    pub fn split_at(&self, mid: usize) -> Result<(Self, Self)> {
        if mid > self.len() {
            return Err(MlErr::SizeMismatch {
                what: "split point",
                got: mid,
                expected: self.len(),
            });
        }

        let head = Self {
            x: self.x.slice(s![..mid, ..]).to_owned(),
            y: self.y.slice(s![..mid, ..]).to_owned(),
        };
        let tail = Self {
            x: self.x.slice(s![mid.., ..]).to_owned(),
            y: self.y.slice(s![mid.., ..]).to_owned(),
        };

        Ok((head, tail))
    }

    /// Applies the same random permutation to the rows of `x` and `y`.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }

    /// Iterates the dataset in batches of `batch_size` rows, the last one may be smaller.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let size = batch_size.get();

        self.x
            .axis_chunks_iter(Axis(0), size)
            .zip(self.y.axis_chunks_iter(Axis(0), size))
    }
}

/// Encodes every label as a row with a single `1.` at the label's index.
///
/// # Arguments
/// * `labels` - The class of each row.
/// * `classes` - The width of the encoding.
///
/// # Returns
/// The encoded labels or an error if any label is `>= classes`.
pub fn one_hot(labels: &[usize], classes: usize) -> Result<Array2<f32>> {
    let mut encoded = Array2::zeros((labels.len(), classes));

    for (i, &label) in labels.iter().enumerate() {
        if label >= classes {
            return Err(MlErr::InvalidLabel { label, classes });
        }

        encoded[[i, label]] = 1.;
    }

    Ok(encoded)
}

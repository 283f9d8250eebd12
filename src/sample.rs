use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{RecognizerErr, Result};

/// Side of the drawing grid.
pub const GRID_SIDE: usize = 8;

/// Amount of cells in a sample.
pub const SAMPLE_LEN: usize = GRID_SIDE * GRID_SIDE;

const CELL_CHARS: [char; 2] = ['.', '#'];

/// An 8×8 binary grid flattened in row-major order, cell `(row, col)` lives at `row * 8 + col`.
///
/// Only valid grids can be built, so every `Sample` has exactly 64 cells, each 0 or 1.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Sample([u8; SAMPLE_LEN]);

impl Sample {
    /// Creates a new `Sample` out of its cell values.
    ///
    /// # Arguments
    /// * `cells` - 64 values in row-major order.
    ///
    /// # Returns
    /// The sample or an `InvalidSample` error if the length or any value is wrong.
    pub fn new(cells: &[u8]) -> Result<Self> {
        let Ok(grid) = <[u8; SAMPLE_LEN]>::try_from(cells) else {
            return Err(RecognizerErr::InvalidSample {
                len: cells.len(),
                reason: "a sample must have exactly 64 cells",
            });
        };

        if grid.iter().any(|&v| v > 1) {
            return Err(RecognizerErr::InvalidSample {
                len: cells.len(),
                reason: "cells must be 0 or 1",
            });
        }

        Ok(Self(grid))
    }

    /// A sample with no cell set.
    pub fn blank() -> Self {
        Self([0; SAMPLE_LEN])
    }

    pub fn cells(&self) -> &[u8; SAMPLE_LEN] {
        &self.0
    }

    /// The sample as the input row of the classifier.
    pub fn features(&self) -> [f32; SAMPLE_LEN] {
        self.0.map(f32::from)
    }
}

impl TryFrom<Vec<u8>> for Sample {
    type Error = RecognizerErr;

    fn try_from(cells: Vec<u8>) -> Result<Self> {
        Self::new(&cells)
    }
}

impl From<Sample> for Vec<u8> {
    fn from(sample: Sample) -> Self {
        sample.0.to_vec()
    }
}

/// Parses 64 `0`/`1` characters, rows may be separated by `/` or whitespace.
impl FromStr for Sample {
    type Err = RecognizerErr;

    fn from_str(s: &str) -> Result<Self> {
        let cells = s
            .chars()
            .filter(|c| *c != '/' && !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(0),
                '1' => Ok(1),
                _ => Err(RecognizerErr::InvalidSample {
                    len: s.len(),
                    reason: "cells must be written as 0 or 1",
                }),
            })
            .collect::<Result<Vec<u8>>>()?;

        Self::new(&cells)
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self.0.iter().map(|&v| char::from(b'0' + v)).collect();
        write!(f, "Sample({bits})")
    }
}

/// Draws the grid with `#` for set cells, one row per line.
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.0.chunks(GRID_SIDE) {
            let line: String = row.iter().map(|&v| CELL_CHARS[v as usize]).collect();
            writeln!(f, "{line}")?;
        }

        Ok(())
    }
}

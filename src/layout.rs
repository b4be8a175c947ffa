// src/layout.rs

//! Sample layout arithmetic: element widths and memory-budget planning.
//!
//! A dataset file is a flat sequence of fixed-width samples, each holding
//! `num_features` feature values plus one trailing label value of a single
//! element type. Everything the engine needs to know about geometry — bytes
//! per sample, samples per in-memory block, blocks per dataset — is derived
//! here, once, before any I/O starts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShuffleError};

/// Storage element type of a dataset file.
///
/// Identifiers follow the names the dataset producers use (`"float64"`,
/// `"uint8"`, ...). Unknown identifiers are a caller configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Uint8,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ElementType {
    /// Storage width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Uint8 => 1,
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl FromStr for ElementType {
    type Err = ShuffleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uint8" => Ok(Self::Uint8),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            other => Err(ShuffleError::unsupported_type(other)),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte geometry of one sample row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub element_type: ElementType,
    /// Feature count, excluding the trailing label.
    pub num_features: usize,
}

impl SampleLayout {
    pub fn new(element_type: ElementType, num_features: usize) -> Self {
        Self {
            element_type,
            num_features,
        }
    }

    /// Bytes occupied by one sample: `(num_features + 1) * width`.
    pub fn row_bytes(&self) -> usize {
        (self.num_features + 1) * self.element_type.width()
    }

    /// Converts a memory budget in megabytes into a block size in samples.
    ///
    /// The result is `min(floor(buffer_mb * 1e6 / row_bytes), num_samples)`.
    /// This is the single knob bounding resident memory for every downstream
    /// component.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the budget cannot hold even one
    /// sample.
    pub fn samples_per_block(&self, buffer_mb: f64, num_samples: u64) -> Result<usize> {
        let budget_bytes = (buffer_mb * 1e6) as u64;
        let fit = budget_bytes / self.row_bytes() as u64;
        if fit == 0 {
            return Err(ShuffleError::config(format!(
                "memory budget of {buffer_mb} MB cannot hold a single {} sample of {} bytes",
                self.element_type,
                self.row_bytes()
            )));
        }
        Ok(fit.min(num_samples) as usize)
    }
}

/// Block geometry of one shuffle run, derived from `n` and the block size.
///
/// `num_blocks` counts the blocks the reader will actually produce, so the
/// final short block of an unevenly divided dataset is included. The merge
/// phase pulls `chunk_rows` rows per round from every live slot cursor;
/// `num_blocks * chunk_rows` is approximately one block, which is what keeps
/// the merge within the memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub samples_per_block: usize,
    pub num_blocks: usize,
    pub chunk_rows: usize,
}

impl BlockPlan {
    pub fn for_dataset(num_samples: u64, samples_per_block: usize) -> Self {
        let spb = samples_per_block as u64;
        let num_blocks = num_samples.div_ceil(spb) as usize;
        // Rounded down, but never zero: a single-sample chunk still drains.
        let chunk_rows = (samples_per_block / num_blocks).max(1);
        Self {
            samples_per_block,
            num_blocks,
            chunk_rows,
        }
    }
}

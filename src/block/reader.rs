// src/block/reader.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, ShuffleError};
use crate::storage::{StorageBackend, StorageReader};

use super::Block;

/// A lazy, forward-only sequence of fixed-size sample blocks.
///
/// The reader walks a dataset file from offset 0 in `samples_per_block`-row
/// steps, never seeking backwards and never re-reading. The final block may
/// be shorter when the sample count is not evenly divisible; it is surfaced
/// as-is, never padded. Restarting means constructing a new reader.
pub struct BlockReader {
    reader: Box<dyn StorageReader>,
    path: PathBuf,
    row_bytes: usize,
    samples_per_block: usize,
    total_samples: u64,
    next_sample: u64,
    next_block: usize,
}

impl BlockReader {
    /// Opens a dataset file for block streaming.
    ///
    /// The file must hold at least `total_samples * row_bytes` bytes; a
    /// shorter file fails here rather than mid-run, since a partial read
    /// has no safe recovery.
    ///
    /// # Errors
    ///
    /// Returns `DatasetRead` if the file cannot be opened or is too short.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        path: PathBuf,
        row_bytes: usize,
        samples_per_block: usize,
        total_samples: u64,
    ) -> Result<Self> {
        let reader = storage.open_read(&path)?;

        let required = total_samples * row_bytes as u64;
        if reader.size() < required {
            return Err(ShuffleError::read(
                &path,
                format!(
                    "dataset holds {} bytes but {total_samples} samples of {row_bytes} bytes require {required}",
                    reader.size()
                ),
            ));
        }

        Ok(Self {
            reader,
            path,
            row_bytes,
            samples_per_block,
            total_samples,
            next_sample: 0,
            next_block: 0,
        })
    }

    /// Reads the next block, or `None` once all samples have been produced.
    ///
    /// # Errors
    ///
    /// Returns a fatal `DatasetRead` error if the underlying read fails.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        let remaining = self.total_samples - self.next_sample;
        if remaining == 0 {
            return Ok(None);
        }

        let rows = (self.samples_per_block as u64).min(remaining) as usize;
        let offset = self.next_sample * self.row_bytes as u64;
        let data = self.reader.read_range(offset, rows * self.row_bytes)?;

        let block = Block::from_bytes(self.next_block, self.row_bytes, data);
        self.next_sample += rows as u64;
        self.next_block += 1;

        Ok(Some(block))
    }

    /// Fraction of samples produced so far, between 0.0 and 1.0.
    pub fn progress(&self) -> f64 {
        if self.total_samples == 0 {
            return 1.0;
        }
        self.next_sample as f64 / self.total_samples as f64
    }

    /// Number of blocks this reader will produce in total.
    pub fn num_blocks(&self) -> usize {
        self.total_samples.div_ceil(self.samples_per_block as u64) as usize
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Iterator for BlockReader {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

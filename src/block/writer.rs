// src/block/writer.rs

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, ShuffleError};
use crate::storage::{StorageBackend, StorageWriter};

use super::Block;

/// Appends blocks to an output file in the order they are submitted.
///
/// The target is opened (and truncated) on the first `write` call; every
/// subsequent call is a pure append preserving within-block row order.
/// Ordering semantics belong entirely to the caller. A write failure is
/// fatal and leaves a partial file the caller must treat as invalid — the
/// engine writes to a temporary path and renames only after `finish`.
pub struct BlockWriter {
    storage: Arc<dyn StorageBackend>,
    path: PathBuf,
    writer: Option<Box<dyn StorageWriter>>,
    rows_written: u64,
}

impl BlockWriter {
    pub fn new(storage: Arc<dyn StorageBackend>, path: PathBuf) -> Self {
        Self {
            storage,
            path,
            writer: None,
            rows_written: 0,
        }
    }

    /// Appends one block.
    ///
    /// # Errors
    ///
    /// Returns a fatal `DatasetWrite` error if opening or writing fails.
    pub fn write(&mut self, block: &Block) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(self.storage.open_write(&self.path)?);
        }
        let writer = self
            .writer
            .as_mut()
            .expect("writer is opened on first use");
        writer.write_all(block.as_bytes()).map_err(|e| {
            ShuffleError::write_with_source(
                &self.path,
                format!("failed to append block {}", block.index),
                e,
            )
        })?;

        self.rows_written += block.rows() as u64;
        Ok(())
    }

    /// Flushes and syncs the output, returning the total row count.
    ///
    /// A writer that never received a block finishes without creating the
    /// target file.
    ///
    /// # Errors
    ///
    /// Returns `DatasetWrite` if flushing or syncing fails.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(self.rows_written)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

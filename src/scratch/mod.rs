// src/scratch/mod.rs

//! Scoped scratch storage for in-flight shuffle runs.
//!
//! A shuffle run persists every locally-randomized block to its own scratch
//! slot before the merge phase re-reads them in small chunks. The
//! `ScratchScope` owns those slots for exactly one run: it creates a unique
//! directory on construction and removes it — slots and all — when dropped,
//! whether the run succeeded or failed partway.

mod cursor;

pub use cursor::SlotCursor;

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::block::Block;
use crate::error::{Result, ShuffleError};
use crate::storage::StorageBackend;

/// Scoped temporary storage holding one scratch slot per block index.
///
/// The only supported access pattern per slot is single-writer then
/// single-reader; concurrent access to the same slot is undefined.
pub struct ScratchScope {
    storage: Arc<dyn StorageBackend>,
    dir: PathBuf,
    slots: HashSet<usize>,
}

impl ScratchScope {
    /// Creates the scope's backing directory under `base_dir`.
    ///
    /// The directory name carries the process id, a timestamp, and a
    /// process-wide counter, so successive runs never collide — including
    /// runs started within the same millisecond and leftovers of a crashed
    /// process.
    ///
    /// # Errors
    ///
    /// Returns `DatasetWrite` if the directory cannot be created.
    pub fn create(storage: Arc<dyn StorageBackend>, base_dir: &Path) -> Result<Self> {
        static SCOPE_COUNTER: AtomicU64 = AtomicU64::new(0);

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let nonce = SCOPE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = base_dir.join(format!("run_{}_{stamp}_{nonce}", std::process::id()));
        storage.create_dir_all(&dir)?;

        Ok(Self {
            storage,
            dir,
            slots: HashSet::new(),
        })
    }

    /// Persists `block` as scratch slot `index`, overwriting any prior
    /// content at that slot. Indices may be written in any order.
    ///
    /// # Errors
    ///
    /// Returns a fatal `DatasetWrite` error if persisting fails.
    pub fn write_block(&mut self, index: usize, block: &Block) -> Result<()> {
        let path = self.slot_path(index);
        let mut writer = self.storage.open_write(&path)?;
        writer.write_all(block.as_bytes()).map_err(|e| {
            ShuffleError::write_with_source(&path, format!("failed to write slot {index}"), e)
        })?;
        writer.finish()?;

        self.slots.insert(index);
        Ok(())
    }

    /// Opens a cursor over slot `index` yielding `chunk_rows`-row chunks of
    /// `row_bytes`-wide rows until the slot is exhausted.
    ///
    /// The row width is a parameter because the external sort stores
    /// key-prefixed rows that are wider than dataset rows.
    ///
    /// # Errors
    ///
    /// Returns `SlotNotFound` if `index` was never written; that is an
    /// algorithm-logic bug, not a recoverable condition.
    pub fn cursor(&self, index: usize, chunk_rows: usize, row_bytes: usize) -> Result<SlotCursor> {
        if !self.slots.contains(&index) {
            return Err(ShuffleError::slot_not_found(index));
        }

        let reader = self.storage.open_read(&self.slot_path(index))?;
        Ok(SlotCursor::new(index, reader, chunk_rows, row_bytes))
    }

    /// Number of slots written so far.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// The scope's backing directory.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn slot_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("slot_{index}.blk"))
    }
}

impl Drop for ScratchScope {
    fn drop(&mut self) {
        // Release on every exit path. A failed removal must not mask the
        // error already propagating, so it is logged and swallowed.
        if let Err(e) = self.storage.delete(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove scratch directory");
        }
    }
}

// src/scratch/cursor.rs

use crate::block::Block;
use crate::error::Result;
use crate::storage::StorageReader;

/// A lazy reader positioned over one scratch slot.
///
/// Yields successive chunks of `chunk_rows` rows (the last possibly
/// shorter) until the slot is exhausted, then `None` forever. Cursors only
/// move forward; the merge phase holds one per live slot and discards each
/// as it dries up.
pub struct SlotCursor {
    slot: usize,
    reader: Box<dyn StorageReader>,
    chunk_rows: usize,
    row_bytes: usize,
    offset: u64,
}

impl std::fmt::Debug for SlotCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotCursor")
            .field("slot", &self.slot)
            .field("chunk_rows", &self.chunk_rows)
            .field("row_bytes", &self.row_bytes)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl SlotCursor {
    pub(crate) fn new(
        slot: usize,
        reader: Box<dyn StorageReader>,
        chunk_rows: usize,
        row_bytes: usize,
    ) -> Self {
        Self {
            slot,
            reader,
            chunk_rows,
            row_bytes,
            offset: 0,
        }
    }

    /// Pulls the next chunk, or `None` once the slot is exhausted.
    ///
    /// # Errors
    ///
    /// Returns a fatal `DatasetRead` error if the slot read fails.
    pub fn next_chunk(&mut self) -> Result<Option<Block>> {
        let remaining = self.reader.size().saturating_sub(self.offset);
        let remaining_rows = remaining / self.row_bytes as u64;
        if remaining_rows == 0 {
            return Ok(None);
        }

        let rows = (self.chunk_rows as u64).min(remaining_rows) as usize;
        let data = self.reader.read_range(self.offset, rows * self.row_bytes)?;

        self.offset += (rows * self.row_bytes) as u64;
        Ok(Some(Block::from_bytes(self.slot, self.row_bytes, data)))
    }

    /// Index of the slot this cursor reads.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.reader.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::scratch::ScratchScope;
    use crate::storage::{LocalStorage, StorageBackend};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn scope_with_slot(rows: &[u8], row_bytes: usize) -> (ScratchScope, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config).unwrap());
        let mut scope = ScratchScope::create(storage, &PathBuf::from("scratch")).unwrap();
        scope
            .write_block(0, &Block::from_bytes(0, row_bytes, rows.to_vec()))
            .unwrap();
        (scope, temp_dir)
    }

    #[test]
    fn test_yields_fixed_chunks_then_short_tail() {
        // 7 one-byte rows in chunks of 3: 3, 3, 1
        let (scope, _temp) = scope_with_slot(&[0, 1, 2, 3, 4, 5, 6], 1);
        let mut cursor = scope.cursor(0, 3, 1).unwrap();

        assert_eq!(cursor.next_chunk().unwrap().unwrap().rows(), 3);
        assert_eq!(cursor.next_chunk().unwrap().unwrap().rows(), 3);
        let tail = cursor.next_chunk().unwrap().unwrap();
        assert_eq!(tail.rows(), 1);
        assert_eq!(tail.as_bytes(), &[6]);
        assert!(cursor.next_chunk().unwrap().is_none());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_preserves_row_order() {
        let (scope, _temp) = scope_with_slot(&[0, 1, 2, 3, 4, 5], 2);
        let mut cursor = scope.cursor(0, 2, 2).unwrap();

        let mut all = Vec::new();
        while let Some(chunk) = cursor.next_chunk().unwrap() {
            all.extend_from_slice(chunk.as_bytes());
        }
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_exhausted_stays_none() {
        let (scope, _temp) = scope_with_slot(&[1, 2], 1);
        let mut cursor = scope.cursor(0, 8, 1).unwrap();

        assert!(cursor.next_chunk().unwrap().is_some());
        assert!(cursor.next_chunk().unwrap().is_none());
        assert!(cursor.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_chunk_blocks_carry_slot_index() {
        let (scope, _temp) = scope_with_slot(&[1, 2, 3], 1);
        let mut cursor = scope.cursor(0, 2, 1).unwrap();
        assert_eq!(cursor.slot(), 0);
        assert_eq!(cursor.next_chunk().unwrap().unwrap().index, 0);
    }
}

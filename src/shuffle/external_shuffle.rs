// src/shuffle/external_shuffle.rs

//! Two-phase external shuffle.
//!
//! Phase 1 streams the dataset block by block, shuffles each block in
//! place, and persists it to a scratch slot. Phase 2 round-robins small
//! chunks from every slot, reshuffles each combined buffer, and appends it
//! to the output. Peak resident memory stays at roughly one block in both
//! phases; mixing chunks across originally-distant blocks is what pushes
//! the result beyond per-block randomness.

use rand::Rng;
use tracing::debug;

use crate::block::{Block, BlockReader, BlockWriter};
use crate::error::Result;
use crate::layout::BlockPlan;
use crate::scratch::ScratchScope;

/// Runs the external shuffle, returning the number of rows emitted.
///
/// Every cursor either yields a chunk or leaves the active set each round,
/// so the merge loop terminates; cursors are drained to exhaustion, so
/// short trailing chunks of unevenly divided datasets flow through rather
/// than being dropped.
pub(crate) fn external_shuffle<R: Rng>(
    reader: &mut BlockReader,
    writer: &mut BlockWriter,
    scope: &mut ScratchScope,
    plan: &BlockPlan,
    rng: &mut R,
) -> Result<u64> {
    let mut cursors = Vec::with_capacity(plan.num_blocks);
    let mut row_bytes = 0;

    // Phase 1: local randomize + persist
    while let Some(mut block) = reader.next_block()? {
        row_bytes = block.row_bytes();
        block.shuffle_rows(rng);
        scope.write_block(block.index, &block)?;
        cursors.push(scope.cursor(block.index, plan.chunk_rows, row_bytes)?);
    }
    debug!(
        blocks = cursors.len(),
        chunk_rows = plan.chunk_rows,
        "phase 1 complete, all blocks persisted to scratch"
    );

    // Phase 2: round-robin merge + re-randomize + emit
    let mut rows_out = 0u64;
    let mut round = 0usize;
    while !cursors.is_empty() {
        let mut combined = Block::with_capacity(round, row_bytes, plan.samples_per_block);
        let mut survivors = Vec::with_capacity(cursors.len());

        for mut cursor in cursors {
            match cursor.next_chunk()? {
                Some(chunk) => {
                    combined.append_rows(chunk.as_bytes());
                    survivors.push(cursor);
                }
                // Exhausted cursors contribute nothing and are discarded.
                None => {}
            }
        }
        cursors = survivors;

        if !combined.is_empty() {
            combined.shuffle_rows(rng);
            rows_out += combined.rows() as u64;
            writer.write(&combined)?;
        }
        round += 1;
    }
    debug!(rounds = round, rows = rows_out, "phase 2 complete");

    Ok(rows_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::storage::{LocalStorage, StorageBackend};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::{Read, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_storage() -> (Arc<dyn StorageBackend>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        (Arc::new(LocalStorage::new(&config).unwrap()), temp_dir)
    }

    /// Writes `n` samples of `row_bytes` bytes; sample i is filled with
    /// the little-endian bytes of i so every row is distinct.
    fn write_dataset(storage: &Arc<dyn StorageBackend>, path: &str, n: u64, row_bytes: usize) {
        let mut writer = storage.open_write(Path::new(path)).unwrap();
        for i in 0..n {
            let mut row = vec![0u8; row_bytes];
            row[..8].copy_from_slice(&i.to_le_bytes());
            writer.write_all(&row).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_sample_ids(storage: &Arc<dyn StorageBackend>, path: &str, row_bytes: usize) -> Vec<u64> {
        let mut reader = storage.open_read(Path::new(path)).unwrap();
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        assert_eq!(data.len() % row_bytes, 0);
        data.chunks(row_bytes)
            .map(|row| u64::from_le_bytes(row[..8].try_into().unwrap()))
            .collect()
    }

    fn run_shuffle(
        storage: &Arc<dyn StorageBackend>,
        n: u64,
        row_bytes: usize,
        samples_per_block: usize,
        seed: u64,
    ) -> u64 {
        let plan = BlockPlan::for_dataset(n, samples_per_block);
        let mut reader = BlockReader::new(
            storage.clone(),
            PathBuf::from("train.bin"),
            row_bytes,
            samples_per_block,
            n,
        )
        .unwrap();
        let mut writer = BlockWriter::new(storage.clone(), PathBuf::from("out.bin"));
        let mut scope =
            ScratchScope::create(storage.clone(), &PathBuf::from("scratch")).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);

        let rows =
            external_shuffle(&mut reader, &mut writer, &mut scope, &plan, &mut rng).unwrap();
        writer.finish().unwrap();
        rows
    }

    #[test]
    fn test_permutation_scenario_a() {
        // n=100, B=25, 4 blocks, 32-byte float64 rows (d=3 plus label)
        let (storage, _temp) = test_storage();
        write_dataset(&storage, "train.bin", 100, 32);

        let rows = run_shuffle(&storage, 100, 32, 25, 7);
        assert_eq!(rows, 100);

        let mut ids = read_sample_ids(&storage, "out.bin", 32);
        assert_eq!(ids.len(), 100);
        ids.sort_unstable();
        assert_eq!(ids, (0..100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_single_block_scenario_b() {
        // n=10, B=10: one cursor, one merge round
        let (storage, _temp) = test_storage();
        write_dataset(&storage, "train.bin", 10, 8);

        let rows = run_shuffle(&storage, 10, 8, 10, 3);
        assert_eq!(rows, 10);

        let mut ids = read_sample_ids(&storage, "out.bin", 8);
        ids.sort_unstable();
        assert_eq!(ids, (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_permutation_uneven_division() {
        // Neither n % B == 0 nor B % num_blocks == 0: the remainder policy
        // must still deliver every sample exactly once.
        let (storage, _temp) = test_storage();
        write_dataset(&storage, "train.bin", 103, 16);

        let rows = run_shuffle(&storage, 103, 16, 25, 11);
        assert_eq!(rows, 103);

        let mut ids = read_sample_ids(&storage, "out.bin", 16);
        assert_eq!(ids.len(), 103);
        ids.sort_unstable();
        assert_eq!(ids, (0..103).collect::<Vec<u64>>());
    }

    #[test]
    fn test_output_length_equals_input_length() {
        let (storage, _temp) = test_storage();
        write_dataset(&storage, "train.bin", 60, 24);

        run_shuffle(&storage, 60, 24, 16, 5);

        let in_size = storage.metadata(Path::new("train.bin")).unwrap().size;
        let out_size = storage.metadata(Path::new("out.bin")).unwrap().size;
        assert_eq!(in_size, out_size);
    }

    #[test]
    fn test_deterministic_under_seed() {
        let (storage, _temp) = test_storage();
        write_dataset(&storage, "train.bin", 50, 8);

        run_shuffle(&storage, 50, 8, 10, 99);
        let first = read_sample_ids(&storage, "out.bin", 8);

        run_shuffle(&storage, 50, 8, 10, 99);
        let second = read_sample_ids(&storage, "out.bin", 8);

        assert_eq!(first, second);
    }

    #[test]
    fn test_order_actually_changes() {
        let (storage, _temp) = test_storage();
        write_dataset(&storage, "train.bin", 100, 8);

        run_shuffle(&storage, 100, 8, 25, 7);
        let ids = read_sample_ids(&storage, "out.bin", 8);

        // Identity output from 100 samples would mean the shuffle is a
        // pass-through.
        assert_ne!(ids, (0..100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_mixes_across_blocks() {
        // With 4 blocks of 25, a merge round combines chunks from every
        // block, so some output block must contain samples whose source
        // blocks differ.
        let (storage, _temp) = test_storage();
        write_dataset(&storage, "train.bin", 100, 8);

        run_shuffle(&storage, 100, 8, 25, 13);
        let ids = read_sample_ids(&storage, "out.bin", 8);

        let first_quarter = &ids[..25];
        let distinct_sources: std::collections::HashSet<u64> =
            first_quarter.iter().map(|id| id / 25).collect();
        assert!(
            distinct_sources.len() > 1,
            "first output block drawn from a single source block"
        );
    }
}

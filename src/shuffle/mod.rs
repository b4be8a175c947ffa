// src/shuffle/mod.rs

//! Shuffle run orchestration.
//!
//! This module ties the components together: it turns a validated
//! configuration into a block plan, seeds the run RNG, dispatches to the
//! selected algorithm, and replaces the training file atomically once the
//! output is complete. Algorithms take advantage of spatial locality by
//! reading from and writing to disk sequentially wherever possible.
//!
//! # Example
//!
//! ```no_run
//! use samplesort::config::ShuffleConfig;
//! use samplesort::shuffle::ShuffleEngine;
//!
//! let mut config = ShuffleConfig::default();
//! config.data.train_path = "train.bin".into();
//! config.data.num_samples = 60000;
//! config.data.num_features = 784;
//! config.data.element_type = "uint8".to_string();
//!
//! let engine = ShuffleEngine::new(config).unwrap();
//! let rows = engine.run().unwrap();
//! assert_eq!(rows, 60000);
//!
//! // Downstream trainers stream the shuffled file with the same bound.
//! for block in engine.open_reader().unwrap() {
//!     let block = block.unwrap();
//!     // feed block to the trainer
//! }
//! ```

mod external_shuffle;
mod external_sort;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::block::{BlockReader, BlockWriter};
use crate::config::ShuffleConfig;
use crate::error::{Result, ShuffleError};
use crate::layout::{BlockPlan, SampleLayout};
use crate::scratch::ScratchScope;
use crate::storage::{LocalStorage, StorageBackend};

use external_shuffle::external_shuffle;
use external_sort::external_sort;

/// Shuffling algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Two-phase block shuffle with a round-robin merge.
    ExternalShuffle,
    /// Random-key external sort; reproducible from a fixed seed.
    ExternalSort,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExternalShuffle => "external_shuffle",
            Self::ExternalSort => "external_sort",
        }
    }
}

impl FromStr for Algorithm {
    type Err = ShuffleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "external_shuffle" => Ok(Self::ExternalShuffle),
            "external_sort" => Ok(Self::ExternalSort),
            other => Err(ShuffleError::invalid_algorithm(other)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the configuration and storage backend for shuffle runs.
///
/// A run reads the training file through the block reader, randomizes it
/// with the configured algorithm under the configured memory budget, and
/// replaces the file in place. Either the full permutation completes and
/// the training file is valid, or the run fails and the file is untouched;
/// there is no partial-success mode.
pub struct ShuffleEngine {
    config: ShuffleConfig,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for ShuffleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShuffleEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ShuffleEngine {
    /// Creates an engine backed by local storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid — including an
    /// unknown element type or algorithm name, surfaced here before any
    /// dataset I/O — or if the storage backend cannot be initialized.
    pub fn new(config: ShuffleConfig) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        Ok(Self { config, storage })
    }

    /// Creates an engine over an externally supplied storage backend.
    pub fn with_storage(config: ShuffleConfig, storage: Arc<dyn StorageBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, storage })
    }

    /// Runs the configured algorithm and replaces the training file with
    /// its shuffled permutation. Returns the number of rows written.
    ///
    /// The output is produced at a temporary path and renamed over the
    /// training file only after a successful flush-and-sync, so a failed
    /// run never leaves a valid-looking partial output. Scratch slots are
    /// released on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of the run: `DatasetRead`,
    /// `DatasetWrite`, or `SlotNotFound`. None are retried.
    pub fn run(&self) -> Result<u64> {
        let algorithm = self.config.algorithm()?;
        let layout = self.layout()?;
        let plan = self.plan(&layout)?;

        info!(
            algorithm = %algorithm,
            samples = self.config.data.num_samples,
            samples_per_block = plan.samples_per_block,
            num_blocks = plan.num_blocks,
            "starting shuffle run"
        );

        let tmp_path = temp_output_path(&self.config.data.train_path);
        match self.run_to(algorithm, &layout, &plan, &tmp_path) {
            Ok(rows) => {
                self.storage.rename(&tmp_path, &self.config.data.train_path)?;
                info!(rows, "shuffle run complete");
                Ok(rows)
            }
            Err(e) => {
                // A partial output is invalid; discard it. The original
                // training file has not been touched.
                if self.storage.exists(&tmp_path).unwrap_or(false) {
                    if let Err(del) = self.storage.delete(&tmp_path) {
                        warn!(error = %del, "failed to remove partial output");
                    }
                }
                Err(e)
            }
        }
    }

    /// Opens a block reader over the training file, bounded to the same
    /// memory budget as the shuffle itself.
    ///
    /// This is the handoff contract for downstream trainers: they stream
    /// the shuffled file exclusively through this reader.
    pub fn open_reader(&self) -> Result<BlockReader> {
        let layout = self.layout()?;
        let plan = self.plan(&layout)?;
        BlockReader::new(
            self.storage.clone(),
            self.config.data.train_path.clone(),
            layout.row_bytes(),
            plan.samples_per_block,
            self.config.data.num_samples,
        )
    }

    pub fn config(&self) -> &ShuffleConfig {
        &self.config
    }

    fn layout(&self) -> Result<SampleLayout> {
        Ok(SampleLayout::new(
            self.config.element_type()?,
            self.config.data.num_features,
        ))
    }

    fn plan(&self, layout: &SampleLayout) -> Result<BlockPlan> {
        let samples_per_block = layout.samples_per_block(
            self.config.shuffle.buffer_mb,
            self.config.data.num_samples,
        )?;
        Ok(BlockPlan::for_dataset(
            self.config.data.num_samples,
            samples_per_block,
        ))
    }

    fn run_to(
        &self,
        algorithm: Algorithm,
        layout: &SampleLayout,
        plan: &BlockPlan,
        tmp_path: &Path,
    ) -> Result<u64> {
        let mut rng = match self.config.shuffle.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut reader = BlockReader::new(
            self.storage.clone(),
            self.config.data.train_path.clone(),
            layout.row_bytes(),
            plan.samples_per_block,
            self.config.data.num_samples,
        )?;
        let mut writer = BlockWriter::new(self.storage.clone(), tmp_path.to_path_buf());
        let mut scope =
            ScratchScope::create(self.storage.clone(), &self.config.shuffle.scratch_dir)?;

        let rows = match algorithm {
            Algorithm::ExternalShuffle => {
                external_shuffle(&mut reader, &mut writer, &mut scope, plan, &mut rng)?
            }
            Algorithm::ExternalSort => {
                external_sort(&mut reader, &mut writer, &mut scope, plan, &mut rng)?
            }
        };
        writer.finish()?;
        Ok(rows)
        // `scope` drops here, releasing every scratch slot whether the run
        // succeeded or an error propagated above.
    }
}

/// Invokes the configured shuffling algorithm on the training file.
pub fn shuffle_train(config: &ShuffleConfig) -> Result<u64> {
    ShuffleEngine::new(config.clone())?.run()
}

fn temp_output_path(train_path: &Path) -> PathBuf {
    let mut name = train_path.as_os_str().to_os_string();
    name.push(".shuffled.tmp");
    PathBuf::from(name)
}

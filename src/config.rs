// src/config.rs

//! Configuration for shuffle runs.
//!
//! Configuration is parsed from TOML, overridable through `SSORT_`-prefixed
//! environment variables, and validated before any I/O starts. The values
//! here normally arrive from a CLI layer; that layer is external to this
//! crate.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, ShuffleError};
use crate::layout::ElementType;
use crate::shuffle::Algorithm;

// Top-level shuffle configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleConfig {
    pub data: DataConfig,
    pub shuffle: ShuffleOptions,
    pub storage: StorageConfig,
}

// Dataset geometry and location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    // Path to the training data binary; shuffling replaces it in place.
    pub train_path: PathBuf,
    // Element type identifier: "uint8", "int32", "int64", "float32", "float64".
    pub element_type: String,
    // Total number of samples in the file.
    pub num_samples: u64,
    // Features per sample, excluding the trailing label.
    pub num_features: usize,
}

// Shuffle algorithm selection and memory budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleOptions {
    // Shuffling algorithm: "external_shuffle" or "external_sort".
    pub algorithm: String,
    // Memory budget in megabytes for one resident block.
    pub buffer_mb: f64,
    // Optional seed for reproducible runs.
    pub seed: Option<u64>,
    // Directory holding per-run scratch slots.
    pub scratch_dir: PathBuf,
}

// Storage backend options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path for all storage operations.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O for reads.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("data/train"),
            element_type: "float64".to_string(),
            num_samples: 0,
            num_features: 0,
        }
    }
}

impl Default for ShuffleOptions {
    fn default() -> Self {
        Self {
            algorithm: "external_shuffle".to_string(),
            buffer_mb: 10.0,
            seed: None,
            scratch_dir: PathBuf::from("scratch"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl FromStr for ShuffleConfig {
    type Err = ShuffleError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| ShuffleError::config_with_source("failed to parse TOML config", e))
    }
}

impl ShuffleConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShuffleError::read_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `SSORT_` and use underscores to separate
    // nested fields, e.g. `SSORT_DATA_TRAIN_PATH` overrides
    // `data.train_path` and `SSORT_SHUFFLE_ALGORITHM` overrides
    // `shuffle.algorithm`. Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Data overrides
        if let Ok(val) = std::env::var("SSORT_DATA_TRAIN_PATH") {
            self.data.train_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SSORT_DATA_ELEMENT_TYPE") {
            self.data.element_type = val;
        }
        if let Ok(val) = std::env::var("SSORT_DATA_NUM_SAMPLES") {
            if let Ok(v) = val.parse() {
                self.data.num_samples = v;
            }
        }
        if let Ok(val) = std::env::var("SSORT_DATA_NUM_FEATURES") {
            if let Ok(v) = val.parse() {
                self.data.num_features = v;
            }
        }

        // Shuffle overrides
        if let Ok(val) = std::env::var("SSORT_SHUFFLE_ALGORITHM") {
            self.shuffle.algorithm = val;
        }
        if let Ok(val) = std::env::var("SSORT_SHUFFLE_BUFFER_MB") {
            if let Ok(v) = val.parse() {
                self.shuffle.buffer_mb = v;
            }
        }
        if let Ok(val) = std::env::var("SSORT_SHUFFLE_SEED") {
            if let Ok(v) = val.parse() {
                self.shuffle.seed = Some(v);
            }
        }
        if let Ok(val) = std::env::var("SSORT_SHUFFLE_SCRATCH_DIR") {
            self.shuffle.scratch_dir = PathBuf::from(val);
        }

        // Storage overrides
        if let Ok(val) = std::env::var("SSORT_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SSORT_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("SSORT_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("SSORT_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // Runs entirely before any I/O, so an unknown element type or algorithm
    // name fails the run up front.
    //
    // # Errors
    //
    // Returns `UnsupportedType`, `InvalidAlgorithm`, or `Config` depending
    // on which value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Fail on unknown identifiers first: these are caller mistakes the
        // taxonomy names explicitly.
        self.data.element_type.parse::<ElementType>()?;
        self.shuffle.algorithm.parse::<Algorithm>()?;

        if self.data.num_samples == 0 {
            return Err(ShuffleError::config(
                "data.num_samples must be greater than 0",
            ));
        }
        if self.data.num_features == 0 {
            return Err(ShuffleError::config(
                "data.num_features must be greater than 0",
            ));
        }
        if self.data.train_path.as_os_str().is_empty() {
            return Err(ShuffleError::config("data.train_path must not be empty"));
        }

        if self.shuffle.buffer_mb <= 0.0 {
            return Err(ShuffleError::config(
                "shuffle.buffer_mb must be greater than 0",
            ));
        }

        if self.storage.buffer_size == 0 {
            return Err(ShuffleError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        Ok(())
    }

    /// The configured element type.
    ///
    /// Only valid after `validate()`; an unknown identifier errors here too.
    pub fn element_type(&self) -> Result<ElementType> {
        self.data.element_type.parse()
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> Result<Algorithm> {
        self.shuffle.algorithm.parse()
    }
}

// src/storage/mod.rs

//! Storage abstraction for the shuffle engine.
//!
//! Every byte the engine moves — dataset blocks, scratch slots, the final
//! shuffled output — goes through the traits defined here, so the algorithms
//! never touch the filesystem directly. `LocalStorage` is the production
//! backend; tests substitute mock backends to inject read and write
//! failures at precise points.
//!
//! # Example
//!
//! ```no_run
//! use samplesort::config::StorageConfig;
//! use samplesort::storage::{LocalStorage, StorageBackend};
//! use std::io::{Read, Write};
//! use std::path::Path;
//!
//! let config = StorageConfig::default();
//! let storage = LocalStorage::new(&config).unwrap();
//!
//! let mut writer = storage.open_write(Path::new("train.bin")).unwrap();
//! writer.write_all(&[0u8; 32]).unwrap();
//! writer.finish().unwrap();
//!
//! let mut reader = storage.open_read(Path::new("train.bin")).unwrap();
//! let mut content = Vec::new();
//! reader.read_to_end(&mut content).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};

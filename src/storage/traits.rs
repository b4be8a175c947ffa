// src/storage/traits.rs

//! Storage traits shared by the block reader/writer and the scratch scope.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::Result;

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// Whether this object is a directory.
    pub is_dir: bool,
}

/// A handle for reading from storage.
///
/// Extends `Read` and `Seek` with ranged reads; the block reader and slot
/// cursors only ever move forward, but `read_range` lets them express that
/// as absolute offsets.
pub trait StorageReader: Read + Seek + Send {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;

    /// Reads exactly `length` bytes starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns a `DatasetRead` error if the read fails or the range extends
    /// past the end of the object.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;
}

/// A handle for writing to storage.
///
/// All writes are appends in call order. `finish` must be called to persist
/// the data; dropping a writer without finishing leaves the target in an
/// undefined, invalid state.
pub trait StorageWriter: Write + Send {
    /// Finishes the write, flushing and syncing all data.
    ///
    /// # Errors
    ///
    /// Returns a `DatasetWrite` error if flushing or syncing fails.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The storage backend trait.
///
/// Object-safe, so the engine can hold `Arc<dyn StorageBackend>` and tests
/// can swap in failure-injecting backends.
pub trait StorageBackend: Send + Sync {
    /// Checks whether an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or metadata cannot be
    /// read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Opens an object for reading.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Opens an object for writing, truncating any existing content.
    ///
    /// Parent directories are created if they don't exist.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Deletes a file, or a directory and everything under it.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Renames an object, replacing any existing object at `to`.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Creates a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}

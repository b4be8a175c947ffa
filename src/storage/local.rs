// src/storage/local.rs

//! Local filesystem storage backend.
//!
//! Dataset files are read either through buffered I/O or, above a
//! configurable size threshold, through memory mapping — shuffle runs read
//! every input byte exactly once, sequentially, and mmap keeps that path
//! cheap for multi-gigabyte training files.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};
use crate::config::StorageConfig;
use crate::error::{Result, ShuffleError};

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Base path for all storage operations.
    base_path: PathBuf,
    /// Buffer size for buffered I/O operations.
    buffer_size: usize,
    /// Whether to use memory-mapped I/O for reads.
    use_mmap: bool,
    /// File size threshold above which to use mmap.
    mmap_threshold: u64,
}

impl LocalStorage {
    /// Creates a new `LocalStorage` instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base path cannot be created.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = config.base_path.clone();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                ShuffleError::write_with_source(&base_path, "failed to create base directory", e)
            })?;
        }

        Ok(Self {
            base_path,
            buffer_size: config.buffer_size,
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        })
    }

    /// Resolves a path relative to the base path.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        let full_path = self.resolve_path(path);
        Ok(full_path.exists())
    }

    fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
        let full_path = self.resolve_path(path);
        let meta = fs::metadata(&full_path).map_err(|e| {
            ShuffleError::read_with_source(&full_path, "failed to read metadata", e)
        })?;

        Ok(ObjectMeta {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path)
            .map_err(|e| ShuffleError::read_with_source(&full_path, "failed to open file", e))?;

        let meta = file.metadata().map_err(|e| {
            ShuffleError::read_with_source(&full_path, "failed to read file metadata", e)
        })?;
        let size = meta.len();

        if self.use_mmap && size >= self.mmap_threshold {
            // SAFETY: the file is opened read-only and the Mmap lives as
            // long as the reader that owns it.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                ShuffleError::read_with_source(&full_path, "failed to memory-map file", e)
            })?;

            Ok(Box::new(MmapReader::new(full_path, mmap)))
        } else {
            Ok(Box::new(LocalReader::new(
                full_path,
                file,
                size,
                self.buffer_size,
            )))
        }
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full_path = self.resolve_path(path);

        if let Some(parent) = full_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    ShuffleError::write_with_source(
                        parent,
                        "failed to create parent directories",
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .map_err(|e| {
                ShuffleError::write_with_source(&full_path, "failed to create file", e)
            })?;

        Ok(Box::new(LocalWriter::new(full_path, file, self.buffer_size)))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);

        if full_path.is_dir() {
            fs::remove_dir_all(&full_path).map_err(|e| {
                ShuffleError::write_with_source(&full_path, "failed to delete directory", e)
            })
        } else {
            fs::remove_file(&full_path).map_err(|e| {
                ShuffleError::write_with_source(&full_path, "failed to delete file", e)
            })
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.resolve_path(from);
        let to_path = self.resolve_path(to);

        if let Some(parent) = to_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    ShuffleError::write_with_source(
                        parent,
                        "failed to create parent directories",
                        e,
                    )
                })?;
            }
        }

        fs::rename(&from_path, &to_path).map_err(|e| {
            ShuffleError::write_with_source(
                &from_path,
                format!("failed to rename to {}", to_path.display()),
                e,
            )
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path).map_err(|e| {
            ShuffleError::write_with_source(&full_path, "failed to create directories", e)
        })
    }
}

/// Buffered file reader for local storage.
struct LocalReader {
    path: PathBuf,
    reader: BufReader<File>,
    size: u64,
}

impl LocalReader {
    fn new(path: PathBuf, file: File, size: u64, buffer_size: usize) -> Self {
        Self {
            path,
            reader: BufReader::with_capacity(buffer_size, file),
            size,
        }
    }
}

impl Read for LocalReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for LocalReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageReader for LocalReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(start)).map_err(|e| {
            ShuffleError::read_with_source(
                &self.path,
                format!("failed to seek to position {start}"),
                e,
            )
        })?;

        let mut buf = vec![0u8; length];
        self.read_exact(&mut buf).map_err(|e| {
            ShuffleError::read_with_source(
                &self.path,
                format!("failed to read {length} bytes at position {start}"),
                e,
            )
        })?;

        Ok(buf)
    }
}

/// Memory-mapped file reader for local storage.
struct MmapReader {
    path: PathBuf,
    mmap: Mmap,
    position: u64,
}

impl MmapReader {
    fn new(path: PathBuf, mmap: Mmap) -> Self {
        Self {
            path,
            mmap,
            position: 0,
        }
    }
}

impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let pos = self.position as usize;
        if pos >= self.mmap.len() {
            return Ok(0);
        }

        let remaining = &self.mmap[pos..];
        let to_read = buf.len().min(remaining.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position = (pos + to_read) as u64;
        Ok(to_read)
    }
}

impl Seek for MmapReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.mmap.len() as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek to negative position",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

impl StorageReader for MmapReader {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let start = start as usize;
        let end = start + length;

        if end > self.mmap.len() {
            return Err(ShuffleError::read(
                &self.path,
                format!(
                    "read range {}..{} exceeds file size {}",
                    start,
                    end,
                    self.mmap.len()
                ),
            ));
        }

        Ok(self.mmap[start..end].to_vec())
    }
}

/// Buffered file writer for local storage.
struct LocalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LocalWriter {
    fn new(path: PathBuf, file: File, buffer_size: usize) -> Self {
        Self {
            path,
            writer: BufWriter::with_capacity(buffer_size, file),
        }
    }
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageWriter for LocalWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush().map_err(|e| {
            ShuffleError::write_with_source(&self.path, "failed to flush writer", e)
        })?;

        // Sync to disk
        self.writer.get_ref().sync_all().map_err(|e| {
            ShuffleError::write_with_source(&self.path, "failed to sync file to disk", e)
        })
    }
}

// src/block/mod.rs

//! Fixed-width sample blocks and their sequential reader/writer.
//!
//! A block is the unit of I/O and of memory accounting: `rows` consecutive
//! samples, each `row_bytes` wide, in one contiguous buffer. The shuffle
//! algorithms only ever permute whole rows, so blocks carry raw bytes and
//! never decode element values.

mod reader;
mod writer;

pub use reader::BlockReader;
pub use writer::BlockWriter;

use rand::Rng;

/// An in-memory block of consecutive fixed-width samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Position of this block in its source sequence.
    pub index: usize,
    row_bytes: usize,
    data: Vec<u8>,
}

impl Block {
    /// Wraps a row-aligned byte buffer.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not a whole number of rows; block producers
    /// always read row-aligned ranges, so a misaligned buffer is a logic
    /// bug, not a runtime condition.
    pub fn from_bytes(index: usize, row_bytes: usize, data: Vec<u8>) -> Self {
        assert!(row_bytes > 0, "row_bytes must be positive");
        assert_eq!(
            data.len() % row_bytes,
            0,
            "block buffer must be row-aligned"
        );
        Self {
            index,
            row_bytes,
            data,
        }
    }

    /// Creates an empty block that can hold `rows` samples without
    /// reallocating.
    pub fn with_capacity(index: usize, row_bytes: usize, rows: usize) -> Self {
        assert!(row_bytes > 0, "row_bytes must be positive");
        Self {
            index,
            row_bytes,
            data: Vec::with_capacity(rows * row_bytes),
        }
    }

    pub fn rows(&self) -> usize {
        self.data.len() / self.row_bytes
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows row `i`.
    pub fn row(&self, i: usize) -> &[u8] {
        let start = i * self.row_bytes;
        &self.data[start..start + self.row_bytes]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Appends row-aligned bytes to the end of the block.
    pub fn append_rows(&mut self, rows: &[u8]) {
        debug_assert_eq!(rows.len() % self.row_bytes, 0);
        self.data.extend_from_slice(rows);
    }

    /// Permutes the rows uniformly at random, in place.
    ///
    /// Fisher-Yates over whole rows; the generator is caller-supplied so a
    /// seeded run is reproducible.
    pub fn shuffle_rows<R: Rng>(&mut self, rng: &mut R) {
        let rows = self.rows();
        if rows < 2 {
            return;
        }

        let rb = self.row_bytes;
        let mut tmp = vec![0u8; rb];
        for i in (1..rows).rev() {
            let j = rng.gen_range(0..=i);
            if i == j {
                continue;
            }
            let (a, b) = (i * rb, j * rb);
            tmp.copy_from_slice(&self.data[a..a + rb]);
            self.data.copy_within(b..b + rb, a);
            self.data[b..b + rb].copy_from_slice(&tmp);
        }
    }
}

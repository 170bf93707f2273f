//! Chunk storage.
//!
//! A grid is tiled into chunks, each holding the values of a
//! `chunk_nrows x chunk_ncols` block of cells (smaller for the final row and
//! column of chunks). Two representations exist:
//! - [`DenseChunk`]: a fill value plus, once any cell diverges, a full
//!   row-major array
//! - [`SparseChunk`]: a default value plus buckets of cells holding other
//!   values
//!
//! Both answer the same queries, and [`Chunk::convert_to`] switches between
//! them without changing any cell value.

mod dense;
mod sparse;

pub use dense::DenseChunk;
pub use sparse::SparseChunk;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::value::GridValue;

/// Representation of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Dense,
    Sparse,
}

/// How a grid chooses chunk representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkPolicy {
    /// Always dense.
    #[default]
    Dense,
    /// Always sparse.
    Sparse,
    /// Start sparse, switch a chunk to dense once its sparse encoding is
    /// larger than a dense array would be.
    Adaptive,
}

impl ChunkPolicy {
    /// Representation of a freshly created chunk.
    pub fn initial_kind(self) -> ChunkKind {
        match self {
            ChunkPolicy::Dense => ChunkKind::Dense,
            ChunkPolicy::Sparse | ChunkPolicy::Adaptive => ChunkKind::Sparse,
        }
    }
}

impl fmt::Display for ChunkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkPolicy::Dense => "dense",
            ChunkPolicy::Sparse => "sparse",
            ChunkPolicy::Adaptive => "adaptive",
        };
        f.write_str(name)
    }
}

impl FromStr for ChunkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dense" => Ok(ChunkPolicy::Dense),
            "sparse" => Ok(ChunkPolicy::Sparse),
            "adaptive" => Ok(ChunkPolicy::Adaptive),
            other => Err(format!("unknown chunk policy: {}", other)),
        }
    }
}

/// A chunk in either representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase", bound = "")]
pub enum Chunk<T: GridValue> {
    Dense(DenseChunk<T>),
    Sparse(SparseChunk<T>),
}

impl<T: GridValue> Chunk<T> {
    /// A chunk with every cell set to `fill`.
    pub fn uniform(kind: ChunkKind, nrows: usize, ncols: usize, fill: T) -> Self {
        match kind {
            ChunkKind::Dense => Chunk::Dense(DenseChunk::uniform(nrows, ncols, fill)),
            ChunkKind::Sparse => Chunk::Sparse(SparseChunk::new(nrows, ncols, fill)),
        }
    }

    /// Build from row-major values.
    pub fn from_values(kind: ChunkKind, nrows: usize, ncols: usize, values: Vec<T>) -> Self {
        let dense = DenseChunk::from_values(nrows, ncols, values);
        match kind {
            ChunkKind::Dense => Chunk::Dense(dense),
            ChunkKind::Sparse => Chunk::Sparse(SparseChunk::from_dense(&dense)),
        }
    }

    pub fn kind(&self) -> ChunkKind {
        match self {
            Chunk::Dense(_) => ChunkKind::Dense,
            Chunk::Sparse(_) => ChunkKind::Sparse,
        }
    }

    pub fn nrows(&self) -> usize {
        match self {
            Chunk::Dense(c) => c.nrows(),
            Chunk::Sparse(c) => c.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Chunk::Dense(c) => c.ncols(),
            Chunk::Sparse(c) => c.ncols(),
        }
    }

    /// Whether every cell holds the same value.
    pub fn is_uniform(&self) -> bool {
        match self {
            Chunk::Dense(c) => c.is_uniform(),
            Chunk::Sparse(c) => c.is_uniform(),
        }
    }

    /// The shared value of a uniform chunk.
    pub fn uniform_value(&self) -> Option<T> {
        match self {
            Chunk::Dense(c) if c.is_uniform() => Some(c.fill()),
            Chunk::Sparse(c) if c.is_uniform() => Some(c.default_value()),
            _ => None,
        }
    }

    /// # Panics
    ///
    /// Panics if the position is outside the chunk.
    pub fn get_cell(&self, cell_row: usize, cell_col: usize) -> T {
        match self {
            Chunk::Dense(c) => c.get_cell(cell_row, cell_col),
            Chunk::Sparse(c) => c.get_cell(cell_row, cell_col),
        }
    }

    /// Write a cell, returning its previous value.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the chunk.
    pub fn set_cell(&mut self, cell_row: usize, cell_col: usize, value: T) -> T {
        match self {
            Chunk::Dense(c) => c.set_cell(cell_row, cell_col, value),
            Chunk::Sparse(c) => c.set_cell(cell_row, cell_col, value),
        }
    }

    /// Write a cell as a grid does, returning its previous value.
    ///
    /// A uniform chunk about to hold a second distinct value is first
    /// re-encoded in the representation `policy` starts chunks in; under
    /// the adaptive policy the chunk may afterwards be promoted to dense.
    pub fn write(&mut self, cell_row: usize, cell_col: usize, value: T, policy: ChunkPolicy) -> T {
        if self.uniform_value().is_some_and(|fill| fill != value) {
            self.convert_in_place(policy.initial_kind());
        }
        let previous = self.set_cell(cell_row, cell_col, value);
        if policy == ChunkPolicy::Adaptive {
            let chunk = self.take();
            *self = chunk.apply_policy(policy);
        }
        previous
    }

    pub fn convert_in_place(&mut self, kind: ChunkKind) {
        if self.kind() != kind {
            let chunk = self.take();
            *self = chunk.convert_to(kind);
        }
    }

    /// Move the content out, leaving a uniform placeholder of the same size.
    fn take(&mut self) -> Self {
        let fill = self.get_cell(0, 0);
        let placeholder = Chunk::uniform(ChunkKind::Dense, self.nrows(), self.ncols(), fill);
        std::mem::replace(self, placeholder)
    }

    /// Write a cell during bulk loading.
    pub fn init_cell(&mut self, cell_row: usize, cell_col: usize, value: T) {
        match self {
            Chunk::Dense(c) => c.init_cell(cell_row, cell_col, value),
            Chunk::Sparse(c) => c.init_cell(cell_row, cell_col, value),
        }
    }

    /// Bytes owned by the chunk beyond its fixed-size header.
    pub fn heap_bytes(&self) -> usize {
        match self {
            Chunk::Dense(c) => c.heap_bytes(),
            Chunk::Sparse(c) => c.heap_bytes(),
        }
    }

    /// Bytes a materialised dense array of this chunk occupies.
    pub fn dense_bytes(&self) -> usize {
        self.nrows() * self.ncols() * std::mem::size_of::<T>()
    }

    /// Estimated resident size, used for memory accounting.
    pub fn memory_estimate(&self) -> usize {
        std::mem::size_of::<Self>() + self.heap_bytes()
    }

    pub fn to_values(&self) -> Vec<T> {
        match self {
            Chunk::Dense(c) => c.to_values(),
            Chunk::Sparse(c) => c.to_values(),
        }
    }

    /// Calls `f(value, count)` over groups of cells that together cover the chunk.
    pub fn for_each_value(&self, f: impl FnMut(T, u64)) {
        match self {
            Chunk::Dense(c) => c.for_each_value(f),
            Chunk::Sparse(c) => c.for_each_value(f),
        }
    }

    /// Number of cells not holding `no_data`.
    pub fn n_data(&self, no_data: T) -> u64 {
        let mut n = 0;
        self.for_each_value(|value, count| {
            if value != no_data {
                n += count;
            }
        });
        n
    }

    /// Re-encode in another representation. Cell values are unchanged.
    pub fn convert_to(self, kind: ChunkKind) -> Self {
        match (self, kind) {
            (chunk @ Chunk::Dense(_), ChunkKind::Dense) => chunk,
            (chunk @ Chunk::Sparse(_), ChunkKind::Sparse) => chunk,
            (Chunk::Dense(c), ChunkKind::Sparse) => Chunk::Sparse(SparseChunk::from_dense(&c)),
            (Chunk::Sparse(c), ChunkKind::Dense) => {
                if c.is_uniform() {
                    Chunk::Dense(DenseChunk::uniform(c.nrows(), c.ncols(), c.default_value()))
                } else {
                    Chunk::Dense(DenseChunk::from_values(c.nrows(), c.ncols(), c.to_values()))
                }
            }
        }
    }

    /// Apply `policy` after a write. Returns the chunk, converted if the
    /// policy calls for it.
    pub fn apply_policy(self, policy: ChunkPolicy) -> Self {
        match policy {
            ChunkPolicy::Adaptive
                if self.kind() == ChunkKind::Sparse && self.heap_bytes() > self.dense_bytes() =>
            {
                self.convert_to(ChunkKind::Dense)
            }
            _ => self,
        }
    }
}

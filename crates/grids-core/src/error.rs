use std::path::PathBuf;

use thiserror::Error;

use crate::coords::{CellId, ChunkId};

/// Errors raised by grid, chunk cache and storage operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// Cell coordinates outside the grid for an operation that requires them inside.
    #[error("cell {0} is outside the grid")]
    OutOfBounds(CellId),

    /// Dimensions or chunk sizing that cannot describe a grid.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// No chunk could be evicted to satisfy a memory request.
    #[error("memory budget exhausted: {needed} bytes requested, {resident} resident of {budget}")]
    ResourceExhausted {
        needed: usize,
        resident: usize,
        budget: usize,
    },

    /// The grid handle does not belong to an arena in this cache.
    #[error("grid {0} is not open in this cache")]
    UnknownGrid(u64),

    /// The grid's arena holds a different scalar type than requested.
    #[error("grid {0} does not hold {1} values")]
    TypeMismatch(u64, &'static str),

    /// The chunk ID lies outside the grid's chunk layout.
    #[error("chunk {0} is not part of the grid")]
    UnknownChunk(ChunkId),

    /// A chunk file is missing for a chunk recorded as stored.
    #[error("chunk {chunk} has no backing file in {}", .dir.display())]
    MissingChunk { chunk: ChunkId, dir: PathBuf },

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A backing file or import stream is malformed.
    #[error("format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type GridResult<T> = Result<T, GridError>;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a chunk in chunk-grid space.
///
/// Ordering is row-major: chunks compare by `row` first, then `col`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub row: i32,
    pub col: i32,
}

impl ChunkId {
    pub const fn new(row: i32, col: i32) -> Self {
        ChunkId { row, col }
    }

    /// File name of this chunk inside a grid's backing directory.
    pub fn file_name(&self) -> String {
        format!("{}_{}", self.row, self.col)
    }

    /// Parse a name produced by [`ChunkId::file_name`].
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (row, col) = name.split_once('_')?;
        Some(ChunkId {
            row: row.parse().ok()?,
            col: col.parse().ok()?,
        })
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Position of a cell in cell-grid space.
///
/// Rows and columns span the whole grid and may be negative when a
/// coordinate lies below or left of the grid origin.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub row: i64,
    pub col: i64,
}

impl CellId {
    pub const fn new(row: i64, col: i64) -> Self {
        CellId { row, col }
    }

    /// Chebyshev (ring) distance between two cells.
    pub fn ring_distance(&self, other: &CellId) -> i64 {
        (self.row - other.row).abs().max((self.col - other.col).abs())
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_row_major_order() {
        let mut ids = vec![
            ChunkId::new(1, 0),
            ChunkId::new(0, 1),
            ChunkId::new(0, 0),
            ChunkId::new(-1, 5),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                ChunkId::new(-1, 5),
                ChunkId::new(0, 0),
                ChunkId::new(0, 1),
                ChunkId::new(1, 0),
            ]
        );
    }

    #[test]
    fn test_chunk_file_name() {
        let id = ChunkId::new(3, -2);
        assert_eq!(id.file_name(), "3_-2");
        assert_eq!(ChunkId::from_file_name("3_-2"), Some(id));
        assert_eq!(ChunkId::from_file_name("header.json"), None);
        assert_eq!(ChunkId::from_file_name("3_x"), None);
    }

    #[test]
    fn test_ring_distance() {
        let a = CellId::new(0, 0);
        assert_eq!(a.ring_distance(&CellId::new(3, -1)), 3);
        assert_eq!(a.ring_distance(&CellId::new(-2, 7)), 7);
        assert_eq!(a.ring_distance(&a), 0);
    }
}

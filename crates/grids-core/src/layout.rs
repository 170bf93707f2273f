//! Mapping between grid cells and chunk cells.
//!
//! Chunks are `chunk_nrows x chunk_ncols` tiles laid out row-major from the
//! grid origin. The final chunk row and column are truncated to fit the grid
//! exactly. All divisions are floor divisions, so negative rows and columns
//! map to negative chunk indices rather than collapsing onto chunk zero.

use serde::{Deserialize, Serialize};

use crate::coords::{CellId, ChunkId};
use crate::error::{GridError, GridResult};

/// Default chunk edge length in cells.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Chunk sizing of a grid with a fixed number of rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLayout {
    nrows: i64,
    ncols: i64,
    chunk_nrows: usize,
    chunk_ncols: usize,
}

impl ChunkLayout {
    pub fn new(nrows: i64, ncols: i64, chunk_nrows: usize, chunk_ncols: usize) -> GridResult<Self> {
        if nrows <= 0 || ncols <= 0 {
            return Err(GridError::InvalidDimensions(format!(
                "grid must have at least one row and column, got {}x{}",
                nrows, ncols
            )));
        }
        if chunk_nrows == 0 || chunk_ncols == 0 || chunk_nrows > i32::MAX as usize || chunk_ncols > i32::MAX as usize {
            return Err(GridError::InvalidDimensions(format!(
                "invalid chunk size {}x{}",
                chunk_nrows, chunk_ncols
            )));
        }
        let layout = Self {
            nrows,
            ncols,
            chunk_nrows,
            chunk_ncols,
        };
        if i64::from(layout.n_chunk_rows()) * (chunk_nrows as i64) < nrows
            || i64::from(layout.n_chunk_cols()) * (chunk_ncols as i64) < ncols
        {
            return Err(GridError::InvalidDimensions(
                "too many chunks for 32-bit chunk indices".to_string(),
            ));
        }
        Ok(layout)
    }

    pub fn nrows(&self) -> i64 {
        self.nrows
    }

    pub fn ncols(&self) -> i64 {
        self.ncols
    }

    /// Rows in a full chunk.
    pub fn chunk_nrows(&self) -> usize {
        self.chunk_nrows
    }

    /// Columns in a full chunk.
    pub fn chunk_ncols(&self) -> usize {
        self.chunk_ncols
    }

    pub fn n_chunk_rows(&self) -> i32 {
        let n = (self.nrows + self.chunk_nrows as i64 - 1) / self.chunk_nrows as i64;
        i32::try_from(n).unwrap_or(i32::MAX)
    }

    pub fn n_chunk_cols(&self) -> i32 {
        let n = (self.ncols + self.chunk_ncols as i64 - 1) / self.chunk_ncols as i64;
        i32::try_from(n).unwrap_or(i32::MAX)
    }

    pub fn n_chunks(&self) -> u64 {
        self.n_chunk_rows() as u64 * self.n_chunk_cols() as u64
    }

    /// Chunk row of grid row `row`, saturating at the `i32` range.
    pub fn chunk_row(&self, row: i64) -> i32 {
        saturate(row.div_euclid(self.chunk_nrows as i64))
    }

    /// Chunk column of grid column `col`, saturating at the `i32` range.
    pub fn chunk_col(&self, col: i64) -> i32 {
        saturate(col.div_euclid(self.chunk_ncols as i64))
    }

    /// Row of `row` within its chunk.
    pub fn cell_row(&self, row: i64) -> usize {
        row.rem_euclid(self.chunk_nrows as i64) as usize
    }

    /// Column of `col` within its chunk.
    pub fn cell_col(&self, col: i64) -> usize {
        col.rem_euclid(self.chunk_ncols as i64) as usize
    }

    /// Grid row of `cell_row` in chunk row `chunk_row`.
    pub fn row(&self, chunk_row: i32, cell_row: usize) -> i64 {
        i64::from(chunk_row) * self.chunk_nrows as i64 + cell_row as i64
    }

    /// Grid column of `cell_col` in chunk column `chunk_col`.
    pub fn col(&self, chunk_col: i32, cell_col: usize) -> i64 {
        i64::from(chunk_col) * self.chunk_ncols as i64 + cell_col as i64
    }

    pub fn chunk_id(&self, row: i64, col: i64) -> ChunkId {
        ChunkId::new(self.chunk_row(row), self.chunk_col(col))
    }

    /// Chunk and in-chunk position of a grid cell.
    pub fn locate(&self, row: i64, col: i64) -> (ChunkId, usize, usize) {
        (self.chunk_id(row, col), self.cell_row(row), self.cell_col(col))
    }

    pub fn cell_id(&self, chunk: ChunkId, cell_row: usize, cell_col: usize) -> CellId {
        CellId::new(self.row(chunk.row, cell_row), self.col(chunk.col, cell_col))
    }

    /// Rows in chunk row `chunk_row`; the final chunk row may be short.
    /// Chunk rows outside the grid have no rows.
    pub fn chunk_nrows_of(&self, chunk_row: i32) -> usize {
        let last = self.n_chunk_rows() - 1;
        if chunk_row < 0 || chunk_row > last {
            0
        } else if chunk_row == last {
            (self.nrows - self.row(last, 0)) as usize
        } else {
            self.chunk_nrows
        }
    }

    /// Columns in chunk column `chunk_col`; the final chunk column may be short.
    pub fn chunk_ncols_of(&self, chunk_col: i32) -> usize {
        let last = self.n_chunk_cols() - 1;
        if chunk_col < 0 || chunk_col > last {
            0
        } else if chunk_col == last {
            (self.ncols - self.col(last, 0)) as usize
        } else {
            self.chunk_ncols
        }
    }

    pub fn is_in_grid(&self, row: i64, col: i64) -> bool {
        row >= 0 && row < self.nrows && col >= 0 && col < self.ncols
    }

    pub fn is_chunk_in_grid(&self, chunk: ChunkId) -> bool {
        chunk.row >= 0 && chunk.row < self.n_chunk_rows() && chunk.col >= 0 && chunk.col < self.n_chunk_cols()
    }

    /// Whether a chunk-relative position names a cell inside the grid.
    pub fn is_chunk_cell_in_grid(&self, chunk: ChunkId, cell_row: usize, cell_col: usize) -> bool {
        self.is_in_grid(self.row(chunk.row, cell_row), self.col(chunk.col, cell_col))
    }

    /// All chunk IDs in row-major order.
    pub fn chunk_ids(&self) -> impl Iterator<Item = ChunkId> {
        let n_chunk_cols = self.n_chunk_cols();
        (0..self.n_chunk_rows())
            .flat_map(move |row| (0..n_chunk_cols).map(move |col| ChunkId::new(row, col)))
    }
}

fn saturate(index: i64) -> i32 {
    i32::try_from(index).unwrap_or(if index < 0 { i32::MIN } else { i32::MAX })
}

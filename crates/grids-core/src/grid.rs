use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use tracing::{debug, info};

use crate::cache::{ChunkCache, ChunkKey, GridId};
use crate::chunk::{Chunk, ChunkKind, ChunkPolicy};
use crate::coords::{CellId, ChunkId};
use crate::dimensions::{decimal, Dimensions};
use crate::error::{GridError, GridResult};
use crate::iter::CellIter;
use crate::layout::ChunkLayout;
use crate::stats::{Stats, StatsMode};
use crate::store::{GridDir, GridHeader};
use crate::value::GridValue;

/// A chunked raster of `T` values backed by a directory on disk.
///
/// The grid itself holds geometry and statistics only. Chunk data lives in
/// the [`ChunkCache`] it was registered with, which every cell operation
/// takes as an argument.
///
/// A grid must be finished with [`Grid::close`] or [`Grid::delete`].
/// Dropping the handle leaves its chunks in the cache until the cache
/// itself is dropped; [`ChunkCache::close`] with [`Grid::id`] releases them
/// when only the id is at hand.
#[derive(Debug)]
pub struct Grid<T: GridValue> {
    id: GridId,
    layout: ChunkLayout,
    dimensions: Dimensions,
    no_data: T,
    policy: ChunkPolicy,
    stats: Stats<T>,
}

impl<T: GridValue> Grid<T> {
    /// Register a new grid whose cells are all `no_data`.
    pub(crate) fn create_in(
        cache: &mut ChunkCache,
        dir: GridDir,
        layout: ChunkLayout,
        dimensions: Dimensions,
        no_data: T,
        policy: ChunkPolicy,
        stats_mode: StatsMode,
    ) -> GridResult<Self> {
        check_extent(&layout, &dimensions)?;
        let chunks = layout.chunk_ids().map(|id| {
            let chunk = Chunk::uniform(
                ChunkKind::Dense,
                layout.chunk_nrows_of(id.row),
                layout.chunk_ncols_of(id.col),
                no_data,
            );
            (id, chunk)
        });
        let path = dir.path().to_path_buf();
        let id = cache.register(dir, layout, chunks, [], true);
        info!(
            grid = id.as_u64(),
            nrows = layout.nrows(),
            ncols = layout.ncols(),
            chunks = layout.n_chunks(),
            dir = %path.display(),
            "created {} grid",
            T::TYPE_NAME
        );
        Ok(Self {
            id,
            layout,
            dimensions,
            no_data,
            policy,
            stats: Stats::new(stats_mode, no_data),
        })
    }

    /// Re-open a grid from its backing directory.
    pub fn open(cache: &mut ChunkCache, path: impl Into<PathBuf>) -> GridResult<Self> {
        let dir = GridDir::open(path)?;
        let type_name = dir.read_type_name()?;
        if type_name != T::TYPE_NAME {
            return Err(GridError::Format(format!(
                "{} holds {} values, not {}",
                dir.path().display(),
                type_name,
                T::TYPE_NAME
            )));
        }
        let header: GridHeader<T> = dir.read_header()?;
        let layout = header.layout;
        check_extent(&layout, &header.dimensions)?;

        for stored in &header.stored_chunks {
            if !layout.is_chunk_in_grid(stored.id) {
                return Err(GridError::Format(format!(
                    "stored chunk {} is outside the grid",
                    stored.id
                )));
            }
            if !dir.has_chunk(stored.id) {
                return Err(GridError::MissingChunk {
                    chunk: stored.id,
                    dir: dir.path().to_path_buf(),
                });
            }
        }

        let stored_ids: HashSet<ChunkId> = header.stored_chunks.iter().map(|s| s.id).collect();
        let fills: HashMap<ChunkId, T> = header.uniform_chunks.into_iter().collect();
        let no_data = header.no_data;
        let resident = layout
            .chunk_ids()
            .filter(|id| !stored_ids.contains(id))
            .map(|id| {
                let fill = fills.get(&id).copied().unwrap_or(no_data);
                let chunk = Chunk::uniform(
                    ChunkKind::Dense,
                    layout.chunk_nrows_of(id.row),
                    layout.chunk_ncols_of(id.col),
                    fill,
                );
                (id, chunk)
            });
        let path = dir.path().to_path_buf();
        let id = cache.register(dir, layout, resident, header.stored_chunks, false);
        info!(grid = id.as_u64(), dir = %path.display(), "opened {} grid", T::TYPE_NAME);

        Ok(Self {
            id,
            layout,
            dimensions: header.dimensions,
            no_data,
            policy: header.policy,
            stats: header.stats,
        })
    }

    pub fn id(&self) -> GridId {
        self.id
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    pub fn no_data(&self) -> T {
        self.no_data
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    pub fn nrows(&self) -> i64 {
        self.layout.nrows()
    }

    pub fn ncols(&self) -> i64 {
        self.layout.ncols()
    }

    pub fn n_chunk_rows(&self) -> i32 {
        self.layout.n_chunk_rows()
    }

    pub fn n_chunk_cols(&self) -> i32 {
        self.layout.n_chunk_cols()
    }

    pub fn n_chunks(&self) -> u64 {
        self.layout.n_chunks()
    }

    /// Backing directory of this grid.
    pub fn dir(&self, cache: &ChunkCache) -> GridResult<PathBuf> {
        Ok(cache.grid_dir(self.id)?.path().to_path_buf())
    }

    pub fn chunk_key(&self, chunk: ChunkId) -> ChunkKey {
        ChunkKey::new(self.id, chunk)
    }

    /// All chunk IDs in row-major order.
    pub fn chunk_ids(&self) -> impl Iterator<Item = ChunkId> {
        self.layout.chunk_ids()
    }

    /// Chunks currently holding more than one distinct value.
    pub fn worth_caching(&self, cache: &ChunkCache) -> GridResult<Vec<ChunkId>> {
        Ok(cache.arena::<T>(self.id)?.worth_caching().iter().copied().collect())
    }

    // ---- geometry ----

    pub fn is_in_grid(&self, row: i64, col: i64) -> bool {
        self.layout.is_in_grid(row, col)
    }

    pub fn is_cell_in_grid(&self, cell: CellId) -> bool {
        self.layout.is_in_grid(cell.row, cell.col)
    }

    pub fn is_chunk_in_grid(&self, chunk: ChunkId) -> bool {
        self.layout.is_chunk_in_grid(chunk)
    }

    /// Whether a chunk-relative position names a cell of this grid.
    pub fn is_chunk_cell_in_grid(&self, chunk: ChunkId, cell_row: usize, cell_col: usize) -> bool {
        self.layout.is_chunk_cell_in_grid(chunk, cell_row, cell_col)
    }

    /// Whether `(x, y)` lies within the grid's half-open extent.
    pub fn is_in_grid_at(&self, x: f64, y: f64) -> bool {
        self.dimensions.contains(&decimal(x), &decimal(y))
    }

    pub fn col_of_x(&self, x: f64) -> i64 {
        self.dimensions.col_of_x(&decimal(x))
    }

    pub fn row_of_y(&self, y: f64) -> i64 {
        self.dimensions.row_of_y(&decimal(y))
    }

    pub fn chunk_col_of_x(&self, x: f64) -> i32 {
        self.layout.chunk_col(self.col_of_x(x))
    }

    pub fn chunk_row_of_y(&self, y: f64) -> i32 {
        self.layout.chunk_row(self.row_of_y(y))
    }

    pub fn chunk_cell_col_of_x(&self, x: f64) -> usize {
        self.layout.cell_col(self.col_of_x(x))
    }

    pub fn chunk_cell_row_of_y(&self, y: f64) -> usize {
        self.layout.cell_row(self.row_of_y(y))
    }

    pub fn cell_id_at(&self, x: f64, y: f64) -> CellId {
        CellId::new(self.row_of_y(y), self.col_of_x(x))
    }

    /// x of the centre of column `col`.
    pub fn cell_x(&self, col: i64) -> BigDecimal {
        self.dimensions.cell_x(col)
    }

    /// y of the centre of row `row`.
    pub fn cell_y(&self, row: i64) -> BigDecimal {
        self.dimensions.cell_y(row)
    }

    /// `[xmin, ymin, xmax, ymax]` of a cell.
    pub fn cell_bounds(&self, row: i64, col: i64) -> [BigDecimal; 4] {
        self.dimensions.cell_bounds(row, col)
    }

    /// A real-world distance expressed in cells.
    pub fn cell_distance(&self, distance: f64) -> f64 {
        self.dimensions
            .cell_distance(&decimal(distance))
            .to_f64()
            .unwrap_or(f64::INFINITY)
    }

    pub fn is_same_dimensions<S: GridValue>(&self, other: &Grid<S>) -> bool {
        self.dimensions == other.dimensions
            && self.nrows() == other.nrows()
            && self.ncols() == other.ncols()
    }

    pub fn is_same_dimensions_and_chunks<S: GridValue>(&self, other: &Grid<S>) -> bool {
        self.is_same_dimensions(other) && self.layout == other.layout
    }

    // ---- cells ----

    /// Get the value of a cell; cells outside the grid read as no-data.
    pub fn get_cell(&self, cache: &mut ChunkCache, row: i64, col: i64) -> GridResult<T> {
        if !self.layout.is_in_grid(row, col) {
            return Ok(self.no_data);
        }
        let (chunk, cell_row, cell_col) = self.layout.locate(row, col);
        cache.read::<T, _>(self.id, chunk, |c| c.get_cell(cell_row, cell_col))
    }

    pub fn get_cell_id(&self, cache: &mut ChunkCache, cell: CellId) -> GridResult<T> {
        self.get_cell(cache, cell.row, cell.col)
    }

    /// Get the value of the cell containing `(x, y)`.
    pub fn get_cell_at(&self, cache: &mut ChunkCache, x: f64, y: f64) -> GridResult<T> {
        if !self.is_in_grid_at(x, y) {
            return Ok(self.no_data);
        }
        self.get_cell(cache, self.row_of_y(y), self.col_of_x(x))
    }

    /// Set a cell, returning its previous value.
    ///
    /// Non-finite values are stored as no-data. Writing outside the grid is
    /// an error.
    pub fn set_cell(&mut self, cache: &mut ChunkCache, row: i64, col: i64, value: T) -> GridResult<T> {
        if !self.layout.is_in_grid(row, col) {
            return Err(GridError::OutOfBounds(CellId::new(row, col)));
        }
        let value = self.sanitize(value);
        let (chunk, cell_row, cell_col) = self.layout.locate(row, col);
        let policy = self.policy;
        let previous = cache.write(self.id, chunk, (cell_row, cell_col), value, policy)?;
        self.stats.record_change(value, previous);
        Ok(previous)
    }

    pub fn set_cell_id(&mut self, cache: &mut ChunkCache, cell: CellId, value: T) -> GridResult<T> {
        self.set_cell(cache, cell.row, cell.col, value)
    }

    /// Set the cell containing `(x, y)`, returning its previous value.
    pub fn set_cell_at(&mut self, cache: &mut ChunkCache, x: f64, y: f64, value: T) -> GridResult<T> {
        if !self.is_in_grid_at(x, y) {
            return Err(GridError::OutOfBounds(self.cell_id_at(x, y)));
        }
        self.set_cell(cache, self.row_of_y(y), self.col_of_x(x), value)
    }

    /// Add `delta` to a cell and return the resulting value.
    ///
    /// A no-data cell takes the value `delta`; a no-data `delta` leaves the
    /// cell unchanged. Cells outside the grid are ignored and read as no-data.
    pub fn add_to_cell(&mut self, cache: &mut ChunkCache, row: i64, col: i64, delta: T) -> GridResult<T> {
        if !self.layout.is_in_grid(row, col) {
            return Ok(self.no_data);
        }
        let current = self.get_cell(cache, row, col)?;
        if delta == self.no_data || !delta.is_finite() {
            return Ok(current);
        }
        let value = if current == self.no_data {
            delta
        } else {
            self.sanitize(current.plus(delta))
        };
        self.set_cell(cache, row, col, value)?;
        Ok(value)
    }

    pub fn add_to_cell_at(&mut self, cache: &mut ChunkCache, x: f64, y: f64, delta: T) -> GridResult<T> {
        if !self.is_in_grid_at(x, y) {
            return Ok(self.no_data);
        }
        self.add_to_cell(cache, self.row_of_y(y), self.col_of_x(x), delta)
    }

    /// Set every cell to `value`; all chunks become uniform.
    pub fn init_cells(&mut self, cache: &mut ChunkCache, value: T) -> GridResult<()> {
        let value = self.sanitize(value);
        let layout = self.layout;
        for id in layout.chunk_ids() {
            let chunk = Chunk::uniform(
                ChunkKind::Dense,
                layout.chunk_nrows_of(id.row),
                layout.chunk_ncols_of(id.col),
                value,
            );
            cache.replace(self.id, id, chunk)?;
        }
        self.stats.reset();
        self.stats.accumulate(value, (layout.nrows() * layout.ncols()) as u64);
        debug!(grid = self.id.as_u64(), "initialised all cells to {}", value);
        Ok(())
    }

    /// Write a cell while bulk loading, leaving statistics untouched.
    pub(crate) fn init_cell(&mut self, cache: &mut ChunkCache, row: i64, col: i64, value: T) -> GridResult<()> {
        if !self.layout.is_in_grid(row, col) {
            return Err(GridError::OutOfBounds(CellId::new(row, col)));
        }
        let value = self.sanitize(value);
        let (chunk, cell_row, cell_col) = self.layout.locate(row, col);
        let policy = self.policy;
        cache.write(self.id, chunk, (cell_row, cell_col), value, policy)?;
        Ok(())
    }

    /// Row-major values of one chunk.
    pub fn chunk_values(&self, cache: &mut ChunkCache, chunk: ChunkId) -> GridResult<Vec<T>> {
        cache.read::<T, _>(self.id, chunk, |c| c.to_values())
    }

    /// Iterate over every cell, chunk by chunk, row-major within each chunk.
    pub fn cells<'a>(&'a self, cache: &'a mut ChunkCache) -> CellIter<'a, T> {
        CellIter::new(self, cache)
    }

    fn sanitize(&self, value: T) -> T {
        if value.is_finite() {
            value
        } else {
            self.no_data
        }
    }

    // ---- statistics ----

    /// Statistics as last computed, without refreshing.
    pub fn stats(&self) -> &Stats<T> {
        &self.stats
    }

    pub fn stats_mode(&self) -> StatsMode {
        self.stats.mode()
    }

    /// Recompute statistics from every cell.
    pub fn update_stats(&mut self, cache: &mut ChunkCache) -> GridResult<()> {
        self.stats.reset();
        let layout = self.layout;
        for id in layout.chunk_ids() {
            let stats = &mut self.stats;
            cache.read::<T, _>(self.id, id, |c| {
                c.for_each_value(|value, count| stats.accumulate(value, count))
            })?;
        }
        debug!(grid = self.id.as_u64(), n = self.stats.n(), "updated statistics");
        Ok(())
    }

    /// Number of data cells.
    pub fn count(&mut self, cache: &mut ChunkCache) -> GridResult<u64> {
        if self.stats.needs_count_scan() {
            self.update_stats(cache)?;
        }
        Ok(self.stats.n())
    }

    /// Sum of data cells.
    pub fn sum(&mut self, cache: &mut ChunkCache) -> GridResult<BigDecimal> {
        if self.stats.needs_count_scan() {
            self.update_stats(cache)?;
        }
        Ok(self.stats.sum().clone())
    }

    /// Mean of data cells, `None` when there are none.
    pub fn mean(&mut self, cache: &mut ChunkCache) -> GridResult<Option<BigDecimal>> {
        if self.stats.needs_count_scan() {
            self.update_stats(cache)?;
        }
        Ok(self.stats.mean())
    }

    /// Smallest data value; `force` rescans even if the figure looks current.
    pub fn min(&mut self, cache: &mut ChunkCache, force: bool) -> GridResult<Option<T>> {
        if self.stats.needs_min_scan(force) {
            self.update_stats(cache)?;
        }
        Ok(self.stats.min())
    }

    /// Largest data value; `force` rescans even if the figure looks current.
    pub fn max(&mut self, cache: &mut ChunkCache, force: bool) -> GridResult<Option<T>> {
        if self.stats.needs_max_scan(force) {
            self.update_stats(cache)?;
        }
        Ok(self.stats.max())
    }

    // ---- lifecycle ----

    /// Write every modified chunk and the header to the backing directory.
    pub fn persist(&self, cache: &mut ChunkCache) -> GridResult<()> {
        cache.flush(self.id)?;
        let (stored_chunks, uniform_chunks) = cache.arena::<T>(self.id)?.index(self.no_data);
        let header = GridHeader {
            type_name: T::TYPE_NAME.to_string(),
            layout: self.layout,
            dimensions: self.dimensions.clone(),
            no_data: self.no_data,
            policy: self.policy,
            stats: self.stats.clone(),
            stored_chunks,
            uniform_chunks,
        };
        let dir = cache.grid_dir(self.id)?;
        dir.write_header(&header)?;
        debug!(grid = self.id.as_u64(), dir = %dir.path().display(), "persisted grid");
        Ok(())
    }

    /// Persist and release all memory held for this grid.
    pub fn close(self, cache: &mut ChunkCache) -> GridResult<()> {
        self.persist(cache)?;
        cache.forget(self.id);
        Ok(())
    }

    /// Drop this grid and remove its backing directory.
    pub fn delete(self, cache: &mut ChunkCache) -> GridResult<()> {
        let dir = cache.grid_dir(self.id)?.clone();
        cache.forget(self.id);
        info!(dir = %dir.path().display(), "deleting grid");
        dir.delete()
    }
}

fn check_extent(layout: &ChunkLayout, dimensions: &Dimensions) -> GridResult<()> {
    let cellsize = dimensions.cellsize();
    let expected_width = cellsize * BigDecimal::from(layout.ncols());
    let expected_height = cellsize * BigDecimal::from(layout.nrows());
    if dimensions.width() != expected_width || dimensions.height() != expected_height {
        return Err(GridError::InvalidDimensions(format!(
            "extent {} x {} does not match {} rows and {} columns of size {}",
            dimensions.width(),
            dimensions.height(),
            layout.nrows(),
            layout.ncols(),
            cellsize
        )));
    }
    Ok(())
}

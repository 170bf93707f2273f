use std::vec;

use crate::cache::{ChunkCache, ChunkKey};
use crate::coords::{CellId, ChunkId};
use crate::error::GridResult;
use crate::grid::Grid;
use crate::value::GridValue;

struct Current<T> {
    key: ChunkKey,
    ncols: usize,
    len: usize,
    /// Set when the chunk is uniform; `values` is then empty.
    uniform: Option<T>,
    values: Vec<T>,
    next: usize,
}

/// Iterator over every cell of a grid.
///
/// Chunks are visited in row-major order and cells row-major within each
/// chunk. The chunk being visited stays pinned until the iterator moves past
/// it or is dropped. A load failure ends the iteration after yielding the
/// error.
pub struct CellIter<'a, T: GridValue> {
    grid: &'a Grid<T>,
    cache: &'a mut ChunkCache,
    chunks: vec::IntoIter<ChunkId>,
    current: Option<Current<T>>,
    done: bool,
}

impl<'a, T: GridValue> CellIter<'a, T> {
    pub(crate) fn new(grid: &'a Grid<T>, cache: &'a mut ChunkCache) -> Self {
        let chunks: Vec<ChunkId> = grid.chunk_ids().collect();
        Self {
            grid,
            cache,
            chunks: chunks.into_iter(),
            current: None,
            done: false,
        }
    }

    fn enter(&mut self, chunk: ChunkId) -> GridResult<()> {
        let key = self.grid.chunk_key(chunk);
        let (ncols, len, uniform, values) = self.cache.read::<T, _>(key.grid, chunk, |c| {
            let len = c.nrows() * c.ncols();
            match c.uniform_value() {
                Some(fill) => (c.ncols(), len, Some(fill), Vec::new()),
                None => (c.ncols(), len, None, c.to_values()),
            }
        })?;
        self.cache.pin(key);
        self.current = Some(Current {
            key,
            ncols,
            len,
            uniform,
            values,
            next: 0,
        });
        Ok(())
    }

    fn leave(&mut self) {
        if let Some(current) = self.current.take() {
            self.cache.unpin(current.key);
        }
    }
}

impl<T: GridValue> Iterator for CellIter<'_, T> {
    type Item = GridResult<(CellId, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(current) = &mut self.current {
                if current.next < current.len {
                    let i = current.next;
                    current.next += 1;
                    let value = current.uniform.unwrap_or_else(|| current.values[i]);
                    let cell = self
                        .grid
                        .layout()
                        .cell_id(current.key.chunk, i / current.ncols, i % current.ncols);
                    return Some(Ok((cell, value)));
                }
                self.leave();
            }
            match self.chunks.next() {
                Some(chunk) => {
                    if let Err(e) = self.enter(chunk) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl<T: GridValue> Drop for CellIter<'_, T> {
    fn drop(&mut self) {
        self.leave();
    }
}

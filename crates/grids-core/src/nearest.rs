//! Nearest-data search.
//!
//! The search walks square (Chebyshev) rings outward from the query cell.
//! Once a ring turns up a data cell, cells in the disc around the query
//! point with that radius are probed too, since a later ring can hold a
//! cell that is closer in Euclidean terms than a corner of an earlier one.

use num_traits::ToPrimitive;

use crate::cache::ChunkCache;
use crate::coords::CellId;
use crate::error::GridResult;
use crate::grid::Grid;
use crate::value::GridValue;

/// Result of a nearest-data search.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearest<T> {
    /// Data cells tied for the smallest distance, in the order found.
    pub cells: Vec<CellId>,
    /// Values of `cells`.
    pub values: Vec<T>,
    /// Real-world distance from the query point to the cell centres.
    pub distance: f64,
}

impl<T: GridValue> Nearest<T> {
    pub fn mean_value(&self) -> f64 {
        let sum: f64 = self.values.iter().map(|v| v.to_f64()).sum();
        sum / self.values.len() as f64
    }
}

struct Search<T> {
    qx: f64,
    qy: f64,
    xmin: f64,
    ymin: f64,
    cellsize: f64,
    tolerance: f64,
    best: Option<Nearest<T>>,
}

impl<T: GridValue> Search<T> {
    fn distance(&self, row: i64, col: i64) -> f64 {
        let x = self.xmin + (col as f64 + 0.5) * self.cellsize;
        let y = self.ymin + (row as f64 + 0.5) * self.cellsize;
        (x - self.qx).hypot(y - self.qy)
    }

    fn offer(&mut self, row: i64, col: i64, value: T) {
        let distance = self.distance(row, col);
        if let Some(best) = &mut self.best {
            if distance > best.distance + self.tolerance {
                return;
            }
            if distance >= best.distance - self.tolerance {
                best.cells.push(CellId::new(row, col));
                best.values.push(value);
                return;
            }
        }
        self.best = Some(Nearest {
            cells: vec![CellId::new(row, col)],
            values: vec![value],
            distance,
        });
    }
}

impl<T: GridValue> Grid<T> {
    /// Closest data cells to the centre of cell `(row, col)`.
    ///
    /// The query cell may lie outside the grid. `None` when the grid holds
    /// no data.
    pub fn nearest(&self, cache: &mut ChunkCache, row: i64, col: i64) -> GridResult<Option<Nearest<T>>> {
        let x = self.cell_x(col).to_f64().unwrap_or(f64::NAN);
        let y = self.cell_y(row).to_f64().unwrap_or(f64::NAN);
        self.search(cache, x, y, row, col)
    }

    /// Closest data cells to the point `(x, y)`.
    pub fn nearest_at(&self, cache: &mut ChunkCache, x: f64, y: f64) -> GridResult<Option<Nearest<T>>> {
        self.search(cache, x, y, self.row_of_y(y), self.col_of_x(x))
    }

    /// Mean of the values tied for nearest to `(x, y)`.
    pub fn nearest_value(&self, cache: &mut ChunkCache, x: f64, y: f64) -> GridResult<Option<f64>> {
        Ok(self.nearest_at(cache, x, y)?.map(|n| n.mean_value()))
    }

    pub fn nearest_cell_ids(&self, cache: &mut ChunkCache, x: f64, y: f64) -> GridResult<Vec<CellId>> {
        Ok(self.nearest_at(cache, x, y)?.map(|n| n.cells).unwrap_or_default())
    }

    pub fn nearest_distance(&self, cache: &mut ChunkCache, x: f64, y: f64) -> GridResult<Option<f64>> {
        Ok(self.nearest_at(cache, x, y)?.map(|n| n.distance))
    }

    /// In-grid cells whose centres lie within `distance` of `(x, y)`, row-major.
    pub fn cells_within(&self, x: f64, y: f64, distance: f64) -> Vec<CellId> {
        let mut search = self.new_search(x, y);
        search.tolerance = 0.0;
        let (rows, cols) = self.disc_bounds(&search, distance);
        let mut cells = Vec::new();
        for row in rows.0..=rows.1 {
            for col in cols.0..=cols.1 {
                if search.distance(row, col) <= distance {
                    cells.push(CellId::new(row, col));
                }
            }
        }
        cells
    }

    fn new_search(&self, x: f64, y: f64) -> Search<T> {
        let dims = self.dimensions();
        let cellsize = dims.cellsize_f64();
        Search {
            qx: x,
            qy: y,
            xmin: dims.xmin().to_f64().unwrap_or(f64::NAN),
            ymin: dims.ymin().to_f64().unwrap_or(f64::NAN),
            cellsize,
            tolerance: cellsize * 1e-9,
            best: None,
        }
    }

    /// In-grid row and column ranges covering a disc around the query point.
    fn disc_bounds(&self, search: &Search<T>, radius: f64) -> ((i64, i64), (i64, i64)) {
        let to_index = |offset: f64| (offset / search.cellsize).floor() as i64;
        let row_lo = to_index(search.qy - radius - search.ymin).max(0);
        let row_hi = to_index(search.qy + radius - search.ymin).min(self.nrows() - 1);
        let col_lo = to_index(search.qx - radius - search.xmin).max(0);
        let col_hi = to_index(search.qx + radius - search.xmin).min(self.ncols() - 1);
        ((row_lo, row_hi), (col_lo, col_hi))
    }

    fn search(
        &self,
        cache: &mut ChunkCache,
        x: f64,
        y: f64,
        row: i64,
        col: i64,
    ) -> GridResult<Option<Nearest<T>>> {
        let mut search = self.new_search(x, y);
        let r0 = row.clamp(0, self.nrows() - 1);
        let c0 = col.clamp(0, self.ncols() - 1);
        let no_data = self.no_data();
        let max_ring = self.nrows().max(self.ncols());

        let mut found_ring = None;
        for k in 0..=max_ring {
            for (r, c) in ring(r0, c0, k) {
                if !self.is_in_grid(r, c) {
                    continue;
                }
                let value = self.get_cell(cache, r, c)?;
                if value != no_data {
                    search.offer(r, c, value);
                }
            }
            if search.best.is_some() {
                found_ring = Some(k);
                break;
            }
        }
        let Some(k) = found_ring else {
            return Ok(None);
        };

        let radius = search.best.as_ref().map_or(0.0, |b| b.distance) + search.tolerance;
        let (rows, cols) = self.disc_bounds(&search, radius);
        for r in rows.0..=rows.1 {
            for c in cols.0..=cols.1 {
                if (r - r0).abs().max((c - c0).abs()) <= k {
                    continue;
                }
                if search.distance(r, c) > radius {
                    continue;
                }
                let value = self.get_cell(cache, r, c)?;
                if value != no_data {
                    search.offer(r, c, value);
                }
            }
        }
        Ok(search.best)
    }
}

/// Cells at Chebyshev distance exactly `k` from `(r0, c0)`.
fn ring(r0: i64, c0: i64, k: i64) -> impl Iterator<Item = (i64, i64)> {
    let top_bottom = (c0 - k..=c0 + k).flat_map(move |c| {
        let rows = if k == 0 { vec![r0] } else { vec![r0 - k, r0 + k] };
        rows.into_iter().map(move |r| (r, c))
    });
    let sides = (r0 - k + 1..=r0 + k - 1).flat_map(move |r| [(r, c0 - k), (r, c0 + k)]);
    top_bottom.chain(sides)
}

use serde::{Deserialize, Serialize};

use crate::value::GridValue;

/// One value per cell.
///
/// Until a cell diverges from `fill` no array is allocated; the chunk is
/// "uniform" and every cell reads as `fill`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "DenseRepr<T>",
    into = "DenseRepr<T>",
    bound(serialize = "T: Serialize + Clone", deserialize = "T: Deserialize<'de>")
)]
pub struct DenseChunk<T> {
    nrows: usize,
    ncols: usize,
    fill: T,
    cells: Option<Vec<T>>,
}

impl<T: GridValue> DenseChunk<T> {
    /// A uniform chunk with every cell set to `fill`.
    pub fn uniform(nrows: usize, ncols: usize, fill: T) -> Self {
        Self {
            nrows,
            ncols,
            fill,
            cells: None,
        }
    }

    /// Build from row-major values, staying uniform when all values are equal.
    pub fn from_values(nrows: usize, ncols: usize, values: Vec<T>) -> Self {
        assert_eq!(values.len(), nrows * ncols, "value count does not match chunk size");
        let fill = values[0];
        if values.iter().all(|v| *v == fill) {
            return Self::uniform(nrows, ncols, fill);
        }
        Self {
            nrows,
            ncols,
            fill,
            cells: Some(values),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_uniform(&self) -> bool {
        self.cells.is_none()
    }

    /// The value of every cell while the chunk is uniform.
    pub fn fill(&self) -> T {
        self.fill
    }

    pub fn get_cell(&self, cell_row: usize, cell_col: usize) -> T {
        let index = self.index(cell_row, cell_col);
        match &self.cells {
            Some(cells) => cells[index],
            None => self.fill,
        }
    }

    /// Write a cell, returning its previous value.
    pub fn set_cell(&mut self, cell_row: usize, cell_col: usize, value: T) -> T {
        let index = self.index(cell_row, cell_col);
        match &mut self.cells {
            Some(cells) => std::mem::replace(&mut cells[index], value),
            None => {
                if value == self.fill {
                    return self.fill;
                }
                let mut cells = vec![self.fill; self.nrows * self.ncols];
                cells[index] = value;
                self.cells = Some(cells);
                self.fill
            }
        }
    }

    pub fn init_cell(&mut self, cell_row: usize, cell_col: usize, value: T) {
        self.set_cell(cell_row, cell_col, value);
    }

    /// Bytes held by the cell array.
    pub fn heap_bytes(&self) -> usize {
        self.cells
            .as_ref()
            .map_or(0, |cells| cells.capacity() * std::mem::size_of::<T>())
    }

    /// Row-major copy of every cell value.
    pub fn to_values(&self) -> Vec<T> {
        match &self.cells {
            Some(cells) => cells.clone(),
            None => vec![self.fill; self.nrows * self.ncols],
        }
    }

    /// Calls `f(value, count)` for runs of cells; uniform chunks report a single run.
    pub fn for_each_value(&self, mut f: impl FnMut(T, u64)) {
        match &self.cells {
            Some(cells) => cells.iter().for_each(|v| f(*v, 1)),
            None => f(self.fill, (self.nrows * self.ncols) as u64),
        }
    }

    fn index(&self, cell_row: usize, cell_col: usize) -> usize {
        assert!(
            cell_row < self.nrows && cell_col < self.ncols,
            "cell ({}, {}) outside {}x{} chunk",
            cell_row,
            cell_col,
            self.nrows,
            self.ncols
        );
        cell_row * self.ncols + cell_col
    }
}

/// On-disk form of a dense chunk, checked for a consistent shape on load.
#[derive(Serialize, Deserialize)]
struct DenseRepr<T> {
    nrows: usize,
    ncols: usize,
    fill: T,
    cells: Option<Vec<T>>,
}

impl<T> From<DenseChunk<T>> for DenseRepr<T> {
    fn from(chunk: DenseChunk<T>) -> Self {
        DenseRepr {
            nrows: chunk.nrows,
            ncols: chunk.ncols,
            fill: chunk.fill,
            cells: chunk.cells,
        }
    }
}

impl<T> TryFrom<DenseRepr<T>> for DenseChunk<T> {
    type Error = String;

    fn try_from(repr: DenseRepr<T>) -> Result<Self, Self::Error> {
        if repr.nrows == 0 || repr.ncols == 0 {
            return Err(format!("empty dense chunk {}x{}", repr.nrows, repr.ncols));
        }
        if let Some(cells) = &repr.cells {
            if cells.len() != repr.nrows * repr.ncols {
                return Err(format!(
                    "dense chunk {}x{} holds {} values",
                    repr.nrows,
                    repr.ncols,
                    cells.len()
                ));
            }
        }
        Ok(DenseChunk {
            nrows: repr.nrows,
            ncols: repr.ncols,
            fill: repr.fill,
            cells: repr.cells,
        })
    }
}

use std::collections::{BTreeMap, HashMap, HashSet};

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use super::dense::DenseChunk;
use crate::value::GridValue;

type Bits = BitVec<u64, Lsb0>;

/// Cells holding one value, as a bitset over a contiguous band of rows.
///
/// The band starts at `first_row` and grows in either direction as cells
/// are inserted, so a value confined to a few rows only pays for those rows.
#[derive(Debug, Clone, PartialEq)]
struct RowBits {
    first_row: usize,
    ncols: usize,
    bits: Bits,
    count: usize,
}

impl RowBits {
    fn new(ncols: usize) -> Self {
        Self {
            first_row: 0,
            ncols,
            bits: Bits::new(),
            count: 0,
        }
    }

    fn span_rows(&self) -> usize {
        self.bits.len() / self.ncols
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.first_row || row >= self.first_row + self.span_rows() {
            return None;
        }
        Some((row - self.first_row) * self.ncols + col)
    }

    fn contains(&self, row: usize, col: usize) -> bool {
        self.offset(row, col).is_some_and(|i| self.bits[i])
    }

    fn insert(&mut self, row: usize, col: usize) -> bool {
        self.cover(row);
        let i = (row - self.first_row) * self.ncols + col;
        if self.bits[i] {
            return false;
        }
        self.bits.set(i, true);
        self.count += 1;
        true
    }

    fn remove(&mut self, row: usize, col: usize) -> bool {
        match self.offset(row, col) {
            Some(i) if self.bits[i] => {
                self.bits.set(i, false);
                self.count -= 1;
                true
            }
            _ => false,
        }
    }

    fn cover(&mut self, row: usize) {
        if self.bits.is_empty() {
            self.first_row = row;
            self.bits = Bits::repeat(false, self.ncols);
        } else if row < self.first_row {
            let mut grown = Bits::repeat(false, (self.first_row - row) * self.ncols);
            grown.extend_from_bitslice(&self.bits);
            self.bits = grown;
            self.first_row = row;
        } else if row >= self.first_row + self.span_rows() {
            self.bits.resize((row - self.first_row + 1) * self.ncols, false);
        }
    }

    /// Row-major indices of set cells within the chunk.
    fn cells(&self) -> impl Iterator<Item = usize> + '_ {
        let base = self.first_row * self.ncols;
        self.bits.iter_ones().map(move |i| base + i)
    }

    fn heap_bytes(&self) -> usize {
        self.bits.capacity() / 8
    }
}

/// Chunk storing only the cells that differ from a default value.
///
/// Each non-default value gets a bucket. Values covering many cells are kept
/// as [`RowBits`] in an ordered map; values covering only a few cells are kept
/// as explicit index sets. A bucket moves between the two forms as its cell
/// count crosses [`SparseChunk::scattered_limit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SparseRepr<T>", into = "SparseRepr<T>", bound = "")]
pub struct SparseChunk<T: GridValue> {
    nrows: usize,
    ncols: usize,
    default: T,
    bitsets: BTreeMap<T::Key, RowBits>,
    scattered: HashMap<T::Key, HashSet<usize>>,
    n_other: usize,
}

impl<T: GridValue> SparseChunk<T> {
    pub fn new(nrows: usize, ncols: usize, default: T) -> Self {
        Self {
            nrows,
            ncols,
            default,
            bitsets: BTreeMap::new(),
            scattered: HashMap::new(),
            n_other: 0,
        }
    }

    /// Re-encode a dense chunk, using its most frequent value as the default.
    pub fn from_dense(dense: &DenseChunk<T>) -> Self {
        let (nrows, ncols) = (dense.nrows(), dense.ncols());
        if dense.is_uniform() {
            return Self::new(nrows, ncols, dense.fill());
        }
        let values = dense.to_values();
        let mut counts: HashMap<T::Key, usize> = HashMap::new();
        for value in &values {
            *counts.entry(value.to_key()).or_default() += 1;
        }
        let default = counts
            .into_iter()
            .max_by_key(|(key, n)| (*n, *key))
            .map_or(dense.fill(), |(key, _)| T::from_key(key));

        let mut chunk = Self::new(nrows, ncols, default);
        for (i, value) in values.into_iter().enumerate() {
            if value != default {
                chunk.set_cell(i / ncols, i % ncols, value);
            }
        }
        chunk
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn default_value(&self) -> T {
        self.default
    }

    pub fn is_uniform(&self) -> bool {
        self.n_other == 0
    }

    /// Number of distinct non-default values.
    pub fn n_buckets(&self) -> usize {
        self.bitsets.len() + self.scattered.len()
    }

    /// Number of buckets currently held as row bitsets.
    pub fn n_bitsets(&self) -> usize {
        self.bitsets.len()
    }

    /// Cell count above which a scattered bucket becomes a bitset.
    pub fn scattered_limit(&self) -> usize {
        (self.nrows * self.ncols / 64).max(8)
    }

    pub fn get_cell(&self, cell_row: usize, cell_col: usize) -> T {
        let index = self.index(cell_row, cell_col);
        if self.n_other == 0 {
            return self.default;
        }
        self.find(cell_row, cell_col, index)
            .map_or(self.default, T::from_key)
    }

    /// Write a cell, returning its previous value.
    pub fn set_cell(&mut self, cell_row: usize, cell_col: usize, value: T) -> T {
        let index = self.index(cell_row, cell_col);
        let previous = self.take(cell_row, cell_col, index);
        if value != self.default {
            self.put(cell_row, cell_col, index, value.to_key());
        }
        previous
    }

    pub fn init_cell(&mut self, cell_row: usize, cell_col: usize, value: T) {
        self.set_cell(cell_row, cell_col, value);
    }

    /// Estimated bytes held by the buckets.
    pub fn heap_bytes(&self) -> usize {
        let node = std::mem::size_of::<T::Key>() + std::mem::size_of::<RowBits>();
        let bitsets: usize = self.bitsets.values().map(|b| b.heap_bytes() + node).sum();
        let scattered: usize = self
            .scattered
            .values()
            .map(|set| set.capacity() * (std::mem::size_of::<usize>() + 1) + 48)
            .sum();
        bitsets + scattered
    }

    /// Row-major copy of every cell value.
    pub fn to_values(&self) -> Vec<T> {
        let mut values = vec![self.default; self.nrows * self.ncols];
        for (key, bits) in &self.bitsets {
            for i in bits.cells() {
                values[i] = T::from_key(*key);
            }
        }
        for (key, set) in &self.scattered {
            for &i in set {
                values[i] = T::from_key(*key);
            }
        }
        values
    }

    /// Calls `f(value, count)` once for the default and once per bucket.
    pub fn for_each_value(&self, mut f: impl FnMut(T, u64)) {
        let n_default = self.nrows * self.ncols - self.n_other;
        if n_default > 0 {
            f(self.default, n_default as u64);
        }
        for (key, bits) in &self.bitsets {
            f(T::from_key(*key), bits.count as u64);
        }
        for (key, set) in &self.scattered {
            f(T::from_key(*key), set.len() as u64);
        }
    }

    fn find(&self, cell_row: usize, cell_col: usize, index: usize) -> Option<T::Key> {
        self.bitsets
            .iter()
            .find(|(_, bits)| bits.contains(cell_row, cell_col))
            .map(|(key, _)| *key)
            .or_else(|| {
                self.scattered
                    .iter()
                    .find(|(_, set)| set.contains(&index))
                    .map(|(key, _)| *key)
            })
    }

    fn take(&mut self, cell_row: usize, cell_col: usize, index: usize) -> T {
        if self.n_other == 0 {
            return self.default;
        }
        let Some(key) = self.find(cell_row, cell_col, index) else {
            return self.default;
        };

        let demote_below = self.scattered_limit() / 2;
        if let Some(bits) = self.bitsets.get_mut(&key) {
            bits.remove(cell_row, cell_col);
            if bits.count < demote_below {
                if let Some(bits) = self.bitsets.remove(&key) {
                    let set: HashSet<usize> = bits.cells().collect();
                    if !set.is_empty() {
                        self.scattered.insert(key, set);
                    }
                }
            }
        } else if let Some(set) = self.scattered.get_mut(&key) {
            set.remove(&index);
            if set.is_empty() {
                self.scattered.remove(&key);
            }
        }
        self.n_other -= 1;
        T::from_key(key)
    }

    fn put(&mut self, cell_row: usize, cell_col: usize, index: usize, key: T::Key) {
        if let Some(bits) = self.bitsets.get_mut(&key) {
            bits.insert(cell_row, cell_col);
        } else {
            let limit = self.scattered_limit();
            let set = self.scattered.entry(key).or_default();
            set.insert(index);
            let promote = set.len() > limit;
            if promote {
                if let Some(set) = self.scattered.remove(&key) {
                    let mut bits = RowBits::new(self.ncols);
                    for i in set {
                        bits.insert(i / self.ncols, i % self.ncols);
                    }
                    self.bitsets.insert(key, bits);
                }
            }
        }
        self.n_other += 1;
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

/// On-disk form of a sparse chunk. Buckets are listed by value so that
/// float values never need to become map keys.
#[derive(Serialize, Deserialize)]
struct SparseRepr<T> {
    nrows: usize,
    ncols: usize,
    default: T,
    bitsets: Vec<BitsetRepr<T>>,
    scattered: Vec<ScatteredRepr<T>>,
}

#[derive(Serialize, Deserialize)]
struct BitsetRepr<T> {
    value: T,
    first_row: usize,
    len: usize,
    words: Vec<u64>,
}

#[derive(Serialize, Deserialize)]
struct ScatteredRepr<T> {
    value: T,
    cells: Vec<usize>,
}

impl<T: GridValue> From<SparseChunk<T>> for SparseRepr<T> {
    fn from(chunk: SparseChunk<T>) -> Self {
        let bitsets = chunk
            .bitsets
            .into_iter()
            .map(|(key, bits)| BitsetRepr {
                value: T::from_key(key),
                first_row: bits.first_row,
                len: bits.bits.len(),
                words: bits.bits.into_vec(),
            })
            .collect();
        let mut scattered: Vec<ScatteredRepr<T>> = chunk
            .scattered
            .into_iter()
            .map(|(key, set)| {
                let mut cells: Vec<usize> = set.into_iter().collect();
                cells.sort_unstable();
                ScatteredRepr {
                    value: T::from_key(key),
                    cells,
                }
            })
            .collect();
        scattered.sort_by(|a, b| a.value.to_key().cmp(&b.value.to_key()));
        SparseRepr {
            nrows: chunk.nrows,
            ncols: chunk.ncols,
            default: chunk.default,
            bitsets,
            scattered,
        }
    }
}

impl<T: GridValue> TryFrom<SparseRepr<T>> for SparseChunk<T> {
    type Error = String;

    fn try_from(repr: SparseRepr<T>) -> Result<Self, Self::Error> {
        let n_cells = repr.nrows * repr.ncols;
        if repr.ncols == 0 || repr.nrows == 0 {
            return Err(format!("empty sparse chunk {}x{}", repr.nrows, repr.ncols));
        }
        let mut chunk = SparseChunk::new(repr.nrows, repr.ncols, repr.default);

        for b in repr.bitsets {
            if b.len % repr.ncols != 0 || b.len > b.words.len() * 64 {
                return Err(format!("bitset of {} bits does not fit {} columns", b.len, repr.ncols));
            }
            if b.first_row * repr.ncols + b.len > n_cells {
                return Err(format!("bitset rows exceed chunk of {} rows", repr.nrows));
            }
            let mut bits = Bits::from_vec(b.words);
            bits.truncate(b.len);
            let count = bits.count_ones();
            if count == 0 || b.value == repr.default {
                continue;
            }
            chunk.n_other += count;
            chunk.bitsets.insert(
                b.value.to_key(),
                RowBits {
                    first_row: b.first_row,
                    ncols: repr.ncols,
                    bits,
                    count,
                },
            );
        }

        for s in repr.scattered {
            if let Some(bad) = s.cells.iter().find(|&&i| i >= n_cells) {
                return Err(format!("cell index {} outside chunk of {} cells", bad, n_cells));
            }
            if s.cells.is_empty() || s.value == repr.default {
                continue;
            }
            let set: HashSet<usize> = s.cells.into_iter().collect();
            chunk.n_other += set.len();
            chunk.scattered.insert(s.value.to_key(), set);
        }

        if chunk.n_other > n_cells {
            return Err("sparse buckets overlap".to_string());
        }
        Ok(chunk)
    }
}

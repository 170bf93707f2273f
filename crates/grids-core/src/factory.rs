use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bigdecimal::BigDecimal;
use tracing::{debug, info, warn};

use crate::ascii::{AsciiGridReader, RowMajorSource};
use crate::cache::ChunkCache;
use crate::config::GridConfig;
use crate::dimensions::Dimensions;
use crate::error::{GridError, GridResult};
use crate::grid::Grid;
use crate::layout::ChunkLayout;
use crate::store::GridDir;
use crate::value::GridValue;

/// Builds grids of one value type under a base directory.
///
/// Each grid gets its own subdirectory named after the value type and a
/// counter, e.g. `double_0`, `double_1`.
#[derive(Debug, Clone)]
pub struct GridFactory<T: GridValue> {
    base_dir: PathBuf,
    config: GridConfig,
    no_data: T,
}

impl<T: GridValue> GridFactory<T> {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            config: GridConfig::default(),
            no_data: T::DEFAULT_NO_DATA,
        }
    }

    pub fn with_config(mut self, config: GridConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `no_data` for new grids. NaN is refused and the current value kept.
    pub fn with_no_data(mut self, no_data: T) -> Self {
        if no_data.is_valid_no_data() {
            self.no_data = no_data;
        } else {
            warn!(rejected = %no_data, kept = %self.no_data, "invalid no-data value");
        }
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn no_data(&self) -> T {
        self.no_data
    }

    /// A grid of unit cells with its origin at zero.
    pub fn create(&self, cache: &mut ChunkCache, nrows: i64, ncols: i64) -> GridResult<Grid<T>> {
        self.create_with_dimensions(cache, nrows, ncols, Dimensions::unit(nrows, ncols)?)
    }

    pub fn create_with_dimensions(
        &self,
        cache: &mut ChunkCache,
        nrows: i64,
        ncols: i64,
        dimensions: Dimensions,
    ) -> GridResult<Grid<T>> {
        let layout = ChunkLayout::new(nrows, ncols, self.config.chunk_nrows, self.config.chunk_ncols)?;
        let dir = self.allocate_dir()?;
        Grid::create_in(
            cache,
            dir,
            layout,
            dimensions,
            self.no_data,
            self.config.policy,
            self.config.stats_mode,
        )
    }

    /// A new grid with the shape, extent and values of `source`.
    pub fn copy_of<S: GridValue>(&self, cache: &mut ChunkCache, source: &Grid<S>) -> GridResult<Grid<T>> {
        self.copy_window(cache, source, 0, 0, source.nrows() - 1, source.ncols() - 1)
    }

    /// A new grid holding rows `start_row..=end_row` and columns
    /// `start_col..=end_col` of `source`.
    ///
    /// The window may extend past the source; cells outside it are no-data.
    /// Source no-data and values the destination type cannot hold become
    /// destination no-data.
    pub fn copy_window<S: GridValue>(
        &self,
        cache: &mut ChunkCache,
        source: &Grid<S>,
        start_row: i64,
        start_col: i64,
        end_row: i64,
        end_col: i64,
    ) -> GridResult<Grid<T>> {
        if end_row < start_row || end_col < start_col {
            return Err(GridError::InvalidDimensions(format!(
                "empty window rows {}..={} cols {}..={}",
                start_row, end_row, start_col, end_col
            )));
        }
        let nrows = end_row - start_row + 1;
        let ncols = end_col - start_col + 1;
        let src_dims = source.dimensions();
        let cellsize = src_dims.cellsize().clone();
        let dimensions = Dimensions::from_origin(
            src_dims.xmin() + &cellsize * BigDecimal::from(start_col),
            src_dims.ymin() + &cellsize * BigDecimal::from(start_row),
            cellsize,
            nrows,
            ncols,
        )?;
        let mut grid = self.create_with_dimensions(cache, nrows, ncols, dimensions)?;

        let row_lo = start_row.max(0);
        let row_hi = end_row.min(source.nrows() - 1);
        let col_lo = start_col.max(0);
        let col_hi = end_col.min(source.ncols() - 1);
        if row_lo <= row_hi && col_lo <= col_hi {
            let layout = *source.layout();
            let src_no_data = source.no_data();
            let dst_no_data = self.no_data;
            for chunk_row in layout.chunk_row(row_lo)..=layout.chunk_row(row_hi) {
                for chunk_col in layout.chunk_col(col_lo)..=layout.chunk_col(col_hi) {
                    let rows = layout.row(chunk_row, 0).max(row_lo)
                        ..=(layout.row(chunk_row, layout.chunk_nrows() - 1)).min(row_hi);
                    let cols = layout.col(chunk_col, 0).max(col_lo)
                        ..=(layout.col(chunk_col, layout.chunk_ncols() - 1)).min(col_hi);
                    let key = source.chunk_key(layout.chunk_id(*rows.start(), *cols.start()));
                    let grid = &mut grid;
                    cache.with_pinned(&[key], |cache| {
                        for row in rows {
                            for col in cols.clone() {
                                let value = source.get_cell(cache, row, col)?;
                                let value = convert(value, src_no_data, dst_no_data);
                                if value != dst_no_data {
                                    grid.init_cell(cache, row - start_row, col - start_col, value)?;
                                }
                            }
                        }
                        Ok(())
                    })?;
                }
            }
        }
        grid.update_stats(cache)?;
        info!(
            grid = grid.id().as_u64(),
            source = source.id().as_u64(),
            nrows,
            ncols,
            "copied {} grid into {} grid",
            S::TYPE_NAME,
            T::TYPE_NAME
        );
        Ok(grid)
    }

    /// Build a grid from a row-major source, consuming it.
    pub fn import<R: RowMajorSource>(&self, cache: &mut ChunkCache, mut source: R) -> GridResult<Grid<T>> {
        let header = source.header().clone();
        let (nrows, ncols) = (header.nrows, header.ncols);
        let mut grid = self.create_with_dimensions(cache, nrows, ncols, header.dimensions)?;
        let no_data = self.no_data;
        let step = (nrows / 10).max(1);

        for row in (0..nrows).rev() {
            for col in 0..ncols {
                let raw = source.next_value()?;
                if header.no_data == Some(raw) || !raw.is_finite() {
                    continue;
                }
                let value = T::from_f64(raw).unwrap_or(no_data);
                if value != no_data {
                    grid.init_cell(cache, row, col, value)?;
                }
            }
            let done = nrows - row;
            if done % step == 0 || done == nrows {
                info!(
                    grid = grid.id().as_u64(),
                    rows = done,
                    "imported {}% of rows",
                    done * 100 / nrows
                );
            }
        }
        grid.update_stats(cache)?;
        Ok(grid)
    }

    /// Build a grid from an ESRI ASCII file.
    pub fn import_ascii(&self, cache: &mut ChunkCache, path: impl AsRef<Path>) -> GridResult<Grid<T>> {
        let path = path.as_ref();
        debug!(path = %path.display(), "importing ASCII grid");
        self.import(cache, AsciiGridReader::open(path)?)
    }

    /// Re-open a grid previously persisted anywhere on disk.
    pub fn open(&self, cache: &mut ChunkCache, path: impl Into<PathBuf>) -> GridResult<Grid<T>> {
        Grid::open(cache, path)
    }

    fn allocate_dir(&self) -> GridResult<GridDir> {
        fs::create_dir_all(&self.base_dir)?;
        let mut n = 0u64;
        loop {
            let path = self.base_dir.join(format!("{}_{}", T::TYPE_NAME, n));
            match fs::create_dir(&path) {
                Ok(()) => return GridDir::create(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn convert<S: GridValue, T: GridValue>(value: S, src_no_data: S, dst_no_data: T) -> T {
    if value == src_no_data || !value.is_finite() {
        return dst_no_data;
    }
    T::from_f64(value.to_f64()).unwrap_or(dst_no_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascii::SourceHeader;
    use crate::chunk::ChunkPolicy;

    struct VecSource {
        header: SourceHeader,
        values: std::vec::IntoIter<f64>,
    }

    impl RowMajorSource for VecSource {
        fn header(&self) -> &SourceHeader {
            &self.header
        }

        fn next_value(&mut self) -> GridResult<f64> {
            self.values
                .next()
                .ok_or_else(|| GridError::Format("exhausted".to_string()))
        }
    }

    fn factory<T: GridValue>(tmp: &tempfile::TempDir, chunk: usize) -> GridFactory<T> {
        GridFactory::new(tmp.path()).with_config(GridConfig::default().with_chunk_size(chunk, chunk))
    }

    #[test]
    fn test_directories_are_numbered() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::default();
        let f = factory::<f64>(&tmp, 4);
        let a = f.create(&mut cache, 2, 2).unwrap();
        let b = f.create(&mut cache, 2, 2).unwrap();
        assert_eq!(a.dir(&cache).unwrap(), tmp.path().join("double_0"));
        assert_eq!(b.dir(&cache).unwrap(), tmp.path().join("double_1"));
        let ints = factory::<i32>(&tmp, 4).create(&mut cache, 2, 2).unwrap();
        assert_eq!(ints.dir(&cache).unwrap(), tmp.path().join("int_0"));
    }

    #[test]
    fn test_nan_no_data_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let f = factory::<f64>(&tmp, 4).with_no_data(-1.0).with_no_data(f64::NAN);
        assert_eq!(f.no_data(), -1.0);
    }

    #[test]
    fn test_create_rejects_bad_chunk_size() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::default();
        let err = factory::<i32>(&tmp, 0).create(&mut cache, 4, 4).unwrap_err();
        assert!(matches!(err, GridError::InvalidDimensions(_)));
    }

    #[test]
    fn test_copy_of_converts_types() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::default();
        let mut src = factory::<f64>(&tmp, 3).create(&mut cache, 5, 5).unwrap();
        src.set_cell(&mut cache, 0, 0, 2.7).unwrap();
        src.set_cell(&mut cache, 4, 4, -1.2).unwrap();

        let mut copy = factory::<i32>(&tmp, 2).copy_of(&mut cache, &src).unwrap();
        assert!(copy.is_same_dimensions(&src));
        assert_eq!(copy.get_cell(&mut cache, 0, 0).unwrap(), 3);
        assert_eq!(copy.get_cell(&mut cache, 4, 4).unwrap(), -1);
        assert_eq!(copy.get_cell(&mut cache, 2, 2).unwrap(), i32::MIN);
        assert_eq!(copy.count(&mut cache).unwrap(), 2);
        assert_eq!(copy.stats().sum(), &BigDecimal::from(2));
    }

    #[test]
    fn test_copy_window_offsets_and_clips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::default();
        let mut src = factory::<i32>(&tmp, 4)
            .with_config(GridConfig::default().with_chunk_size(4, 4).with_policy(ChunkPolicy::Adaptive))
            .create(&mut cache, 10, 10)
            .unwrap();
        for row in 0..10 {
            for col in 0..10 {
                src.set_cell(&mut cache, row, col, (row * 10 + col) as i32).unwrap();
            }
        }

        let mut window = factory::<i32>(&tmp, 3)
            .copy_window(&mut cache, &src, 8, 7, 11, 9)
            .unwrap();
        assert_eq!(window.nrows(), 4);
        assert_eq!(window.ncols(), 3);
        assert_eq!(window.dimensions().xmin(), &BigDecimal::from(7));
        assert_eq!(window.dimensions().ymin(), &BigDecimal::from(8));
        assert_eq!(window.get_cell(&mut cache, 0, 0).unwrap(), 87);
        assert_eq!(window.get_cell(&mut cache, 1, 2).unwrap(), 99);
        assert_eq!(window.get_cell(&mut cache, 2, 0).unwrap(), i32::MIN);
        assert_eq!(window.count(&mut cache).unwrap(), 6);
        assert!(!cache.is_pinned(src.chunk_key(crate::coords::ChunkId::new(2, 1))));
    }

    #[test]
    fn test_empty_window_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::default();
        let f = factory::<i32>(&tmp, 4);
        let src = f.create(&mut cache, 4, 4).unwrap();
        assert!(f.copy_window(&mut cache, &src, 2, 0, 1, 3).is_err());
    }

    #[test]
    fn test_import_places_first_value_top_left() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::default();
        let source = VecSource {
            header: SourceHeader {
                nrows: 2,
                ncols: 3,
                dimensions: Dimensions::unit(2, 3).unwrap(),
                no_data: Some(-9999.0),
            },
            values: vec![1.0, 2.0, -9999.0, 4.0, f64::INFINITY, 6.0].into_iter(),
        };
        let mut grid = factory::<f64>(&tmp, 2).import(&mut cache, source).unwrap();
        assert_eq!(grid.get_cell(&mut cache, 1, 0).unwrap(), 1.0);
        assert_eq!(grid.get_cell(&mut cache, 1, 2).unwrap(), -f64::MAX);
        assert_eq!(grid.get_cell(&mut cache, 0, 0).unwrap(), 4.0);
        assert_eq!(grid.get_cell(&mut cache, 0, 1).unwrap(), -f64::MAX);
        assert_eq!(grid.count(&mut cache).unwrap(), 4);
        assert_eq!(grid.max(&mut cache, false).unwrap(), Some(6.0));
    }

    #[test]
    fn test_import_short_source_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::default();
        let source = VecSource {
            header: SourceHeader {
                nrows: 2,
                ncols: 2,
                dimensions: Dimensions::unit(2, 2).unwrap(),
                no_data: None,
            },
            values: vec![1.0, 2.0, 3.0].into_iter(),
        };
        assert!(factory::<f64>(&tmp, 2).import(&mut cache, source).is_err());
    }
}

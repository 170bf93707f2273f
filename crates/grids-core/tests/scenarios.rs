use std::fs;

use bigdecimal::BigDecimal;
use grids_core::{
    AsciiGridReader, CacheConfig, CellId, ChunkCache, ChunkPolicy, GridConfig, GridError, GridFactory,
    RowMajorSource, StatsMode,
};

fn small_chunks(chunk: usize) -> GridConfig {
    GridConfig::default().with_chunk_size(chunk, chunk)
}

#[test]
fn test_default_grid_stats_after_one_write() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cache = ChunkCache::default();
    let mut grid = GridFactory::<f64>::new(tmp.path()).create(&mut cache, 1000, 1000).unwrap();
    assert_eq!(grid.n_chunk_rows(), 2);
    assert_eq!(grid.n_chunk_cols(), 2);

    grid.set_cell(&mut cache, 5, 5, 3.0).unwrap();
    assert_eq!(grid.count(&mut cache).unwrap(), 1);
    assert_eq!(grid.sum(&mut cache).unwrap(), BigDecimal::from(3));
    assert_eq!(grid.min(&mut cache, false).unwrap(), Some(3.0));
    assert_eq!(grid.max(&mut cache, false).unwrap(), Some(3.0));
    assert_eq!(grid.get_cell(&mut cache, 5, 6).unwrap(), -f64::MAX);
}

#[test]
fn test_two_grids_share_a_small_budget() {
    let tmp = tempfile::tempdir().unwrap();
    let budget = 6 * 1024;
    let mut cache = ChunkCache::new(CacheConfig {
        memory_budget: budget,
        memory_reserve: 0,
    });
    let factory = GridFactory::<i32>::new(tmp.path()).with_config(small_chunks(16));
    let mut a = factory.create(&mut cache, 64, 64).unwrap();
    let mut b = factory.create(&mut cache, 64, 64).unwrap();

    for row in 0..64 {
        for col in 0..64 {
            a.set_cell(&mut cache, row, col, (row * 64 + col) as i32).unwrap();
            b.set_cell(&mut cache, row, col, -((row * 64 + col) as i32)).unwrap();
        }
        assert!(cache.resident_bytes() <= budget);
    }
    assert!(cache.resident_chunks() < 32);

    for row in 0..64 {
        for col in 0..64 {
            let expected = (row * 64 + col) as i32;
            assert_eq!(a.get_cell(&mut cache, row, col).unwrap(), expected);
            assert_eq!(b.get_cell(&mut cache, row, col).unwrap(), -expected);
        }
    }
    assert!(cache.resident_bytes() <= budget);
}

#[test]
fn test_budget_too_small_for_one_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cache = ChunkCache::new(CacheConfig {
        memory_budget: 64,
        memory_reserve: 0,
    });
    let factory = GridFactory::<f64>::new(tmp.path()).with_config(small_chunks(32));
    let mut grid = factory.create(&mut cache, 32, 32).unwrap();
    let err = grid.set_cell(&mut cache, 0, 0, 1.0).unwrap_err();
    assert!(matches!(err, GridError::ResourceExhausted { .. }));
}

#[test]
fn test_nearest_value_ten_cells_away() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cache = ChunkCache::default();
    let factory = GridFactory::<f64>::new(tmp.path()).with_config(small_chunks(16));
    let mut grid = factory.create(&mut cache, 64, 64).unwrap();
    grid.set_cell(&mut cache, 20, 30, 2.5).unwrap();

    let found = grid.nearest(&mut cache, 20, 20).unwrap().unwrap();
    assert_eq!(found.cells, vec![CellId::new(20, 30)]);
    assert!((found.distance - 10.0).abs() < 1e-9);
    assert_eq!(grid.nearest_value(&mut cache, 20.5, 20.5).unwrap(), Some(2.5));
}

#[test]
fn test_lazy_stats_refresh_on_demand() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cache = ChunkCache::default();
    let factory = GridFactory::<i32>::new(tmp.path())
        .with_config(small_chunks(4).with_stats_mode(StatsMode::Lazy));
    let mut grid = factory.create(&mut cache, 10, 10).unwrap();

    grid.set_cell(&mut cache, 1, 1, 5).unwrap();
    assert!(grid.stats().is_stale());
    assert_eq!(grid.count(&mut cache).unwrap(), 1);
    assert!(!grid.stats().is_stale());

    grid.set_cell(&mut cache, 2, 2, 1).unwrap();
    assert_eq!(grid.min(&mut cache, false).unwrap(), Some(5));
    assert_eq!(grid.min(&mut cache, true).unwrap(), Some(1));
    assert_eq!(grid.count(&mut cache).unwrap(), 2);
    assert_eq!(grid.sum(&mut cache).unwrap(), BigDecimal::from(6));
}

#[test]
fn test_copy_between_types_and_windows() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cache = ChunkCache::default();
    let ints = GridFactory::<i32>::new(tmp.path())
        .with_config(small_chunks(4).with_policy(ChunkPolicy::Adaptive));
    let mut source = ints.create(&mut cache, 12, 12).unwrap();
    for i in 0..12 {
        source.set_cell(&mut cache, i, i, i as i32).unwrap();
    }

    let doubles = GridFactory::<f64>::new(tmp.path()).with_config(small_chunks(5));
    let mut copy = doubles.copy_of(&mut cache, &source).unwrap();
    assert!(copy.is_same_dimensions(&source));
    assert!(!copy.is_same_dimensions_and_chunks(&source));
    assert_eq!(copy.get_cell(&mut cache, 7, 7).unwrap(), 7.0);
    assert_eq!(copy.get_cell(&mut cache, 7, 6).unwrap(), -f64::MAX);
    assert_eq!(copy.count(&mut cache).unwrap(), 12);

    let mut window = doubles.copy_window(&mut cache, &source, 3, 3, 5, 5).unwrap();
    assert_eq!(window.nrows(), 3);
    assert_eq!(window.get_cell(&mut cache, 0, 0).unwrap(), 3.0);
    assert_eq!(window.get_cell(&mut cache, 2, 2).unwrap(), 5.0);
    assert_eq!(window.count(&mut cache).unwrap(), 3);
    assert_eq!(window.dimensions().xmin(), &BigDecimal::from(3));
}

#[test]
fn test_close_and_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cache = ChunkCache::new(CacheConfig {
        memory_budget: 4 * 1024,
        memory_reserve: 0,
    });
    let factory = GridFactory::<i32>::new(tmp.path()).with_config(small_chunks(8));
    let mut grid = factory.create(&mut cache, 40, 40).unwrap();
    for row in 0..40 {
        grid.set_cell(&mut cache, row, row, row as i32).unwrap();
    }
    grid.set_cell(&mut cache, 39, 0, 100).unwrap();
    let dir = grid.dir(&cache).unwrap();
    grid.close(&mut cache).unwrap();
    assert_eq!(cache.resident_bytes(), 0);

    let mut reopened = factory.open(&mut cache, &dir).unwrap();
    assert_eq!(reopened.get_cell(&mut cache, 17, 17).unwrap(), 17);
    assert_eq!(reopened.get_cell(&mut cache, 39, 0).unwrap(), 100);
    assert_eq!(reopened.get_cell(&mut cache, 17, 18).unwrap(), i32::MIN);
    assert_eq!(reopened.count(&mut cache).unwrap(), 41);
    assert_eq!(reopened.max(&mut cache, false).unwrap(), Some(100));
}

#[test]
fn test_ascii_import_and_export() {
    let tmp = tempfile::tempdir().unwrap();
    let asc = tmp.path().join("in.asc");
    fs::write(
        &asc,
        "ncols 4\nnrows 3\nxllcorner 100\nyllcorner 200\ncellsize 10\nNODATA_value -9999\n\
         1 2 3 4\n5 -9999 7 8\n9 10 11 12\n",
    )
    .unwrap();

    let mut cache = ChunkCache::default();
    let factory = GridFactory::<f64>::new(tmp.path().join("store")).with_config(small_chunks(2));
    let mut grid = factory.import_ascii(&mut cache, &asc).unwrap();
    assert_eq!(grid.get_cell(&mut cache, 2, 0).unwrap(), 1.0);
    assert_eq!(grid.get_cell(&mut cache, 0, 3).unwrap(), 12.0);
    assert_eq!(grid.get_cell(&mut cache, 1, 1).unwrap(), -f64::MAX);
    assert_eq!(grid.get_cell_at(&mut cache, 135.0, 215.0).unwrap(), 8.0);
    assert_eq!(grid.count(&mut cache).unwrap(), 11);

    let out = tmp.path().join("out.asc");
    grids_core::export_ascii(&grid, &mut cache, &out).unwrap();
    let mut reader = AsciiGridReader::open(&out).unwrap();
    assert_eq!(reader.header().nrows, 3);
    assert_eq!(reader.header().dimensions.xmin(), &BigDecimal::from(100));
    let values: Vec<f64> = (0..12).map(|_| reader.next_value().unwrap()).collect();
    assert_eq!(values[0], 1.0);
    assert_eq!(values[5], -f64::MAX);
    assert_eq!(values[11], 12.0);
}

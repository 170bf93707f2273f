use std::path::Path;

use anyhow::{anyhow, Context};
use grids_core::{export_ascii, ChunkCache, Grid, GridDir, GridFactory, GridValue};
use tracing::info;

use crate::cli::ValueType;
use crate::config::Config;

pub fn import(config: &Config, asc: &Path, store: &Path, value_type: ValueType) -> anyhow::Result<()> {
    match value_type {
        ValueType::Double => import_as::<f64>(config, asc, store),
        ValueType::Int => import_as::<i32>(config, asc, store),
        ValueType::Boolean => import_as::<bool>(config, asc, store),
    }
}

fn import_as<T: GridValue>(config: &Config, asc: &Path, store: &Path) -> anyhow::Result<()> {
    let mut cache = ChunkCache::new(config.cache);
    let factory = GridFactory::<T>::new(store).with_config(config.grid);
    let grid = factory
        .import_ascii(&mut cache, asc)
        .with_context(|| format!("importing {}", asc.display()))?;
    let dir = grid.dir(&cache)?;
    info!(rows = grid.nrows(), cols = grid.ncols(), "import complete");
    grid.close(&mut cache)?;
    println!("{}", dir.display());
    Ok(())
}

pub fn stats(config: &Config, dir: &Path) -> anyhow::Result<()> {
    match value_type_of(dir)? {
        ValueType::Double => stats_of::<f64>(config, dir),
        ValueType::Int => stats_of::<i32>(config, dir),
        ValueType::Boolean => stats_of::<bool>(config, dir),
    }
}

fn stats_of<T: GridValue>(config: &Config, dir: &Path) -> anyhow::Result<()> {
    let mut cache = ChunkCache::new(config.cache);
    let mut grid: Grid<T> = Grid::open(&mut cache, dir)?;
    let count = grid.count(&mut cache)?;
    let sum = grid.sum(&mut cache)?;
    let mean = grid.mean(&mut cache)?;
    let min = grid.min(&mut cache, false)?;
    let max = grid.max(&mut cache, false)?;
    grid.close(&mut cache)?;

    println!("type   {}", T::TYPE_NAME);
    println!("count  {}", count);
    println!("sum    {}", sum);
    println!("mean   {}", show(mean));
    println!("min    {}", show(min));
    println!("max    {}", show(max));
    Ok(())
}

pub fn get(config: &Config, dir: &Path, row: i64, col: i64) -> anyhow::Result<()> {
    match value_type_of(dir)? {
        ValueType::Double => get_of::<f64>(config, dir, row, col),
        ValueType::Int => get_of::<i32>(config, dir, row, col),
        ValueType::Boolean => get_of::<bool>(config, dir, row, col),
    }
}

fn get_of<T: GridValue>(config: &Config, dir: &Path, row: i64, col: i64) -> anyhow::Result<()> {
    let mut cache = ChunkCache::new(config.cache);
    let grid: Grid<T> = Grid::open(&mut cache, dir)?;
    let value = grid.get_cell(&mut cache, row, col)?;
    if value == grid.no_data() {
        println!("no data");
    } else {
        println!("{}", value);
    }
    Ok(())
}

pub fn nearest(config: &Config, dir: &Path, x: f64, y: f64) -> anyhow::Result<()> {
    match value_type_of(dir)? {
        ValueType::Double => nearest_of::<f64>(config, dir, x, y),
        ValueType::Int => nearest_of::<i32>(config, dir, x, y),
        ValueType::Boolean => nearest_of::<bool>(config, dir, x, y),
    }
}

fn nearest_of<T: GridValue>(config: &Config, dir: &Path, x: f64, y: f64) -> anyhow::Result<()> {
    let mut cache = ChunkCache::new(config.cache);
    let grid: Grid<T> = Grid::open(&mut cache, dir)?;
    let Some(found) = grid.nearest_at(&mut cache, x, y)? else {
        println!("no data");
        return Ok(());
    };
    println!("distance  {}", found.distance);
    println!("value     {}", found.mean_value());
    for (cell, value) in found.cells.iter().zip(&found.values) {
        println!("cell      {} = {}", cell, value);
    }
    Ok(())
}

pub fn export(config: &Config, dir: &Path, asc: &Path) -> anyhow::Result<()> {
    match value_type_of(dir)? {
        ValueType::Double => export_of::<f64>(config, dir, asc),
        ValueType::Int => export_of::<i32>(config, dir, asc),
        ValueType::Boolean => export_of::<bool>(config, dir, asc),
    }
}

fn export_of<T: GridValue>(config: &Config, dir: &Path, asc: &Path) -> anyhow::Result<()> {
    let mut cache = ChunkCache::new(config.cache);
    let grid: Grid<T> = Grid::open(&mut cache, dir)?;
    export_ascii(&grid, &mut cache, asc).with_context(|| format!("writing {}", asc.display()))?;
    info!(path = %asc.display(), "export complete");
    Ok(())
}

fn value_type_of(dir: &Path) -> anyhow::Result<ValueType> {
    let name = GridDir::open(dir)?.read_type_name()?;
    ValueType::from_type_name(&name)
        .ok_or_else(|| anyhow!("{} holds unsupported values: {}", dir.display(), name))
}

fn show<V: std::fmt::Display>(value: Option<V>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_import_then_query() {
        let tmp = tempfile::tempdir().unwrap();
        let asc = tmp.path().join("small.asc");
        fs::write(&asc, "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n1 2\n3 -9999\n").unwrap();
        let store = tmp.path().join("store");
        let config = Config::default();

        import(&config, &asc, &store, ValueType::Int).unwrap();
        let dir = store.join("int_0");
        assert_eq!(value_type_of(&dir).unwrap(), ValueType::Int);
        stats(&config, &dir).unwrap();
        get(&config, &dir, 0, 0).unwrap();
        nearest(&config, &dir, 1.5, 0.5).unwrap();

        let out = tmp.path().join("out.asc");
        export(&config, &dir, &out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("ncols         2\n"));
        assert!(text.ends_with("1 2\n3 -2147483648\n"));
    }

    #[test]
    fn test_not_a_grid_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(stats(&Config::default(), tmp.path()).is_err());
    }
}

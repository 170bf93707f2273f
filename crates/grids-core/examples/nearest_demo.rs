use grids_core::{CacheConfig, ChunkCache, ChunkPolicy, GridConfig, GridFactory};

fn main() {
    let base = std::env::temp_dir().join("grids-nearest-demo");

    // A small cache so the demo actually evicts chunks
    let mut cache = ChunkCache::new(CacheConfig {
        memory_budget: 64 * 1024,
        memory_reserve: 0,
    });
    let factory = GridFactory::<f64>::new(&base).with_config(
        GridConfig::default()
            .with_chunk_size(32, 32)
            .with_policy(ChunkPolicy::Adaptive),
    );
    let mut grid = factory.create(&mut cache, 256, 256).unwrap();

    // Example 1: sparse samples along a diagonal
    println!("=== Example 1: writing samples ===");
    for i in (0..256).step_by(37) {
        grid.set_cell(&mut cache, i, i, i as f64 / 10.0).unwrap();
    }
    println!(
        "count = {}, sum = {}, resident = {} bytes in {} chunks",
        grid.count(&mut cache).unwrap(),
        grid.sum(&mut cache).unwrap(),
        cache.resident_bytes(),
        cache.resident_chunks()
    );

    // Example 2: nearest populated cells to a few points
    println!("\n=== Example 2: nearest values ===");
    for (x, y) in [(0.5, 0.5), (100.0, 20.0), (250.0, 10.0), (-40.0, 300.0)] {
        match grid.nearest_at(&mut cache, x, y).unwrap() {
            Some(found) => println!(
                "  ({}, {}) -> {:?} at distance {:.3}, value {}",
                x,
                y,
                found.cells,
                found.distance,
                found.mean_value()
            ),
            None => println!("  ({}, {}) -> no data", x, y),
        }
    }

    // Example 3: every chunk that holds more than one value
    println!("\n=== Example 3: chunks worth caching ===");
    for chunk in grid.worth_caching(&cache).unwrap() {
        println!("  chunk {}", chunk);
    }

    grid.delete(&mut cache).unwrap();
}

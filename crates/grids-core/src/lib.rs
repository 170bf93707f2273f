pub mod ascii;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod coords;
pub mod dimensions;
pub mod error;
pub mod factory;
pub mod grid;
pub mod iter;
pub mod layout;
pub mod nearest;
pub mod stats;
pub mod store;
pub mod value;

pub use ascii::{export_ascii, write_ascii, AsciiGridReader, RowMajorSource, SourceHeader};
pub use cache::{ChunkCache, ChunkKey, GridId};
pub use chunk::{Chunk, ChunkKind, ChunkPolicy, DenseChunk, SparseChunk};
pub use config::{CacheConfig, GridConfig};
pub use coords::{CellId, ChunkId};
pub use dimensions::Dimensions;
pub use error::{GridError, GridResult};
pub use factory::GridFactory;
pub use grid::Grid;
pub use iter::CellIter;
pub use layout::{ChunkLayout, DEFAULT_CHUNK_SIZE};
pub use nearest::Nearest;
pub use stats::{Stats, StatsMode};
pub use store::{GridDir, GridHeader, StoredChunk};
pub use value::GridValue;

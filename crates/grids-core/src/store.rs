//! Backing directory of a grid.
//!
//! ```text
//! <grid dir>/
//!   header.json      type, layout, dimensions, no-data, statistics, chunk index
//!   <row>_<col>      one serialized chunk per stored chunk
//! ```

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkPolicy};
use crate::coords::ChunkId;
use crate::dimensions::Dimensions;
use crate::error::{GridError, GridResult};
use crate::layout::ChunkLayout;
use crate::stats::Stats;
use crate::value::GridValue;

pub const HEADER_FILE: &str = "header.json";

/// A chunk whose content lives in a chunk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: ChunkId,
    /// Resident size estimate when the chunk was written.
    pub bytes: usize,
}

/// Everything needed to re-open a grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct GridHeader<T: GridValue> {
    pub type_name: String,
    pub layout: ChunkLayout,
    pub dimensions: Dimensions,
    pub no_data: T,
    pub policy: ChunkPolicy,
    pub stats: Stats<T>,
    pub stored_chunks: Vec<StoredChunk>,
    /// Uniform chunks whose value is not no-data.
    pub uniform_chunks: Vec<(ChunkId, T)>,
}

#[derive(Deserialize)]
struct HeaderType {
    type_name: String,
}

/// Directory holding one grid's header and chunk files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridDir {
    path: PathBuf,
}

impl GridDir {
    /// Use `path` as a grid directory, creating it if needed.
    pub fn create(path: impl Into<PathBuf>) -> GridResult<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// An existing grid directory; fails if it has no header.
    pub fn open(path: impl Into<PathBuf>) -> GridResult<Self> {
        let path = path.into();
        let dir = Self { path };
        if !dir.header_path().is_file() {
            return Err(GridError::Format(format!(
                "{} has no {}",
                dir.path.display(),
                HEADER_FILE
            )));
        }
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header_path(&self) -> PathBuf {
        self.path.join(HEADER_FILE)
    }

    pub fn chunk_path(&self, id: ChunkId) -> PathBuf {
        self.path.join(id.file_name())
    }

    pub fn has_chunk(&self, id: ChunkId) -> bool {
        self.chunk_path(id).is_file()
    }

    pub fn write_chunk<T: GridValue>(&self, id: ChunkId, chunk: &Chunk<T>) -> GridResult<()> {
        write_json(&self.chunk_path(id), chunk)
    }

    pub fn read_chunk<T: GridValue>(&self, id: ChunkId) -> GridResult<Chunk<T>> {
        let file = match fs::File::open(self.chunk_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GridError::MissingChunk {
                    chunk: id,
                    dir: self.path.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Remove a chunk file if present.
    pub fn remove_chunk(&self, id: ChunkId) -> GridResult<()> {
        match fs::remove_file(self.chunk_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_header<T: GridValue>(&self, header: &GridHeader<T>) -> GridResult<()> {
        let tmp = self.path.join(format!("{}.tmp", HEADER_FILE));
        write_json(&tmp, header)?;
        fs::rename(&tmp, self.header_path())?;
        Ok(())
    }

    pub fn read_header<T: GridValue>(&self) -> GridResult<GridHeader<T>> {
        let file = fs::File::open(self.header_path())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Scalar type recorded in the header, without decoding the rest.
    pub fn read_type_name(&self) -> GridResult<String> {
        let file = fs::File::open(self.header_path())?;
        let header: HeaderType = serde_json::from_reader(BufReader::new(file))?;
        Ok(header.type_name)
    }

    /// Delete the directory and everything in it.
    pub fn delete(self) -> GridResult<()> {
        fs::remove_dir_all(&self.path)?;
        Ok(())
    }
}

fn write_json<S: Serialize>(path: &Path, value: &S) -> GridResult<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

//! Chunk residency shared by every open grid.
//!
//! Chunk data lives in per-grid arenas owned by the [`ChunkCache`]; a grid
//! value is only a handle naming its arena by [`GridId`]. Each arena slot is
//! either resident (with a dirty flag) or stored in the grid's backing
//! directory. Non-uniform resident chunks are tracked in one LRU list across
//! all grids and evicted, least recently used first, whenever a load or
//! write would push the resident estimate over the memory budget.
//!
//! Uniform chunks hold nothing beyond their fill value, so they are never
//! tracked or evicted.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};

use lru::LruCache;
use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkPolicy};
use crate::config::CacheConfig;
use crate::coords::ChunkId;
use crate::error::{GridError, GridResult};
use crate::layout::ChunkLayout;
use crate::store::{GridDir, StoredChunk};
use crate::value::GridValue;

/// Handle of a grid registered with a [`ChunkCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridId(u64);

impl GridId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A chunk of a specific grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub grid: GridId,
    pub chunk: ChunkId,
}

impl ChunkKey {
    pub fn new(grid: GridId, chunk: ChunkId) -> Self {
        Self { grid, chunk }
    }
}

enum Slot<T: GridValue> {
    Resident { chunk: Chunk<T>, dirty: bool },
    Stored { bytes: usize },
}

/// Chunks of one grid.
pub(crate) struct ChunkArena<T: GridValue> {
    dir: GridDir,
    layout: ChunkLayout,
    slots: HashMap<ChunkId, Slot<T>>,
    worth_caching: BTreeSet<ChunkId>,
}

impl<T: GridValue> ChunkArena<T> {
    fn new(dir: GridDir, layout: ChunkLayout) -> Self {
        Self {
            dir,
            layout,
            slots: HashMap::new(),
            worth_caching: BTreeSet::new(),
        }
    }

    fn set_resident(&mut self, id: ChunkId, chunk: Chunk<T>, dirty: bool) {
        if chunk.is_uniform() {
            self.worth_caching.remove(&id);
        } else {
            self.worth_caching.insert(id);
        }
        self.slots.insert(id, Slot::Resident { chunk, dirty });
    }

    /// Read a chunk file, rejecting content whose shape does not match the
    /// chunk's place in the layout.
    fn load(&self, id: ChunkId) -> GridResult<Chunk<T>> {
        let chunk: Chunk<T> = self.dir.read_chunk(id)?;
        let expected = (self.layout.chunk_nrows_of(id.row), self.layout.chunk_ncols_of(id.col));
        if (chunk.nrows(), chunk.ncols()) != expected {
            return Err(GridError::Format(format!(
                "chunk {} in {} is {}x{}, expected {}x{}",
                id,
                self.dir.path().display(),
                chunk.nrows(),
                chunk.ncols(),
                expected.0,
                expected.1
            )));
        }
        Ok(chunk)
    }

    fn resident(&self, id: ChunkId) -> GridResult<&Chunk<T>> {
        match self.slots.get(&id) {
            Some(Slot::Resident { chunk, .. }) => Ok(chunk),
            Some(Slot::Stored { .. }) => Err(GridError::MissingChunk {
                chunk: id,
                dir: self.dir.path().to_path_buf(),
            }),
            None => Err(GridError::UnknownChunk(id)),
        }
    }

    /// Chunk index for the grid header: stored chunks with their size
    /// estimates, and uniform chunks whose value differs from `no_data`.
    ///
    /// Only meaningful straight after a flush, when every non-uniform chunk
    /// has a current chunk file.
    pub(crate) fn index(&self, no_data: T) -> (Vec<StoredChunk>, Vec<(ChunkId, T)>) {
        let mut stored = Vec::new();
        let mut uniform = Vec::new();
        for (&id, slot) in &self.slots {
            match slot {
                Slot::Stored { bytes } => stored.push(StoredChunk { id, bytes: *bytes }),
                Slot::Resident { chunk, .. } => match chunk.uniform_value() {
                    Some(fill) if fill != no_data => uniform.push((id, fill)),
                    Some(_) => {}
                    None => stored.push(StoredChunk {
                        id,
                        bytes: chunk.memory_estimate(),
                    }),
                },
            }
        }
        stored.sort_by_key(|s| s.id);
        uniform.sort_by_key(|(id, _)| *id);
        (stored, uniform)
    }

    pub(crate) fn worth_caching(&self) -> &BTreeSet<ChunkId> {
        &self.worth_caching
    }
}

/// Type-erased view of a [`ChunkArena`].
trait Store {
    /// Write a resident chunk out if needed and drop it from memory.
    fn evict(&mut self, id: ChunkId) -> GridResult<()>;

    /// Bring every chunk file up to date.
    fn flush(&mut self) -> GridResult<()>;

    fn is_resident(&self, id: ChunkId) -> bool;

    fn dir(&self) -> &GridDir;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: GridValue> Store for ChunkArena<T> {
    fn evict(&mut self, id: ChunkId) -> GridResult<()> {
        let bytes = match self.slots.get(&id) {
            Some(Slot::Resident { chunk, dirty }) => {
                if chunk.is_uniform() {
                    return Ok(());
                }
                if *dirty || !self.dir.has_chunk(id) {
                    self.dir.write_chunk(id, chunk)?;
                }
                chunk.memory_estimate()
            }
            _ => return Ok(()),
        };
        self.slots.insert(id, Slot::Stored { bytes });
        Ok(())
    }

    fn flush(&mut self) -> GridResult<()> {
        for (&id, slot) in self.slots.iter_mut() {
            if let Slot::Resident { chunk, dirty } = slot {
                if !*dirty {
                    continue;
                }
                if chunk.is_uniform() {
                    self.dir.remove_chunk(id)?;
                } else {
                    self.dir.write_chunk(id, chunk)?;
                }
                *dirty = false;
            }
        }
        Ok(())
    }

    fn is_resident(&self, id: ChunkId) -> bool {
        matches!(self.slots.get(&id), Some(Slot::Resident { .. }))
    }

    fn dir(&self) -> &GridDir {
        &self.dir
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owner of all chunk data of all open grids.
///
/// Every grid operation takes `&mut ChunkCache`; any of them may evict
/// chunks of another grid registered with the same cache.
pub struct ChunkCache {
    config: CacheConfig,
    arenas: HashMap<GridId, Box<dyn Store>>,
    lru: LruCache<ChunkKey, usize>,
    pinned: HashMap<ChunkKey, usize>,
    resident_bytes: usize,
    next_id: u64,
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ChunkCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            arenas: HashMap::new(),
            lru: LruCache::unbounded(),
            pinned: HashMap::new(),
            resident_bytes: 0,
            next_id: 0,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Estimated bytes of resident non-uniform chunks.
    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    /// Number of resident non-uniform chunks.
    pub fn resident_chunks(&self) -> usize {
        self.lru.len()
    }

    pub fn is_resident(&self, key: ChunkKey) -> bool {
        self.arenas
            .get(&key.grid)
            .is_some_and(|arena| arena.is_resident(key.chunk))
    }

    pub fn is_pinned(&self, key: ChunkKey) -> bool {
        self.pinned.contains_key(&key)
    }

    /// Whether `grid` has an arena in this cache.
    pub fn is_open(&self, grid: GridId) -> bool {
        self.arenas.contains_key(&grid)
    }

    /// Protect a chunk from eviction. Pins nest; each `pin` needs an `unpin`.
    pub fn pin(&mut self, key: ChunkKey) {
        *self.pinned.entry(key).or_insert(0) += 1;
    }

    pub fn unpin(&mut self, key: ChunkKey) {
        if let Some(count) = self.pinned.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.pinned.remove(&key);
            }
        }
    }

    /// Run `f` with `keys` pinned. The pins are released whether or not `f`
    /// succeeds.
    pub fn with_pinned<R>(
        &mut self,
        keys: &[ChunkKey],
        f: impl FnOnce(&mut Self) -> GridResult<R>,
    ) -> GridResult<R> {
        for key in keys {
            self.pin(*key);
        }
        let result = f(self);
        for key in keys {
            self.unpin(*key);
        }
        result
    }

    /// Create an arena for a new grid.
    ///
    /// `resident` chunks start in memory and are written out on eviction or
    /// flush; `stored` chunks are loaded from `dir` on first access.
    pub(crate) fn register<T: GridValue>(
        &mut self,
        dir: GridDir,
        layout: ChunkLayout,
        resident: impl IntoIterator<Item = (ChunkId, Chunk<T>)>,
        stored: impl IntoIterator<Item = StoredChunk>,
        dirty: bool,
    ) -> GridId {
        let id = GridId(self.next_id);
        self.next_id += 1;

        let mut arena = ChunkArena::new(dir, layout);
        let mut tracked = Vec::new();
        for (chunk_id, chunk) in resident {
            if !chunk.is_uniform() {
                tracked.push((ChunkKey::new(id, chunk_id), chunk.memory_estimate()));
            }
            arena.set_resident(chunk_id, chunk, dirty);
        }
        for s in stored {
            arena.worth_caching.insert(s.id);
            arena.slots.insert(s.id, Slot::Stored { bytes: s.bytes });
        }
        self.arenas.insert(id, Box::new(arena));
        for (key, bytes) in tracked {
            self.account(key, Some(bytes));
        }
        debug!(grid = id.0, "registered grid");
        id
    }

    pub(crate) fn arena<T: GridValue>(&self, grid: GridId) -> GridResult<&ChunkArena<T>> {
        self.arenas
            .get(&grid)
            .ok_or(GridError::UnknownGrid(grid.0))?
            .as_any()
            .downcast_ref::<ChunkArena<T>>()
            .ok_or(GridError::TypeMismatch(grid.0, T::TYPE_NAME))
    }

    fn arena_mut<T: GridValue>(&mut self, grid: GridId) -> GridResult<&mut ChunkArena<T>> {
        self.arenas
            .get_mut(&grid)
            .ok_or(GridError::UnknownGrid(grid.0))?
            .as_any_mut()
            .downcast_mut::<ChunkArena<T>>()
            .ok_or(GridError::TypeMismatch(grid.0, T::TYPE_NAME))
    }

    pub fn grid_dir(&self, grid: GridId) -> GridResult<&GridDir> {
        self.arenas
            .get(&grid)
            .map(|arena| arena.dir())
            .ok_or(GridError::UnknownGrid(grid.0))
    }

    /// Make a chunk resident, loading it from disk if it was evicted.
    pub fn ensure_resident<T: GridValue>(&mut self, grid: GridId, chunk: ChunkId) -> GridResult<()> {
        let key = ChunkKey::new(grid, chunk);
        let stored = match self.arena::<T>(grid)?.slots.get(&chunk) {
            None => return Err(GridError::UnknownChunk(chunk)),
            Some(Slot::Resident { .. }) => None,
            Some(Slot::Stored { bytes }) => Some(*bytes),
        };
        let Some(bytes) = stored else {
            self.lru.get(&key);
            return Ok(());
        };

        self.make_room(bytes, Some(key))?;
        let arena = self.arena_mut::<T>(grid)?;
        let loaded = arena.load(chunk)?;
        debug!(grid = grid.0, %chunk, "loaded chunk");
        let tracked = (!loaded.is_uniform()).then(|| loaded.memory_estimate());
        arena.set_resident(chunk, loaded, false);
        self.account(key, tracked);
        Ok(())
    }

    /// Read from a chunk, loading it first if needed.
    pub fn read<T: GridValue, R>(
        &mut self,
        grid: GridId,
        chunk: ChunkId,
        f: impl FnOnce(&Chunk<T>) -> R,
    ) -> GridResult<R> {
        self.ensure_resident::<T>(grid, chunk)?;
        Ok(f(self.arena::<T>(grid)?.resident(chunk)?))
    }

    /// Modify a chunk, loading it first if needed.
    ///
    /// Room for a full dense array is made before a uniform chunk is
    /// touched, since the write may materialise one. The chunk's estimate is
    /// re-accounted afterwards.
    pub fn update<T: GridValue, R>(
        &mut self,
        grid: GridId,
        chunk: ChunkId,
        f: impl FnOnce(&mut Chunk<T>) -> R,
    ) -> GridResult<R> {
        let key = ChunkKey::new(grid, chunk);
        self.ensure_resident::<T>(grid, chunk)?;

        let growth = match self.arena::<T>(grid)?.resident(chunk)? {
            c if c.is_uniform() => c.dense_bytes(),
            _ => 0,
        };
        if growth > 0 {
            self.make_room(growth, Some(key))?;
        }

        let arena = self.arena_mut::<T>(grid)?;
        let (result, tracked, uniform) = match arena.slots.get_mut(&chunk) {
            Some(Slot::Resident { chunk: c, dirty }) => {
                let result = f(c);
                *dirty = true;
                let uniform = c.is_uniform();
                (result, (!uniform).then(|| c.memory_estimate()), uniform)
            }
            _ => return Err(GridError::UnknownChunk(chunk)),
        };
        if uniform {
            arena.worth_caching.remove(&chunk);
        } else {
            arena.worth_caching.insert(chunk);
        }
        self.account(key, tracked);

        if let Err(e) = self.make_room(0, Some(key)) {
            warn!(grid = grid.0, %chunk, error = %e, "resident chunks exceed memory budget");
        }
        Ok(result)
    }

    /// Write one cell the way a grid does, returning its previous value.
    ///
    /// Writing a uniform chunk's own value changes nothing, so it needs no
    /// room and leaves the chunk clean.
    pub fn write<T: GridValue>(
        &mut self,
        grid: GridId,
        chunk: ChunkId,
        cell: (usize, usize),
        value: T,
        policy: ChunkPolicy,
    ) -> GridResult<T> {
        self.ensure_resident::<T>(grid, chunk)?;
        if self.arena::<T>(grid)?.resident(chunk)?.uniform_value() == Some(value) {
            return Ok(value);
        }
        self.update::<T, _>(grid, chunk, |c| c.write(cell.0, cell.1, value, policy))
    }

    /// Replace a chunk outright without loading its previous content.
    pub fn replace<T: GridValue>(&mut self, grid: GridId, chunk: ChunkId, content: Chunk<T>) -> GridResult<()> {
        let key = ChunkKey::new(grid, chunk);
        let tracked = (!content.is_uniform()).then(|| content.memory_estimate());
        if let Some(bytes) = tracked {
            self.account(key, None);
            self.make_room(bytes, Some(key))?;
        }
        let arena = self.arena_mut::<T>(grid)?;
        if !arena.slots.contains_key(&chunk) {
            return Err(GridError::UnknownChunk(chunk));
        }
        arena.set_resident(chunk, content, true);
        self.account(key, tracked);
        Ok(())
    }

    /// Evict least recently used chunks until `bytes` more fit within the
    /// budget and reserve. `exclude` is never evicted.
    ///
    /// When nothing evictable is left the reserve is given up and the check
    /// retried once before failing with [`GridError::ResourceExhausted`].
    pub fn make_room(&mut self, bytes: usize, exclude: Option<ChunkKey>) -> GridResult<()> {
        let budget = self.config.memory_budget;
        let mut reserve = self.config.memory_reserve;
        loop {
            if self.resident_bytes.saturating_add(bytes).saturating_add(reserve) <= budget {
                return Ok(());
            }
            match self.victim(exclude) {
                Some(key) => self.evict(key)?,
                None if reserve > 0 => {
                    debug!(bytes, resident = self.resident_bytes, "giving up memory reserve");
                    reserve = 0;
                }
                None => {
                    return Err(GridError::ResourceExhausted {
                        needed: bytes,
                        resident: self.resident_bytes,
                        budget,
                    })
                }
            }
        }
    }

    fn victim(&self, exclude: Option<ChunkKey>) -> Option<ChunkKey> {
        self.lru
            .iter()
            .rev()
            .map(|(key, _)| *key)
            .find(|key| Some(*key) != exclude && !self.pinned.contains_key(key))
    }

    /// Write out and drop one resident chunk.
    pub fn evict(&mut self, key: ChunkKey) -> GridResult<()> {
        if self.is_pinned(key) {
            return Ok(());
        }
        let arena = self
            .arenas
            .get_mut(&key.grid)
            .ok_or(GridError::UnknownGrid(key.grid.0))?;
        arena.evict(key.chunk)?;
        if !arena.is_resident(key.chunk) {
            self.account(key, None);
            debug!(grid = key.grid.0, chunk = %key.chunk, "evicted chunk");
        }
        Ok(())
    }

    /// Evict every unpinned chunk of `grid`.
    pub fn evict_all(&mut self, grid: GridId) -> GridResult<()> {
        for key in self.keys_of(grid) {
            self.evict(key)?;
        }
        Ok(())
    }

    /// Bring the chunk files of `grid` up to date without evicting.
    pub fn flush(&mut self, grid: GridId) -> GridResult<()> {
        self.arenas
            .get_mut(&grid)
            .ok_or(GridError::UnknownGrid(grid.0))?
            .flush()
    }

    /// Flush and drop the arena of `grid`.
    pub fn close(&mut self, grid: GridId) -> GridResult<()> {
        self.flush(grid)?;
        self.forget(grid);
        Ok(())
    }

    /// Drop the arena of `grid` without writing anything.
    pub fn forget(&mut self, grid: GridId) {
        for key in self.keys_of(grid) {
            self.account(key, None);
        }
        self.pinned.retain(|key, _| key.grid != grid);
        self.arenas.remove(&grid);
        debug!(grid = grid.0, "dropped grid arena");
    }

    fn keys_of(&self, grid: GridId) -> Vec<ChunkKey> {
        self.lru
            .iter()
            .map(|(key, _)| *key)
            .filter(|key| key.grid == grid)
            .collect()
    }

    /// Record the resident estimate of a chunk; `None` stops tracking it.
    fn account(&mut self, key: ChunkKey, bytes: Option<usize>) {
        let previous = match bytes {
            Some(bytes) => self.lru.put(key, bytes),
            None => self.lru.pop(&key),
        };
        self.resident_bytes = self.resident_bytes - previous.unwrap_or(0) + bytes.unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;

    fn cache(budget: usize) -> ChunkCache {
        ChunkCache::new(CacheConfig {
            memory_budget: budget,
            memory_reserve: 0,
        })
    }

    fn uniform_chunks(n: i32) -> Vec<(ChunkId, Chunk<i32>)> {
        (0..n)
            .map(|col| (ChunkId::new(0, col), Chunk::uniform(ChunkKind::Dense, 8, 8, 0)))
            .collect()
    }

    /// A grid of `n` 8x8 chunks in one chunk row, all resident and uniform.
    fn register(cache: &mut ChunkCache, path: &std::path::Path, n: i32) -> GridId {
        let layout = ChunkLayout::new(8, 8 * i64::from(n), 8, 8).unwrap();
        cache.register(GridDir::create(path).unwrap(), layout, uniform_chunks(n), [], true)
    }

    fn chunk_bytes() -> usize {
        let mut chunk = Chunk::uniform(ChunkKind::Dense, 8, 8, 0i32);
        chunk.set_cell(0, 0, 1);
        chunk.memory_estimate()
    }

    #[test]
    fn test_uniform_chunks_are_untracked() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = cache(1 << 20);
        let grid = register(&mut cache, tmp.path(), 4);
        assert_eq!(cache.resident_chunks(), 0);
        assert_eq!(cache.resident_bytes(), 0);
        assert!(cache.is_resident(ChunkKey::new(grid, ChunkId::new(0, 3))));
        assert!(cache.arena::<i32>(grid).unwrap().worth_caching().is_empty());
    }

    #[test]
    fn test_update_tracks_and_evicts_lru() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = cache(2 * chunk_bytes() + 16);
        let grid = register(&mut cache, tmp.path(), 3);

        for col in 0..3 {
            cache
                .update::<i32, _>(grid, ChunkId::new(0, col), |c| c.set_cell(1, 1, col + 1))
                .unwrap();
        }
        assert_eq!(cache.resident_chunks(), 2);
        assert!(!cache.is_resident(ChunkKey::new(grid, ChunkId::new(0, 0))));
        assert!(tmp.path().join("0_0").is_file());
        assert_eq!(cache.arena::<i32>(grid).unwrap().worth_caching().len(), 3);

        let value = cache
            .read::<i32, _>(grid, ChunkId::new(0, 0), |c| c.get_cell(1, 1))
            .unwrap();
        assert_eq!(value, 1);
        assert!(cache.is_resident(ChunkKey::new(grid, ChunkId::new(0, 0))));
        assert!(!cache.is_resident(ChunkKey::new(grid, ChunkId::new(0, 1))));
        assert!(cache.resident_bytes() <= cache.config().memory_budget);
    }

    #[test]
    fn test_pinned_chunk_survives() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = cache(chunk_bytes() + 16);
        let grid = register(&mut cache, tmp.path(), 2);
        let first = ChunkKey::new(grid, ChunkId::new(0, 0));
        cache.update::<i32, _>(grid, first.chunk, |c| c.set_cell(0, 0, 5)).unwrap();

        let result = cache.with_pinned(&[first], |cache| {
            assert!(cache.is_pinned(first));
            cache.update::<i32, _>(grid, ChunkId::new(0, 1), |c| c.set_cell(0, 0, 6))
        });
        assert!(matches!(result, Err(GridError::ResourceExhausted { .. })));
        assert!(!cache.is_pinned(first));
        assert!(cache.is_resident(first));
    }

    #[test]
    fn test_reserve_is_given_up_before_failing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = ChunkCache::new(CacheConfig {
            memory_budget: chunk_bytes() + 16,
            memory_reserve: 1 << 20,
        });
        let grid = register(&mut cache, tmp.path(), 1);
        cache
            .update::<i32, _>(grid, ChunkId::new(0, 0), |c| c.set_cell(0, 0, 5))
            .unwrap();
        assert_eq!(cache.resident_chunks(), 1);
    }

    #[test]
    fn test_writing_uniform_value_needs_no_room() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = cache(64);
        let grid = register(&mut cache, tmp.path(), 1);
        let id = ChunkId::new(0, 0);
        let previous = cache.write::<i32>(grid, id, (3, 3), 0, ChunkPolicy::Dense).unwrap();
        assert_eq!(previous, 0);
        assert_eq!(cache.resident_bytes(), 0);

        let err = cache.write::<i32>(grid, id, (3, 3), 7, ChunkPolicy::Dense).unwrap_err();
        assert!(matches!(err, GridError::ResourceExhausted { .. }));
    }

    #[test]
    fn test_type_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = cache(1 << 20);
        let grid = register(&mut cache, tmp.path(), 1);
        let err = cache.read::<f64, _>(grid, ChunkId::new(0, 0), |c| c.get_cell(0, 0));
        assert!(matches!(err, Err(GridError::TypeMismatch(_, "double"))));
        let err = cache.read::<i32, _>(grid, ChunkId::new(5, 5), |c| c.get_cell(0, 0));
        assert!(matches!(err, Err(GridError::UnknownChunk(_))));
    }

    #[test]
    fn test_close_flushes_and_forgets() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cache = cache(1 << 20);
        let grid = register(&mut cache, tmp.path(), 2);
        cache
            .update::<i32, _>(grid, ChunkId::new(0, 1), |c| c.set_cell(2, 2, 9))
            .unwrap();
        cache.close(grid).unwrap();
        assert!(tmp.path().join("0_1").is_file());
        assert!(!tmp.path().join("0_0").exists());
        assert_eq!(cache.resident_bytes(), 0);
        assert!(!cache.is_open(grid));
    }
}

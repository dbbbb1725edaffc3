//! Tile-keyed cache of fetched road graphs.
//!
//! The cache is an explicit object handed to [`CachingProvider`] rather than
//! process-wide state. Requests are mapped onto a fixed grid of tiles; the
//! first request for a tile fetches an area large enough to cover any request
//! centred inside that tile, and later requests are served by cropping the
//! cached graph.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use directories::BaseDirs;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geodesy::{haversine_m, Coordinate};
use crate::graph::RoadGraph;
use crate::provider::{FetchArea, GraphProvider};

/// Edge length of a tile in degrees.
pub const TILE_SIZE_DEG: f64 = 0.01;

/// Radii are rounded up to whole multiples of this many metres.
const RADIUS_BUCKET_M: f64 = 1000.0;

const CACHE_DIR_NAME: &str = "veloroute";
const CACHE_DIR_ENV: &str = "VELOROUTE_CACHE_DIR";

/// Default number of tiles kept in memory.
pub const DEFAULT_TILE_CAPACITY: usize = 64;

/// Grid cell plus radius bucket identifying a cached fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub lat_index: i64,
    pub lon_index: i64,
    /// Fetch radius rounded up to whole kilometres.
    pub radius_km: u32,
}

impl TileKey {
    pub fn for_area(area: &FetchArea) -> Self {
        Self {
            lat_index: (area.center.lat / TILE_SIZE_DEG).floor() as i64,
            lon_index: (area.center.lon / TILE_SIZE_DEG).floor() as i64,
            radius_km: (area.radius_m.max(0.0) / RADIUS_BUCKET_M).ceil() as u32,
        }
    }

    fn south_west(&self) -> Coordinate {
        Coordinate::new(
            self.lat_index as f64 * TILE_SIZE_DEG,
            self.lon_index as f64 * TILE_SIZE_DEG,
        )
    }

    pub fn center(&self) -> Coordinate {
        let corner = self.south_west();
        Coordinate::new(
            corner.lat + TILE_SIZE_DEG / 2.0,
            corner.lon + TILE_SIZE_DEG / 2.0,
        )
    }

    /// Area whose graph covers every request mapped to this key.
    ///
    /// The bucket radius is widened by the distance from the tile centre to
    /// its farthest corner, since a request may sit anywhere in the tile.
    pub fn fetch_area(&self) -> FetchArea {
        let center = self.center();
        let corner = self.south_west();
        let far_corner = Coordinate::new(corner.lat + TILE_SIZE_DEG, corner.lon + TILE_SIZE_DEG);
        let half_diagonal = haversine_m(center, corner).max(haversine_m(center, far_corner));
        FetchArea::new(
            center,
            self.radius_km as f64 * RADIUS_BUCKET_M + half_diagonal,
        )
    }

    fn file_name(&self) -> String {
        format!(
            "tile_{}_{}_{}.json",
            self.lat_index, self.lon_index, self.radius_km
        )
    }
}

#[derive(Debug)]
struct CacheEntry {
    graph: Arc<RoadGraph>,
    last_used: AtomicU64,
}

/// In-memory LRU map of tile graphs with optional on-disk persistence.
///
/// Lookups take a shared lock and only bump an atomic recency stamp, so
/// concurrent readers do not contend. Inserts take the exclusive lock; two
/// writers racing on the same key resolve as last-write-wins.
#[derive(Debug)]
pub struct TileCache {
    capacity: usize,
    disk_dir: Option<PathBuf>,
    clock: AtomicU64,
    entries: RwLock<HashMap<TileKey, CacheEntry>>,
}

impl TileCache {
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            disk_dir: None,
            clock: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache that also persists tiles as JSON documents under `dir`.
    pub fn with_disk(capacity: usize, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            disk_dir: Some(dir),
            ..Self::in_memory(capacity)
        })
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn disk_dir(&self) -> Option<&Path> {
        self.disk_dir.as_deref()
    }

    pub fn get(&self, key: &TileKey) -> Option<Arc<RoadGraph>> {
        let stamp = self.tick();
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(entry) = entries.get(key) {
                entry.last_used.store(stamp, Ordering::Relaxed);
                return Some(Arc::clone(&entry.graph));
            }
        }

        let graph = Arc::new(self.load_from_disk(key)?);
        self.insert_entry(*key, Arc::clone(&graph));
        Some(graph)
    }

    /// Store `graph` under `key`, evicting the least recently used tile when
    /// over capacity.
    pub fn insert(&self, key: TileKey, graph: RoadGraph) -> Arc<RoadGraph> {
        let graph = Arc::new(graph);
        if let Err(err) = self.persist(&key, &graph) {
            warn!(error = %err, tile = ?key, "failed to persist cached tile");
        }
        self.insert_entry(key, Arc::clone(&graph));
        graph
    }

    fn insert_entry(&self, key: TileKey, graph: Arc<RoadGraph>) {
        let stamp = self.tick();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(
            key,
            CacheEntry {
                graph,
                last_used: AtomicU64::new(stamp),
            },
        );
        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| *key);
            match oldest {
                Some(oldest) => {
                    entries.remove(&oldest);
                    debug!(tile = ?oldest, "evicted cached tile");
                }
                None => break,
            }
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn load_from_disk(&self, key: &TileKey) -> Option<RoadGraph> {
        let dir = self.disk_dir.as_ref()?;
        let path = dir.join(key.file_name());
        if !path.exists() {
            return None;
        }
        match RoadGraph::load_json(&path) {
            Ok(graph) => Some(graph),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "ignoring unreadable cached tile");
                None
            }
        }
    }

    fn persist(&self, key: &TileKey, graph: &RoadGraph) -> Result<()> {
        let Some(dir) = self.disk_dir.as_ref() else {
            return Ok(());
        };
        let destination = dir.join(key.file_name());
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(tmp.as_file_mut(), &graph.to_document())?;
        tmp.flush()?;
        tmp.persist(&destination).map_err(|err| err.error)?;
        debug!(path = %destination.display(), "persisted cached tile");
        Ok(())
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::in_memory(DEFAULT_TILE_CAPACITY)
    }
}

/// Resolve the directory used for persisted tiles.
///
/// `VELOROUTE_CACHE_DIR` takes precedence over the platform cache directory.
pub fn default_cache_dir() -> Result<PathBuf> {
    if let Some(override_dir) = env::var_os(CACHE_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    let dirs = BaseDirs::new().ok_or(Error::CacheDirsUnavailable)?;
    Ok(dirs.cache_dir().join(CACHE_DIR_NAME).join("tiles"))
}

/// Wraps a provider with a [`TileCache`].
#[derive(Debug)]
pub struct CachingProvider<P> {
    inner: P,
    cache: Arc<TileCache>,
}

impl<P> CachingProvider<P> {
    pub fn new(inner: P, cache: Arc<TileCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: GraphProvider> GraphProvider for CachingProvider<P> {
    fn fetch(&self, area: &FetchArea) -> Result<RoadGraph> {
        let key = TileKey::for_area(area);
        let tile = match self.cache.get(&key) {
            Some(graph) => {
                debug!(tile = ?key, "tile cache hit");
                graph
            }
            None => {
                debug!(tile = ?key, "tile cache miss");
                let graph = self.inner.fetch(&key.fetch_area())?;
                self.cache.insert(key, graph)
            }
        };
        Ok(tile.subgraph_within(area.center, area.radius_m))
    }
}

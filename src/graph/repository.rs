use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use super::map::{Map, Road, Vertex};
use super::{MapView, PathResolver};
use crate::error::{Error, Result};

/// In-process registry of maps, keyed by name.
///
/// Reads (routing, listing) share the lock; edits take it exclusively and
/// rebuild the edited map's next-hop index before releasing it.
#[derive(Debug, Default)]
pub struct MapRepository {
    maps: RwLock<BTreeMap<String, Map>>,
}

impl MapRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file of `dir` as a map. Each map must pass
    /// [`Map::check`].
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let repo = Self::new();
        let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
            let map = Map::from_reader(BufReader::new(file)).map_err(|e| Error::json(&path, e))?;
            repo.insert(map)?;
        }
        info!(dir = %dir.display(), maps = repo.len(), "maps loaded");
        Ok(repo)
    }

    /// Register a map after validating it.
    pub fn insert(&self, mut map: Map) -> Result<()> {
        map.rehash();
        map.check()?;
        let mut maps = self.write()?;
        if maps.contains_key(&map.name) {
            return Err(Error::already_exists("map", &map.name));
        }
        maps.insert(map.name.clone(), map);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// Snapshot of one map.
    pub fn get(&self, name: &str) -> Result<Map> {
        self.with_map(name, |m| Ok(m.clone()))
    }

    /// Up to `max` vertices with an id strictly greater than `marker`.
    pub fn vertices(&self, name: &str, marker: u64, max: usize) -> Result<Vec<Vertex>> {
        self.with_map(name, |m| Ok(m.sites.slice(&marker, max).to_vec()))
    }

    /// Up to `max` roads strictly after `marker` in `(src, dst)` order.
    pub fn edges(&self, name: &str, marker: Road, max: usize) -> Result<Vec<Road>> {
        self.with_map(name, |m| Ok(m.roads.slice(&marker, max).to_vec()))
    }

    /// Every hop from `src` (excluded) to `dst` (included).
    pub fn path(&self, name: &str, src: u64, dst: u64) -> Result<Vec<u64>> {
        self.with_map(name, |m| m.path(src, dst))
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    pub fn cell_add(&self, name: &str, vertex: Vertex) -> Result<()> {
        self.with_map_mut(name, |m| m.cell_add(vertex))
    }

    pub fn road_add(&self, name: &str, src: u64, dst: u64) -> Result<()> {
        self.with_map_mut(name, |m| m.road_add(src, dst))
    }

    pub fn road_remove(&self, name: &str, src: u64, dst: u64) -> Result<()> {
        self.with_map_mut(name, |m| m.road_remove(src, dst))
    }

    /// See [`Map::split_road`].
    ///
    /// # Panics
    ///
    /// Panics if `segments < 2`, before the repository is locked, so the
    /// other maps keep routing.
    pub fn split_road(&self, name: &str, src: u64, dst: u64, segments: usize) -> Result<Vec<u64>> {
        assert!(segments >= 2, "split_road needs at least 2 segments, got {segments}");
        self.with_map_mut(name, |m| m.split_road(src, dst, segments))
    }

    // -- lock helpers --

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Map>>> {
        self.maps
            .read()
            .map_err(|_| Error::Internal("map repository lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Map>>> {
        self.maps
            .write()
            .map_err(|_| Error::Internal("map repository lock poisoned".to_string()))
    }

    fn with_map<R>(&self, name: &str, f: impl FnOnce(&Map) -> Result<R>) -> Result<R> {
        let maps = self.read()?;
        let map = maps.get(name).ok_or_else(|| Error::not_found("map", name))?;
        f(map)
    }

    fn with_map_mut<R>(&self, name: &str, f: impl FnOnce(&mut Map) -> Result<R>) -> Result<R> {
        let mut maps = self.write()?;
        let map = maps.get_mut(name).ok_or_else(|| Error::not_found("map", name))?;
        f(map)
    }
}

impl PathResolver for MapRepository {
    fn step(&self, map: &str, src: u64, dst: u64) -> Result<u64> {
        self.with_map(map, |m| m.path_next_step(src, dst))
    }
}

impl MapView for MapRepository {
    fn map_has(&self, map: &str) -> bool {
        self.read().map(|m| m.contains_key(map)).unwrap_or(false)
    }

    fn cell_has(&self, map: &str, cell: u64) -> bool {
        self.with_map(map, |m| Ok(m.cell_has(cell))).unwrap_or(false)
    }

    fn seed_cities(&self, map: &str) -> Result<Vec<(u64, String)>> {
        self.with_map(map, |m| Ok(m.seed_cities()))
    }
}

//! On-disk layout.
//!
//! ```text
//! definitions/   config.json, units/*.json, buildings/*.json, knowledge/*.json
//! maps/          one map per *.json file
//! regions/       one region per <name>.json file
//! ```
//!
//! Regions are written to a temporary file in the target directory, then
//! renamed over the previous save.

mod jsonl;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

pub use jsonl::export_scores;

use crate::error::{Error, Result};
use crate::graph::MapRepository;
use crate::model::{Configuration, Definitions, Region, World};
use crate::notify::Notifier;

/// Where a world lives on disk.
#[derive(Debug, Clone)]
pub struct Layout {
    pub definitions: PathBuf,
    pub maps: PathBuf,
    pub regions: PathBuf,
}

impl Layout {
    pub fn config_path(&self) -> PathBuf {
        self.definitions.join("config.json")
    }
}

/// Load definitions, configuration, maps and regions, then check the
/// whole. The map repository is returned too so the caller can edit maps.
pub fn load_world(layout: &Layout, notifier: Arc<dyn Notifier>) -> Result<(World, Arc<MapRepository>)> {
    let config = Configuration::load(&layout.config_path())?;
    let definitions = Definitions::load_dir(&layout.definitions)?;
    let maps = Arc::new(MapRepository::load_dir(&layout.maps)?);
    let mut world = World::new(config, definitions, maps.clone(), notifier);
    world.post_load();
    for region in load_regions(&layout.regions)? {
        world.insert_region(region)?;
    }
    world.check()?;
    info!(regions = world.regions.len(), maps = maps.len(), "world loaded");
    Ok((world, maps))
}

/// Every `*.json` file of `dir`, in file name order. A missing directory
/// holds no region.
pub fn load_regions(dir: &Path) -> Result<Vec<Region>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    paths.iter().map(|p| load_region(p)).collect()
}

pub fn load_region(path: &Path) -> Result<Region> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))
}

/// Write `region` as `<dir>/<name>.json`, replacing any previous save.
pub fn save_region(dir: &Path, region: &Region) -> Result<PathBuf> {
    if region.name.is_empty()
        || region.name.starts_with('.')
        || region.name.contains(['/', '\\'])
    {
        return Err(Error::InvalidArgument(format!(
            "region name '{}' cannot be used as a file name",
            region.name
        )));
    }
    let target = dir.join(format!("{}.json", region.name));
    let tmp = dir.join(format!(".{}.json.tmp", region.name));
    {
        let file = File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, region).map_err(|e| Error::json(&tmp, e))?;
        writer.write_all(b"\n").map_err(|e| Error::io(&tmp, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| Error::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| Error::io(&tmp, e))?;
    }
    fs::rename(&tmp, &target).map_err(|e| Error::io(&target, e))?;
    Ok(target)
}

/// Save every region of the world into `dir`, creating it if needed.
pub fn save_world(world: &World, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    for region in world.regions.iter() {
        save_region(dir, region)?;
    }
    info!(dir = %dir.display(), regions = world.regions.len(), "world saved");
    Ok(world.regions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::City;

    fn region(name: &str) -> Region {
        let mut region = Region::new(name, "line");
        let mut city = City::new(1, "a");
        city.armies.add(crate::model::Army::new(1, "guard"));
        region.cities.add(city);
        region
    }

    #[test]
    fn save_then_load_restores_back_references() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_region(dir.path(), &region("north")).unwrap();
        assert!(path.ends_with("north.json"));
        assert!(!dir.path().join(".north.json.tmp").exists());

        let mut loaded = load_regions(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        let mut north = loaded.remove(0);
        north.post_load();
        assert!(north.check().is_ok());
        let army = north.city(1).unwrap().armies.iter().next().unwrap();
        assert_eq!(army.city, 1);
    }

    #[test]
    fn overwrite_keeps_one_file() {
        let dir = tempfile::tempdir().unwrap();
        save_region(dir.path(), &region("north")).unwrap();
        let mut changed = region("north");
        changed.city_mut(1).unwrap().name = "renamed".into();
        save_region(dir.path(), &changed).unwrap();
        let loaded = load_regions(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].city(1).unwrap().name, "renamed");
    }

    #[test]
    fn unsafe_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_region(dir.path(), &region("../evil")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn missing_directory_is_empty_and_bad_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_regions(&dir.path().join("none")).unwrap().is_empty());
        fs::write(dir.path().join("bad.json"), "{").unwrap();
        let err = load_regions(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("bad.json"));
    }
}

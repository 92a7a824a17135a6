use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::resources::{Modifier, Resources};
use super::sorted_set::{Keyed, SortedSet};
use crate::error::{Error, Result};

/// Shared shape of the three asset catalogs: something that costs resources
/// to start and then once per tick until its tick count is exhausted.
pub trait Blueprint: Keyed<Key = u64> {
    const KIND: &'static str;

    fn id(&self) -> u64;
    fn name(&self) -> &str;
    fn ticks(&self) -> u32;
    /// Paid once when the asset is started.
    fn start_cost(&self) -> &Resources;
    /// Paid on every production round that advances the asset.
    fn tick_cost(&self) -> &Resources;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitType {
    pub id: u64,
    pub name: String,
    /// Health of a freshly trained unit.
    pub health: u32,
    /// How much a loss of health reduces capability, in `[0, 1]`.
    pub health_factor: f64,
    pub ticks: u32,
    pub cost0: Resources,
    pub cost: Resources,
    /// Production effect while the unit is finished and garrisoned.
    pub prod: Modifier,
    /// Transient popularity while the unit is alive.
    pub pop_bonus: i64,
    pub pop_bonus_train: i64,
    pub pop_bonus_death: i64,
    pub pop_bonus_kill: i64,
    pub pop_bonus_disband: i64,
    /// Minimum popularity to start training.
    pub req_pop: i64,
    /// Building type that must be present, 0 for none.
    pub required_building: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingType {
    pub id: u64,
    pub name: String,
    pub ticks: u32,
    pub cost0: Resources,
    pub cost: Resources,
    /// When unset the type is unique within a city.
    pub multiple_allowed: bool,
    /// Popularity required to start the construction.
    pub pop_required: i64,
    pub pop_bonus: i64,
    pub pop_bonus_build: i64,
    pub pop_bonus_fall: i64,
    pub pop_bonus_destroy: i64,
    pub pop_bonus_dismantle: i64,
    pub stock: Modifier,
    pub prod: Modifier,
    /// Knowledge types that must all be finished.
    pub requires: Vec<u64>,
    /// Knowledge types that must all be absent, finished or in progress.
    pub conflicts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeType {
    pub id: u64,
    pub name: String,
    pub ticks: u32,
    pub cost0: Resources,
    pub cost: Resources,
    pub pop_bonus: i64,
    pub pop_bonus_learn: i64,
    pub pop_bonus_steal_victim: i64,
    pub pop_bonus_steal_actor: i64,
    pub stock: Modifier,
    pub prod: Modifier,
    pub requires: Vec<u64>,
    pub conflicts: Vec<u64>,
}

macro_rules! blueprint {
    ($ty:ident, $kind:expr) => {
        impl Keyed for $ty {
            type Key = u64;

            fn key(&self) -> &u64 {
                &self.id
            }
        }

        impl Blueprint for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> u64 {
                self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn ticks(&self) -> u32 {
                self.ticks
            }
            fn start_cost(&self) -> &Resources {
                &self.cost0
            }
            fn tick_cost(&self) -> &Resources {
                &self.cost
            }
        }
    };
}

blueprint!(UnitType, "unit type");
blueprint!(BuildingType, "building type");
blueprint!(KnowledgeType, "knowledge type");

// ---------------------------------------------------------------------------
// Catalogs
// ---------------------------------------------------------------------------

/// The three read-only catalogs. Immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Definitions {
    pub units: SortedSet<UnitType>,
    pub buildings: SortedSet<BuildingType>,
    pub knowledges: SortedSet<KnowledgeType>,
}

impl Definitions {
    pub fn unit(&self, id: u64) -> Result<&UnitType> {
        self.units.get(&id).ok_or_else(|| Error::not_found(UnitType::KIND, id))
    }

    pub fn building(&self, id: u64) -> Result<&BuildingType> {
        self.buildings
            .get(&id)
            .ok_or_else(|| Error::not_found(BuildingType::KIND, id))
    }

    pub fn knowledge(&self, id: u64) -> Result<&KnowledgeType> {
        self.knowledges
            .get(&id)
            .ok_or_else(|| Error::not_found(KnowledgeType::KIND, id))
    }

    pub fn sort(&mut self) {
        self.units.sort();
        self.buildings.sort();
        self.knowledges.sort();
    }

    /// Sets sorted and unique, IDs non-zero, cross references resolvable.
    pub fn check(&self) -> Result<()> {
        self.units.check()?;
        self.buildings.check()?;
        self.knowledges.check()?;
        let zero = |kind: &str| Error::NotValid(format!("{kind} with id 0"));
        if self.units.has(&0) {
            return Err(zero(UnitType::KIND));
        }
        if self.buildings.has(&0) {
            return Err(zero(BuildingType::KIND));
        }
        if self.knowledges.has(&0) {
            return Err(zero(KnowledgeType::KIND));
        }
        for u in self.units.iter() {
            if u.required_building != 0 && !self.buildings.has(&u.required_building) {
                return Err(Error::NotValid(format!(
                    "unit type {} requires unknown building type {}",
                    u.id, u.required_building
                )));
            }
            if !(0.0..=1.0).contains(&u.health_factor) {
                return Err(Error::NotValid(format!(
                    "unit type {} has health factor {} outside [0, 1]",
                    u.id, u.health_factor
                )));
            }
        }
        let knowledge_refs = self
            .buildings
            .iter()
            .map(|b| (BuildingType::KIND, b.id, &b.requires, &b.conflicts))
            .chain(
                self.knowledges
                    .iter()
                    .map(|k| (KnowledgeType::KIND, k.id, &k.requires, &k.conflicts)),
            );
        for (kind, id, requires, conflicts) in knowledge_refs {
            for k in requires.iter().chain(conflicts.iter()) {
                if !self.knowledges.has(k) {
                    return Err(Error::NotValid(format!(
                        "{kind} {id} references unknown knowledge type {k}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Load `units/`, `buildings/` and `knowledge/` under `dir`. Every JSON
    /// file in those directories holds an array of types.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut defs = Definitions {
            units: load_catalog(&dir.join("units"))?,
            buildings: load_catalog(&dir.join("buildings"))?,
            knowledges: load_catalog(&dir.join("knowledge"))?,
        };
        defs.sort();
        info!(
            dir = %dir.display(),
            units = defs.units.len(),
            buildings = defs.buildings.len(),
            knowledges = defs.knowledges.len(),
            "definitions loaded"
        );
        Ok(defs)
    }
}

fn load_catalog<T: Keyed + DeserializeOwned>(dir: &Path) -> Result<SortedSet<T>> {
    let mut out = SortedSet::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in paths {
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let items: Vec<T> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(&path, e))?;
        out.extend(items);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn knowledge(id: u64, requires: Vec<u64>) -> KnowledgeType {
        KnowledgeType {
            id,
            name: format!("k{id}"),
            requires,
            ..KnowledgeType::default()
        }
    }

    #[test]
    fn lookups_report_missing_types() {
        let mut defs = Definitions::default();
        defs.knowledges.add(knowledge(1, vec![]));
        assert_eq!(defs.knowledge(1).unwrap().name, "k1");
        let err = defs.unit(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "unit type not found: 4");
    }

    #[test]
    fn check_rejects_dangling_references() {
        let mut defs = Definitions::default();
        defs.knowledges.add(knowledge(1, vec![2]));
        assert!(defs.check().unwrap_err().to_string().contains("unknown knowledge type 2"));
        defs.knowledges.add(knowledge(2, vec![]));
        assert!(defs.check().is_ok());
        defs.units.add(UnitType {
            id: 1,
            required_building: 9,
            ..UnitType::default()
        });
        assert_eq!(defs.check().unwrap_err().kind(), ErrorKind::NotValid);
    }

    #[test]
    fn blueprint_exposes_costs() {
        let unit = UnitType {
            id: 3,
            ticks: 2,
            cost0: Resources::splat(1),
            cost: Resources::new([0, 0, 1, 0, 0, 0]),
            ..UnitType::default()
        };
        assert_eq!(Blueprint::id(&unit), 3);
        assert_eq!(Blueprint::ticks(&unit), 2);
        assert_eq!(unit.start_cost(), &Resources::splat(1));
        assert_eq!(unit.tick_cost()[crate::model::ResourceKind::Cereal], 1);
    }

    #[test]
    fn loads_catalog_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("units")).unwrap();
        fs::create_dir(dir.path().join("knowledge")).unwrap();
        fs::write(
            dir.path().join("units/a.json"),
            r#"[{"id": 2, "name": "Archer", "ticks": 3}, {"id": 1, "name": "Pike"}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("knowledge/k.json"), r#"[{"id": 1, "name": "Writing"}]"#)
            .unwrap();
        let defs = Definitions::load_dir(dir.path()).unwrap();
        assert_eq!(defs.units.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(defs.unit(2).unwrap().ticks, 3);
        assert!(defs.buildings.is_empty());
        assert!(defs.check().is_ok());
    }

    #[test]
    fn malformed_catalog_is_an_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("buildings")).unwrap();
        fs::write(dir.path().join("buildings/b.json"), r#"{"id": 1}"#).unwrap();
        let err = Definitions::load_dir(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

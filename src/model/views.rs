//! Read-only projections of cities and armies, as handed to callers.
//!
//! Nothing here is persisted. Views are rebuilt on every request from the
//! permanent fields and the definitions.

use serde::Serialize;

use super::army::Army;
use super::asset::Construction;
use super::city::{City, Counters};
use super::command::Command;
use super::config::Configuration;
use super::definitions::{Blueprint, Definitions};
use super::frontier::{building_frontier, knowledge_frontier, unit_frontier};
use super::region::Region;
use super::resources::{Modifier, Resources};

/// Production or stock capacity split into its inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub base: Resources,
    pub troops: Modifier,
    pub buildings: Modifier,
    pub knowledge: Modifier,
    pub actual: Resources,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockView {
    #[serde(flatten)]
    pub capacity: Breakdown,
    /// Current stock.
    pub usage: Resources,
}

/// Type id and name, for frontier listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRef {
    pub id: u64,
    pub name: String,
}

impl TypeRef {
    fn of<B: Blueprint>(bp: &B) -> Self {
        Self {
            id: bp.id(),
            name: bp.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evolution {
    pub knowledges: Vec<TypeRef>,
    pub buildings: Vec<TypeRef>,
    pub units: Vec<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetView {
    pub id: String,
    #[serde(rename = "type")]
    pub type_id: u64,
    pub ticks: u32,
}

impl AssetView {
    fn of<C: Construction>(asset: &C) -> Self {
        Self {
            id: asset.id().to_string(),
            type_id: asset.type_id(),
            ticks: asset.ticks(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Politics {
    pub overlord: u64,
    pub lieges: Vec<u64>,
}

/// What a character sees of a city. Owners and deputies get the full
/// picture; anyone else gets the public part only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityView {
    pub id: u64,
    pub name: String,
    pub owner: u64,
    pub deputy: u64,
    pub cult: u32,
    pub chaotic: i32,
    pub alignment: i32,
    pub ethnic_group: u32,
    pub popularity: i64,
    pub ticks_massacres: u32,
    pub auto: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub politics: Option<Politics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<CityDetail>,
}

/// Owner-only part of a [`CityView`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityDetail {
    pub production: Breakdown,
    pub stock: StockView,
    pub evolution: Evolution,
    pub knowledges: Vec<AssetView>,
    pub buildings: Vec<AssetView>,
    pub units: Vec<UnitView>,
    pub armies: Vec<ArmySummary>,
    pub counters: Counters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitView {
    pub id: String,
    #[serde(rename = "type")]
    pub type_id: u64,
    pub ticks: u32,
    pub health: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmySummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmyView {
    pub id: String,
    pub name: String,
    pub city: u64,
    pub cell: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fight: Option<String>,
    pub stock: Resources,
    pub units: Vec<UnitView>,
    pub commands: Vec<Command>,
}

/// One line of the region scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityScore {
    pub city: u64,
    pub name: String,
    pub owner: u64,
    /// Construction ticks invested in finished buildings.
    pub buildings: u64,
    /// Study ticks invested in finished knowledge.
    pub knowledge: u64,
    /// Health of every live unit, at home or in an army.
    pub military: u64,
    pub popularity: i64,
    pub stock_capacity: Resources,
    pub stock_usage: Resources,
    pub counters: Counters,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

impl City {
    pub fn production_view(&self, defs: &Definitions) -> Breakdown {
        let (buildings, _) = self.building_modifiers(defs);
        let (knowledge, _) = self.knowledge_modifiers(defs);
        Breakdown {
            base: self.production,
            troops: self.unit_modifier(defs),
            buildings,
            knowledge,
            actual: self.actual_production(defs),
        }
    }

    pub fn stock_view(&self, defs: &Definitions) -> StockView {
        let (_, buildings) = self.building_modifiers(defs);
        let (_, knowledge) = self.knowledge_modifiers(defs);
        StockView {
            capacity: Breakdown {
                base: self.stock_capacity,
                troops: Modifier::IDENTITY,
                buildings,
                knowledge,
                actual: self.actual_capacity(defs),
            },
            usage: self.stock,
        }
    }

    /// Types this city may start right now.
    pub fn evolution(&self, defs: &Definitions, config: &Configuration) -> Evolution {
        let popularity = self.popularity(defs, config);
        Evolution {
            knowledges: knowledge_frontier(defs, &self.knowledges)
                .into_iter()
                .map(TypeRef::of)
                .collect(),
            buildings: building_frontier(defs, popularity, &self.buildings, &self.knowledges)
                .into_iter()
                .map(TypeRef::of)
                .collect(),
            units: unit_frontier(defs, &self.buildings)
                .into_iter()
                .map(TypeRef::of)
                .collect(),
        }
    }

    pub fn view(&self, defs: &Definitions, config: &Configuration, viewer: u64) -> CityView {
        let mut view = CityView {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner,
            deputy: self.deputy,
            cult: self.cult,
            chaotic: self.chaotic,
            alignment: self.alignment,
            ethnic_group: self.ethnic_group,
            popularity: self.popularity(defs, config),
            ticks_massacres: self.ticks_massacres,
            auto: self.auto,
            politics: None,
            tax_rate: None,
            detail: None,
        };
        if !self.is_managed_by(viewer) {
            return view;
        }
        view.politics = Some(Politics {
            overlord: self.overlord,
            lieges: self.lieges.clone(),
        });
        if self.overlord != 0 {
            view.tax_rate = Some(self.tax_rate.0.to_vec());
        }
        view.detail = Some(CityDetail {
            production: self.production_view(defs),
            stock: self.stock_view(defs),
            evolution: self.evolution(defs, config),
            knowledges: self.knowledges.iter().map(AssetView::of).collect(),
            buildings: self.buildings.iter().map(AssetView::of).collect(),
            units: self.units.iter().map(UnitView::from).collect(),
            armies: self
                .armies
                .iter()
                .map(|a| ArmySummary {
                    id: a.id.clone(),
                    name: a.name.clone(),
                })
                .collect(),
            counters: self.counters.clone(),
        });
        view
    }

    pub fn score(&self, defs: &Definitions, config: &Configuration) -> CityScore {
        let buildings = self
            .buildings
            .iter()
            .filter(|b| b.is_finished())
            .filter_map(|b| defs.building(b.type_id).ok())
            .map(|bt| u64::from(bt.ticks))
            .sum();
        let knowledge = self
            .knowledges
            .iter()
            .filter(|k| k.is_finished())
            .filter_map(|k| defs.knowledge(k.type_id).ok())
            .map(|kt| u64::from(kt.ticks))
            .sum();
        let military = self
            .units
            .iter()
            .chain(self.armies.iter().flat_map(|a| a.units.iter()))
            .filter(|u| u.is_eligible())
            .map(|u| u64::from(u.health))
            .sum();
        CityScore {
            city: self.id,
            name: self.name.clone(),
            owner: self.owner,
            buildings,
            knowledge,
            military,
            popularity: self.popularity(defs, config),
            stock_capacity: self.actual_capacity(defs),
            stock_usage: self.stock,
            counters: self.counters.clone(),
        }
    }
}

impl From<&super::asset::Unit> for UnitView {
    fn from(u: &super::asset::Unit) -> Self {
        Self {
            id: u.id.clone(),
            type_id: u.type_id,
            ticks: u.ticks,
            health: u.health,
        }
    }
}

impl Army {
    pub fn view(&self) -> ArmyView {
        ArmyView {
            id: self.id.clone(),
            name: self.name.clone(),
            city: self.city,
            cell: self.cell,
            fight: self.fight.clone(),
            stock: self.stock,
            units: self.units.iter().map(UnitView::from).collect(),
            commands: self.commands.iter().cloned().collect(),
        }
    }
}

impl Region {
    /// Scoreboard of every city, in city order.
    pub fn scores(&self, defs: &Definitions, config: &Configuration) -> Vec<CityScore> {
        self.cities.iter().map(|c| c.score(defs, config)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::asset::{Building, Knowledge, Unit};
    use crate::model::definitions::{BuildingType, KnowledgeType};

    fn defs() -> Definitions {
        let mut defs = Definitions::default();
        defs.buildings.add(BuildingType {
            id: 1,
            name: "farm".into(),
            ticks: 3,
            multiple_allowed: true,
            prod: Modifier::scaling([1.0, 1.0, 2.0, 1.0, 1.0, 1.0]),
            ..BuildingType::default()
        });
        defs.knowledges.add(KnowledgeType {
            id: 7,
            name: "writing".into(),
            ticks: 5,
            stock: Modifier::adding([0, 0, 10, 0, 0, 0]),
            ..KnowledgeType::default()
        });
        defs
    }

    fn city() -> City {
        let mut city = City::new(3, "Ur");
        city.owner = 11;
        city.overlord = 4;
        city.production = Resources::new([0, 0, 5, 0, 0, 0]);
        city.stock_capacity = Resources::splat(20);
        city.stock = Resources::splat(2);
        city.buildings.add(Building {
            id: "b1".into(),
            type_id: 1,
            ticks: 0,
        });
        city.buildings.add(Building {
            id: "b2".into(),
            type_id: 1,
            ticks: 2,
        });
        city.knowledges.add(Knowledge {
            id: "k1".into(),
            type_id: 7,
            ticks: 0,
        });
        city.units.add(Unit {
            id: "u1".into(),
            type_id: 1,
            ticks: 0,
            health: 6,
        });
        city
    }

    #[test]
    fn strangers_see_the_public_part() {
        let view = city().view(&defs(), &Configuration::default(), 99);
        assert_eq!(view.owner, 11);
        assert!(view.politics.is_none());
        assert!(view.tax_rate.is_none());
        assert!(view.detail.is_none());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("politics").is_none());
    }

    #[test]
    fn owners_see_everything() {
        let view = city().view(&defs(), &Configuration::default(), 11);
        assert_eq!(view.politics.as_ref().unwrap().overlord, 4);
        assert!(view.tax_rate.is_some());
        let detail = view.detail.unwrap();
        assert_eq!(detail.production.actual, Resources::new([0, 0, 10, 0, 0, 0]));
        assert_eq!(detail.stock.capacity.actual, Resources::new([20, 20, 30, 20, 20, 20]));
        assert_eq!(detail.stock.usage, Resources::splat(2));
        assert_eq!(detail.buildings.len(), 2);
        assert_eq!(detail.units[0].health, 6);
        // farm may be built again, writing is known
        assert_eq!(detail.evolution.buildings.len(), 1);
        assert!(detail.evolution.knowledges.is_empty());
    }

    #[test]
    fn score_counts_finished_assets_only() {
        let mut city = city();
        let mut army = Army::new(3, "a");
        army.units.add(Unit {
            id: "u2".into(),
            type_id: 1,
            ticks: 0,
            health: 4,
        });
        city.armies.add(army);
        let score = city.score(&defs(), &Configuration::default());
        assert_eq!(score.buildings, 3);
        assert_eq!(score.knowledge, 5);
        assert_eq!(score.military, 10);
    }

    #[test]
    fn army_view_lists_orders() {
        let mut army = Army::new(3, "scouts");
        army.defer_wait(5);
        let view = army.view();
        assert_eq!(view.cell, 3);
        assert_eq!(view.commands.len(), 1);
        assert_eq!(view.commands[0].cell, 5);
    }
}

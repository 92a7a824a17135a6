#[macro_use]
mod macros;

pub mod army;
pub mod asset;
pub mod city;
pub mod command;
pub mod config;
pub mod definitions;
pub mod fight;
pub mod frontier;
pub mod region;
pub mod resources;
pub mod sorted_set;
pub mod views;
pub mod world;

pub use army::Army;
pub use asset::{Artifact, Building, Construction, Knowledge, Unit};
pub use city::{City, Counters};
pub use command::{Action, ActionKind, AssaultArgs, Command, MoveArgs};
pub use config::{CityPattern, Configuration};
pub use definitions::{Blueprint, BuildingType, Definitions, KnowledgeType, UnitType};
pub use fight::{Belligerent, Fight, Side};
pub use region::Region;
pub use resources::{Increment, Modifier, Multiplier, ResourceKind, Resources};
pub use sorted_set::{Keyed, SortedSet};
pub use views::{ArmyView, CityScore, CityView};
pub use world::World;

#![allow(dead_code)]

use std::sync::Arc;

use hege_region::graph::{Map, MapRepository, Road, Vertex};
use hege_region::id::new_id;
use hege_region::model::*;
use hege_region::notify::MemoryNotifier;

pub const REGION: &str = "test";
pub const MAP: &str = "line";

pub const A: u64 = 1;
pub const B: u64 = 2;
pub const C: u64 = 3;

/// `A <-> B <-> C`, every vertex labelled with a city.
pub fn line_map() -> Map {
    let mut map = Map::new(MAP);
    for (id, name) in [(A, "A"), (B, "B"), (C, "C")] {
        map.sites.add(Vertex {
            id,
            x: id * 10,
            y: 0,
            city: name.to_string(),
        });
    }
    for (src, dst) in [(A, B), (B, A), (B, C), (C, B)] {
        map.roads.add(Road::new(src, dst));
    }
    map
}

/// Cities get a roomy stock so production is never trimmed by accident.
pub fn roomy_config() -> Configuration {
    Configuration {
        city_patterns: vec![CityPattern {
            stock_capacity: Resources::splat(1_000_000),
            ..CityPattern::default()
        }],
        ..Configuration::default()
    }
}

pub struct TestWorld {
    pub world: World,
    pub maps: Arc<MapRepository>,
    pub notifier: Arc<MemoryNotifier>,
}

impl TestWorld {
    pub fn region(&self) -> &Region {
        self.world.region(REGION).unwrap()
    }

    pub fn region_mut(&mut self) -> &mut Region {
        self.world.region_mut(REGION).unwrap()
    }

    pub fn city(&self, id: u64) -> &City {
        self.region().city(id).unwrap()
    }

    pub fn city_mut(&mut self, id: u64) -> &mut City {
        self.region_mut().city_mut(id).unwrap()
    }

    pub fn produce(&mut self) {
        self.world.produce(REGION).unwrap();
    }

    pub fn move_armies(&mut self) {
        self.world.move_armies(REGION).unwrap();
    }
}

/// A world over the line map with one region instantiated on it.
pub fn build_test_world(definitions: Definitions) -> TestWorld {
    build_test_world_with(definitions, roomy_config())
}

pub fn build_test_world_with(definitions: Definitions, config: Configuration) -> TestWorld {
    let maps = Arc::new(MapRepository::new());
    maps.insert(line_map()).unwrap();
    let notifier = Arc::new(MemoryNotifier::new());
    let mut world = World::new(config, definitions, maps.clone(), notifier.clone());
    world.seed(7);
    world.create_region(REGION, MAP).unwrap();
    TestWorld {
        world,
        maps,
        notifier,
    }
}

pub fn finished_unit(type_id: u64) -> Unit {
    Unit {
        id: new_id(),
        type_id,
        ticks: 0,
        health: 1,
    }
}

/// Give `city` `n` finished units and raise them all into one army.
pub fn raise(tw: &mut TestWorld, city: u64, n: usize) -> String {
    let c = tw.city_mut(city);
    let ids: Vec<String> = (0..n)
        .map(|_| {
            let unit = finished_unit(1);
            let id = unit.id.clone();
            c.units.add(unit);
            id
        })
        .collect();
    c.create_army(&Configuration::default(), "army", &ids).unwrap()
}

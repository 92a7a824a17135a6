use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{debug, info, warn};

use super::city::City;
use super::config::Configuration;
use super::definitions::Definitions;
use super::fight::Side;
use super::region::Region;
use super::sorted_set::SortedSet;
use super::views::CityScore;
use crate::error::{Error, Result};
use crate::graph::cache::DEFAULT_CACHE_CAPACITY;
use crate::graph::{CachingResolver, MapView};
use crate::notify::Notifier;
use crate::sim::RoundContext;

/// Definitions, configuration and every region hosted by one process.
///
/// Routing goes through a per-world cache in front of the map view. The
/// cache is flushed at the start of each movement round so map edits are
/// picked up.
pub struct World {
    pub config: Configuration,
    pub definitions: Definitions,
    pub regions: SortedSet<Region>,
    notifier: Arc<dyn Notifier>,
    maps: Arc<dyn MapView>,
    resolver: CachingResolver<Arc<dyn MapView>>,
    rng: SmallRng,
}

impl World {
    pub fn new(
        config: Configuration,
        definitions: Definitions,
        maps: Arc<dyn MapView>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            definitions,
            regions: SortedSet::new(),
            notifier,
            resolver: CachingResolver::new(Arc::clone(&maps), DEFAULT_CACHE_CAPACITY),
            maps,
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.resolver = CachingResolver::new(Arc::clone(&self.maps), capacity);
        self
    }

    /// Make fight outcomes reproducible.
    pub fn seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn maps(&self) -> &dyn MapView {
        self.maps.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    pub fn region(&self, name: &str) -> Result<&Region> {
        self.regions.get(name).ok_or_else(|| Error::not_found("region", name))
    }

    pub fn region_mut(&mut self, name: &str) -> Result<&mut Region> {
        self.regions
            .get_mut(name)
            .ok_or_else(|| Error::not_found("region", name))
    }

    /// A region together with the rules it is played under.
    pub fn region_and_rules(&mut self, name: &str) -> Result<(&mut Region, &Definitions, &Configuration)> {
        let region = self
            .regions
            .get_mut(name)
            .ok_or_else(|| Error::not_found("region", name))?;
        Ok((region, &self.definitions, &self.config))
    }

    /// Up to `max` regions named after `marker`.
    pub fn regions_after(&self, marker: &str, max: usize) -> &[Region] {
        self.regions.slice(marker, max)
    }

    /// Instantiate `map` as a new region, one city per labelled vertex.
    /// City patterns from the configuration are applied round-robin.
    pub fn create_region(&mut self, name: &str, map: &str) -> Result<&Region> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("empty region name".to_string()));
        }
        if self.regions.has(name) {
            return Err(Error::already_exists("region", name));
        }
        if !self.maps.map_has(map) {
            return Err(Error::not_found("map", map));
        }
        let mut region = Region::new(name, map);
        for (n, (vertex, label)) in self.maps.seed_cities(map)?.into_iter().enumerate() {
            let mut city = City::new(vertex, label);
            if let Some(pattern) = self.config.pattern(n) {
                city.apply_pattern(pattern);
            }
            region.cities.add(city);
        }
        info!(region = name, map, cities = region.cities.len(), "region created");
        self.regions.add(region);
        self.region(name)
    }

    /// Register a region loaded from storage. Back-references are rebuilt
    /// and the result checked before it becomes visible.
    pub fn insert_region(&mut self, mut region: Region) -> Result<()> {
        if self.regions.has(region.name.as_str()) {
            return Err(Error::already_exists("region", &region.name));
        }
        region.post_load();
        region.check()?;
        if !self.maps.map_has(&region.map_name) {
            warn!(region = %region.name, map = %region.map_name, "region refers to an unknown map");
        }
        self.regions.add(region);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    pub fn produce(&mut self, name: &str) -> Result<()> {
        let region = self
            .regions
            .get_mut(name)
            .ok_or_else(|| Error::not_found("region", name))?;
        let region_name = region.name.clone();
        let ctx = RoundContext {
            region: &region_name,
            defs: &self.definitions,
            config: &self.config,
            notifier: self.notifier.as_ref(),
            resolver: &self.resolver,
        };
        region.produce(&ctx);
        debug!(region = name, "production round done");
        Ok(())
    }

    pub fn move_armies(&mut self, name: &str) -> Result<()> {
        self.resolver.clear();
        let region = self
            .regions
            .get_mut(name)
            .ok_or_else(|| Error::not_found("region", name))?;
        let region_name = region.name.clone();
        let ctx = RoundContext {
            region: &region_name,
            defs: &self.definitions,
            config: &self.config,
            notifier: self.notifier.as_ref(),
            resolver: &self.resolver,
        };
        region.move_armies(&ctx);
        debug!(region = name, "movement round done");
        Ok(())
    }

    pub fn fight_conclude(&mut self, region: &str, fight: &str, winner: Side) -> Result<()> {
        let target = self
            .regions
            .get_mut(region)
            .ok_or_else(|| Error::not_found("region", region))?;
        target.fight_conclude(&self.definitions, &self.config, fight, winner, &mut self.rng)
    }

    pub fn scores(&self, region: &str) -> Result<Vec<CityScore>> {
        Ok(self.region(region)?.scores(&self.definitions, &self.config))
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    pub fn post_load(&mut self) {
        self.definitions.sort();
        self.regions.sort();
        for region in self.regions.iter_mut() {
            region.post_load();
        }
    }

    /// Validate configuration, definitions and every region, including the
    /// placement of cities on their map.
    pub fn check(&self) -> Result<()> {
        self.config.check()?;
        self.definitions.check()?;
        self.regions.check()?;
        for region in self.regions.iter() {
            region.check()?;
            if !self.maps.map_has(&region.map_name) {
                return Err(Error::NotValid(format!(
                    "region '{}' refers to unknown map '{}'",
                    region.name, region.map_name
                )));
            }
            if let Some(city) = region
                .cities
                .iter()
                .find(|c| !self.maps.cell_has(&region.map_name, c.id))
            {
                return Err(Error::NotValid(format!(
                    "region '{}': city {} is not on map '{}'",
                    region.name, city.id, region.map_name
                )));
            }
        }
        Ok(())
    }
}

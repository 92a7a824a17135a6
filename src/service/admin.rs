use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::Service;
use crate::error::Result;
use crate::model::{CityScore, Side};
use crate::persist::save_world;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    pub name: String,
    pub map: String,
    pub cities: usize,
    pub fights: usize,
}

impl Service {
    pub async fn create_region(&self, name: &str, map: &str) -> Result<RegionSummary> {
        let mut world = self.write().await?;
        let region = world.create_region(name, map)?;
        Ok(RegionSummary {
            name: region.name.clone(),
            map: region.map_name.clone(),
            cities: region.cities.len(),
            fights: region.fights.len(),
        })
    }

    pub async fn list_regions(&self, marker: &str, max: usize) -> Result<Vec<RegionSummary>> {
        let world = self.read().await?;
        Ok(world
            .regions_after(marker, self.page(max))
            .iter()
            .map(|r| RegionSummary {
                name: r.name.clone(),
                map: r.map_name.clone(),
                cities: r.cities.len(),
                fights: r.fights.len(),
            })
            .collect())
    }

    pub async fn produce(&self, region: &str) -> Result<()> {
        self.write().await?.produce(region)
    }

    pub async fn move_armies(&self, region: &str) -> Result<()> {
        self.write().await?.move_armies(region)
    }

    pub async fn scores(&self, region: &str) -> Result<Vec<CityScore>> {
        self.read().await?.scores(region)
    }

    /// Declare the outcome of a fight.
    pub async fn fight_conclude(&self, region: &str, fight: &str, winner: Side) -> Result<()> {
        let mut world = self.write().await?;
        world.fight_conclude(region, fight, winner)?;
        info!(region, fight, winner = %winner, "fight concluded");
        Ok(())
    }

    pub async fn check(&self) -> Result<()> {
        self.read().await?.check()
    }

    pub async fn save(&self, dir: &Path) -> Result<usize> {
        let world = self.read().await?;
        save_world(&world, dir)
    }
}

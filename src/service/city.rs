use super::{Caller, Service};
use crate::error::Result;
use crate::model::{ArmyView, CityView, Resources};

impl Service {
    /// Cities the caller manages, with an id above `marker`.
    pub async fn list_cities(&self, caller: Caller, region: &str, marker: u64, max: usize) -> Result<Vec<CityView>> {
        let character = self.character(caller, region)?;
        let world = self.read().await?;
        let r = world.region(region)?;
        Ok(r.cities_of(character, marker, self.page(max))
            .into_iter()
            .map(|c| c.view(&world.definitions, &world.config, character))
            .collect())
    }

    /// Any city of the region. Managers get the full view, anyone else the
    /// public part.
    pub async fn show_city(&self, caller: Caller, region: &str, city: u64) -> Result<CityView> {
        let character = self.character(caller, region)?;
        let world = self.read().await?;
        let c = world.region(region)?.city(city)?;
        Ok(c.view(&world.definitions, &world.config, character))
    }

    pub async fn study(&self, caller: Caller, region: &str, city: u64, knowledge: u64) -> Result<String> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let (r, defs, _) = world.region_and_rules(region)?;
        r.city_for_mut(character, city)?.study(defs, knowledge)
    }

    pub async fn build(&self, caller: Caller, region: &str, city: u64, building: u64) -> Result<String> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let (r, defs, config) = world.region_and_rules(region)?;
        r.city_for_mut(character, city)?.build(defs, config, building)
    }

    pub async fn train(&self, caller: Caller, region: &str, city: u64, unit: u64) -> Result<String> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let (r, defs, config) = world.region_and_rules(region)?;
        r.city_for_mut(character, city)?.train(defs, config, unit)
    }

    pub async fn create_army(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        name: &str,
        units: &[String],
    ) -> Result<String> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let (r, _, config) = world.region_and_rules(region)?;
        r.city_for_mut(character, city)?.create_army(config, name, units)
    }

    pub async fn create_transport(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        name: &str,
        amount: Resources,
    ) -> Result<String> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let (r, _, config) = world.region_and_rules(region)?;
        r.city_for_mut(character, city)?.create_transport(config, name, amount)
    }

    /// Move units from the city into one of its armies standing at home.
    pub async fn transfer_units(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        units: &[String],
    ) -> Result<usize> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        world
            .region_mut(region)?
            .city_for_mut(character, city)?
            .transfer_units_to_army(army, units)
    }

    /// Move units from an army standing at home back into its city.
    pub async fn return_units(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        units: &[String],
    ) -> Result<usize> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        world
            .region_mut(region)?
            .city_for_mut(character, city)?
            .transfer_units_to_city(army, units)
    }

    pub async fn transfer_resources(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        amount: Resources,
    ) -> Result<()> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        world
            .region_mut(region)?
            .city_for_mut(character, city)?
            .transfer_resources_to_army(army, amount)
    }

    pub async fn return_resources(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        amount: Resources,
    ) -> Result<()> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        world
            .region_mut(region)?
            .city_for_mut(character, city)?
            .transfer_resources_to_city(army, amount)
    }

    pub async fn list_armies(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        marker: &str,
        max: usize,
    ) -> Result<Vec<ArmyView>> {
        let character = self.character(caller, region)?;
        let world = self.read().await?;
        let c = world.region(region)?.city_for(character, city)?;
        Ok(c.armies
            .slice(marker, self.page(max))
            .iter()
            .map(|a| a.view())
            .collect())
    }
}

use super::Service;
use crate::error::Result;
use crate::model::{BuildingType, KnowledgeType, UnitType};

impl Service {
    /// Unit types with an id above `marker`.
    pub async fn list_units(&self, marker: u64, max: usize) -> Result<Vec<UnitType>> {
        let world = self.read().await?;
        Ok(world.definitions.units.slice(&marker, self.page(max)).to_vec())
    }

    pub async fn list_buildings(&self, marker: u64, max: usize) -> Result<Vec<BuildingType>> {
        let world = self.read().await?;
        Ok(world.definitions.buildings.slice(&marker, self.page(max)).to_vec())
    }

    pub async fn list_knowledges(&self, marker: u64, max: usize) -> Result<Vec<KnowledgeType>> {
        let world = self.read().await?;
        Ok(world.definitions.knowledges.slice(&marker, self.page(max)).to_vec())
    }
}

use serde::Serialize;

use super::{Caller, Service};
use crate::error::{Error, Result};
use crate::model::{Action, ArmyView, AssaultArgs, Command, MoveArgs, Side};

/// Outcome of queueing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderAck {
    /// Orders in the queue, this one included.
    pub queued: usize,
    /// The army is fighting and will not act on its queue until the fight
    /// ends.
    pub in_fight: bool,
}

impl Service {
    pub async fn show_army(&self, caller: Caller, region: &str, city: u64, army: &str) -> Result<ArmyView> {
        let character = self.character(caller, region)?;
        let world = self.read().await?;
        let c = world.region(region)?.city_for(character, city)?;
        c.armies
            .get(army)
            .map(|a| a.view())
            .ok_or_else(|| Error::not_found("army", army))
    }

    /// Drop every queued order.
    pub async fn cancel(&self, caller: Caller, region: &str, city: u64, army: &str) -> Result<()> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        world
            .region_mut(region)?
            .city_for_mut(character, city)?
            .armies
            .get_mut(army)
            .ok_or_else(|| Error::not_found("army", army))?
            .cancel();
        Ok(())
    }

    pub async fn flea(&self, caller: Caller, region: &str, city: u64, army: &str) -> Result<()> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let r = world.region_mut(region)?;
        owned_army(r.city_for(character, city)?, army)?;
        r.army_flea(army)
    }

    pub async fn flip(&self, caller: Caller, region: &str, city: u64, army: &str) -> Result<Side> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let r = world.region_mut(region)?;
        owned_army(r.city_for(character, city)?, army)?;
        r.army_flip(army)
    }

    /// Append `action` at `cell` to the army's queue. The cell must exist on
    /// the region's map. Orders to an army in a fight are queued and flagged.
    pub async fn order(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        cell: u64,
        action: Action,
    ) -> Result<OrderAck> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        let map = world.region(region)?.map_name.clone();
        if !world.maps().cell_has(&map, cell) {
            return Err(Error::not_found("cell", cell));
        }
        let c = world.region_mut(region)?.city_for_mut(character, city)?;
        c.ensure_manual()?;
        let a = c
            .armies
            .get_mut(army)
            .ok_or_else(|| Error::not_found("army", army))?;
        a.defer(Command::new(cell, action));
        Ok(OrderAck {
            queued: a.commands.len(),
            in_fight: a.in_fight(),
        })
    }

    /// [`Service::order`] with the action given as a tag and JSON arguments.
    pub async fn order_json(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        cell: u64,
        tag: &str,
        args: Option<&str>,
    ) -> Result<OrderAck> {
        let action = Action::parse(tag, args)?;
        self.order(caller, region, city, army, cell, action).await
    }

    pub async fn move_to(&self, caller: Caller, region: &str, city: u64, army: &str, cell: u64, args: MoveArgs) -> Result<OrderAck> {
        self.order(caller, region, city, army, cell, Action::Move(args)).await
    }

    pub async fn wait_at(&self, caller: Caller, region: &str, city: u64, army: &str, cell: u64) -> Result<OrderAck> {
        self.order(caller, region, city, army, cell, Action::Wait).await
    }

    pub async fn defend(&self, caller: Caller, region: &str, city: u64, army: &str, cell: u64) -> Result<OrderAck> {
        self.order(caller, region, city, army, cell, Action::Defend).await
    }

    pub async fn attack(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        cell: u64,
        args: AssaultArgs,
    ) -> Result<OrderAck> {
        self.order(caller, region, city, army, cell, Action::Attack(args)).await
    }

    pub async fn disband(&self, caller: Caller, region: &str, city: u64, army: &str, cell: u64) -> Result<OrderAck> {
        self.order(caller, region, city, army, cell, Action::Disband).await
    }

    /// Set the army's stance toward `target`; 0 clears it.
    pub async fn set_posture(
        &self,
        caller: Caller,
        region: &str,
        city: u64,
        army: &str,
        target: u64,
        posture: i64,
    ) -> Result<()> {
        let character = self.character(caller, region)?;
        let mut world = self.write().await?;
        world
            .region_mut(region)?
            .city_for_mut(character, city)?
            .armies
            .get_mut(army)
            .ok_or_else(|| Error::not_found("army", army))?
            .set_posture(target, posture);
        Ok(())
    }
}

fn owned_army(city: &crate::model::City, army: &str) -> Result<()> {
    if city.armies.has(army) {
        Ok(())
    } else {
        Err(Error::not_found("army", army))
    }
}

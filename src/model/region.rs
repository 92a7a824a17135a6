use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::army::Army;
use super::asset::Construction;
use super::city::City;
use super::command::{Action, AssaultArgs, MoveArgs};
use super::config::Configuration;
use super::definitions::Definitions;
use super::fight::{Belligerent, Fight, Side};
use super::sorted_set::{Keyed, SortedSet};
use crate::error::{Error, Result};
use crate::sim::RoundContext;

/// A running instance of a map: its cities (with their armies) and the
/// fights between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    #[serde(rename = "map")]
    pub map_name: String,
    #[serde(default)]
    pub cities: SortedSet<City>,
    #[serde(default)]
    pub fights: SortedSet<Fight>,
}

impl Keyed for Region {
    type Key = String;

    fn key(&self) -> &String {
        &self.name
    }
}

/// What one movement step did to an army.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Stand,
    Moved,
    Disband,
}

/// What happens to the head command once its action ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arrival {
    Pop,
    Keep,
    Disband,
}

impl Region {
    pub fn new(name: impl Into<String>, map_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map_name: map_name.into(),
            cities: SortedSet::new(),
            fights: SortedSet::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn city(&self, id: u64) -> Result<&City> {
        self.cities.get(&id).ok_or_else(|| Error::not_found("city", id))
    }

    pub fn city_mut(&mut self, id: u64) -> Result<&mut City> {
        self.cities.get_mut(&id).ok_or_else(|| Error::not_found("city", id))
    }

    /// The city, if `character` owns it or is its deputy.
    pub fn city_for(&self, character: u64, id: u64) -> Result<&City> {
        let city = self.city(id)?;
        if !city.is_managed_by(character) {
            return Err(Error::PermissionDenied(format!(
                "character {character} does not manage city {id}"
            )));
        }
        Ok(city)
    }

    pub fn city_for_mut(&mut self, character: u64, id: u64) -> Result<&mut City> {
        self.city_for(character, id)?;
        self.city_mut(id)
    }

    /// Cities managed by `character` with an id above `marker`.
    pub fn cities_of(&self, character: u64, marker: u64, max: usize) -> Vec<&City> {
        self.cities
            .slice(&marker, usize::MAX)
            .iter()
            .filter(|c| c.is_managed_by(character))
            .take(max)
            .collect()
    }

    /// City owning the army.
    pub fn army_owner(&self, army: &str) -> Option<u64> {
        self.cities
            .iter()
            .find(|c| c.armies.has(army))
            .map(|c| c.id)
    }

    pub fn army(&self, army: &str) -> Result<&Army> {
        self.cities
            .iter()
            .find_map(|c| c.armies.get(army))
            .ok_or_else(|| Error::not_found("army", army))
    }

    pub fn army_mut(&mut self, army: &str) -> Result<&mut Army> {
        self.cities
            .iter_mut()
            .find_map(|c| c.armies.get_mut(army))
            .ok_or_else(|| Error::not_found("army", army))
    }

    pub fn fight(&self, id: &str) -> Result<&Fight> {
        self.fights.get(id).ok_or_else(|| Error::not_found("fight", id))
    }

    fn fight_at(&self, cell: u64) -> Option<String> {
        self.fights.iter().find(|f| f.cell == cell).map(|f| f.id.clone())
    }

    // -----------------------------------------------------------------------
    // Politics
    // -----------------------------------------------------------------------

    /// Make `overlord` the overlord of `liege` at the given tax rate.
    pub fn conquer_city(&mut self, overlord: u64, liege: u64, rate: f64) -> Result<()> {
        if overlord == liege {
            return Err(Error::InvalidArgument(format!("city {liege} cannot conquer itself")));
        }
        self.city(overlord)?;
        self.city_mut(liege)?.set_overlord(overlord, rate);
        self.rebuild_lieges();
        Ok(())
    }

    /// Release `liege` if `overlord` is its overlord. Otherwise a no-op.
    pub fn liberate_city(&mut self, overlord: u64, liege: u64) -> Result<()> {
        let city = self.city_mut(liege)?;
        if city.overlord == overlord {
            city.gain_freedom();
            self.rebuild_lieges();
        }
        Ok(())
    }

    pub fn gain_freedom(&mut self, city: u64) -> Result<()> {
        self.city_mut(city)?.gain_freedom();
        self.rebuild_lieges();
        Ok(())
    }

    fn rebuild_lieges(&mut self) {
        let mut lieges: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for city in self.cities.iter() {
            if city.overlord != 0 {
                lieges.entry(city.overlord).or_default().push(city.id);
            }
        }
        for city in self.cities.iter_mut() {
            city.lieges = lieges.remove(&city.id).unwrap_or_default();
        }
    }

    // -----------------------------------------------------------------------
    // Production round
    // -----------------------------------------------------------------------

    /// Run production on every city in id order. Instant tax reaches the
    /// overlord within the same round, after the liege's own production,
    /// and is trimmed to the overlord's capacity whichever city runs first.
    pub fn produce(&mut self, ctx: &RoundContext<'_>) {
        let ids: Vec<u64> = self.cities.keys().copied().collect();
        debug!(region = %self.name, cities = ids.len(), "production round");
        for id in ids {
            let Some(city) = self.cities.get_mut(&id) else {
                continue;
            };
            let owed = city.produce(ctx);
            if owed.is_zero() {
                continue;
            }
            let overlord = city.overlord;
            match self.cities.get_mut(&overlord) {
                Some(o) => {
                    o.stock.add(&owed);
                    o.stock.trim_to(&o.actual_capacity(ctx.defs));
                    o.counters.tax_received.add(&owed);
                    o.counters.resource_received.add(&owed);
                }
                None => warn!(region = %self.name, city = id, overlord, "tax owed to an unknown overlord is lost"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Movement round
    // -----------------------------------------------------------------------

    /// Step every army once, in `(city, army)` order. A failing army is
    /// logged and skipped.
    pub fn move_armies(&mut self, ctx: &RoundContext<'_>) {
        let order: Vec<(u64, String)> = self
            .cities
            .iter()
            .flat_map(|c| c.armies.keys().map(move |a| (c.id, a.clone())))
            .collect();
        debug!(region = %self.name, armies = order.len(), "movement round");
        for (city, army) in order {
            if let Err(err) = self.army_step(ctx, city, &army) {
                warn!(region = %self.name, city, army = %army, error = %err, "army step failed");
            }
        }
    }

    /// The army leaves its city's set for the duration of the step so the
    /// rest of the region stays freely borrowable.
    fn army_step(&mut self, ctx: &RoundContext<'_>, city: u64, army_id: &str) -> Result<()> {
        let Some(mut army) = self
            .cities
            .get_mut(&city)
            .and_then(|c| c.armies.remove(army_id))
        else {
            return Ok(());
        };
        let step = self.step_detached(ctx, &mut army);
        if let Ok(Step::Disband) = step {
            self.disband(ctx.defs, ctx.config, army);
            return Ok(());
        }
        self.city_mut(city)?.armies.add(army);
        step.map(|_| ())
    }

    fn step_detached(&mut self, ctx: &RoundContext<'_>, army: &mut Army) -> Result<Step> {
        if army.in_fight() {
            return Ok(Step::Stand);
        }
        let Some(command) = army.commands.front().cloned() else {
            return Ok(Step::Stand);
        };
        let (src, dst) = (army.cell, command.cell);
        let mut step = Step::Stand;
        if src != dst {
            let next = match ctx.resolver.step(&self.map_name, src, dst) {
                Ok(next) if next != 0 => next,
                outcome => {
                    if let Err(err) = outcome {
                        debug!(region = %self.name, army = %army.id, src, dst, error = %err, "no route");
                    }
                    self.notify_no_route(ctx, army, src, dst);
                    return Ok(Step::Stand);
                }
            };
            army.cell = next;
            step = Step::Moved;
            if let Some(owner) = self.cities.get_mut(&army.city) {
                owner.counters.moves += 1;
            }
            ctx.notifier.army(ctx.region, army.city).item(&army.id).moved(src, next).send();
        }
        if army.cell == dst {
            match self.arrive(ctx, army, &command.action)? {
                Arrival::Pop => {
                    army.commands.pop_front();
                }
                Arrival::Keep => {}
                Arrival::Disband => return Ok(Step::Disband),
            }
        }
        self.apply_aggressivity(army)?;
        Ok(step)
    }

    fn notify_no_route(&self, ctx: &RoundContext<'_>, army: &Army, src: u64, dst: u64) {
        ctx.notifier.army(ctx.region, army.city).item(&army.id).no_route(src, dst).send();
        if src != army.city && self.cities.has(&src) {
            ctx.notifier.army(ctx.region, src).item(&army.id).no_route(src, dst).send();
        }
    }

    fn arrive(&mut self, ctx: &RoundContext<'_>, army: &mut Army, action: &Action) -> Result<Arrival> {
        match action {
            Action::Wait => Ok(Arrival::Keep),
            Action::Move(args) => {
                if !args.is_empty() {
                    self.deliver(army, args);
                }
                Ok(Arrival::Pop)
            }
            Action::Disband => Ok(Arrival::Disband),
            Action::Attack(args) => {
                self.join_city_attack(ctx, army, *args)?;
                Ok(Arrival::Pop)
            }
            Action::Defend => {
                if self.join_city_defence(army)? {
                    Ok(Arrival::Keep)
                } else {
                    Ok(Arrival::Pop)
                }
            }
        }
    }

    /// Hand resources and units to the city on the army's cell.
    fn deliver(&mut self, army: &mut Army, args: &MoveArgs) {
        let owner = army.city;
        let Some(target) = self.cities.get_mut(&army.cell) else {
            warn!(region = %self.name, army = %army.id, cell = army.cell, "nothing to deliver to");
            return;
        };
        let amount = args.amount.trimmed_to(&army.stock);
        army.stock.remove(&amount);
        target.stock.add(&amount);
        target.counters.resource_received.add(&amount);
        if args.tax {
            target.counters.tax_received.add(&amount);
        }
        for id in &args.units {
            if let Some(unit) = army.units.remove(id.as_str()) {
                target.units.add(unit);
            }
        }
        if let Some(sender) = self.cities.get_mut(&owner) {
            sender.counters.resource_sent.add(&amount);
            if args.tax {
                sender.counters.tax_sent.add(&amount);
            }
        }
    }

    /// Friendly means the owner's own city or one run by the same character.
    fn is_friendly(&self, army: &Army, cell: u64) -> bool {
        let Some(host) = self.cities.get(&cell) else {
            return false;
        };
        if host.id == army.city {
            return true;
        }
        self.cities
            .get(&army.city)
            .is_some_and(|owner| owner.owner != 0 && owner.owner == host.owner)
    }

    fn disband(&mut self, defs: &Definitions, config: &Configuration, army: Army) {
        let (owner, cell) = (army.city, army.cell);
        if self.is_friendly(&army, cell) {
            let bonus: i64 = army
                .units
                .iter()
                .filter_map(|u| defs.unit(u.type_id).ok())
                .map(|ut| ut.pop_bonus_disband)
                .sum();
            if let Some(host) = self.cities.get_mut(&cell) {
                host.receive_army(army);
            }
            if let Some(owner) = self.cities.get_mut(&owner) {
                owner.permanent_popularity += config.pop_bonus_army_disband + bonus;
            }
        } else {
            info!(region = %self.name, army = %army.id, cell, "army disbanded away from friends, content lost");
            if let Some(owner) = self.cities.get_mut(&owner) {
                owner.counters.units_lost += army.units.len() as u64;
            }
        }
    }

    fn join_city_attack(&mut self, ctx: &RoundContext<'_>, army: &mut Army, args: AssaultArgs) -> Result<()> {
        let target_id = army.cell;
        if target_id == army.city {
            warn!(region = ctx.region, army = %army.id, "army ordered to attack its own city");
            return Ok(());
        }
        let Some(target) = self.cities.get_mut(&target_id) else {
            warn!(region = ctx.region, army = %army.id, cell = target_id, "attack on a cell without city");
            return Ok(());
        };
        let fight_id = match target.assault.clone() {
            Some(id) if self.fights.has(id.as_str()) => id,
            _ => {
                let mut fight = Fight::new(target_id);
                let defence = target.create_defence();
                if let Some(d) = target.armies.get_mut(defence.as_str()) {
                    d.fight = Some(fight.id.clone());
                }
                target.assault = Some(fight.id.clone());
                target.counters.fights_joined += 1;
                fight.join(
                    Side::Defence,
                    Belligerent {
                        army: defence,
                        city: target_id,
                        assault: AssaultArgs::default(),
                    },
                )?;
                let id = fight.id.clone();
                self.fights.add(fight);
                id
            }
        };
        self.enlist(army, &fight_id, Side::Attack, args)
    }

    /// Join defenders if a fight runs on the army's cell.
    fn join_city_defence(&mut self, army: &mut Army) -> Result<bool> {
        let Some(fight_id) = self.fight_at(army.cell) else {
            return Ok(false);
        };
        self.enlist(army, &fight_id, Side::Defence, AssaultArgs::default())?;
        Ok(true)
    }

    fn enlist(&mut self, army: &mut Army, fight_id: &str, side: Side, assault: AssaultArgs) -> Result<()> {
        let fight = self
            .fights
            .get_mut(fight_id)
            .ok_or_else(|| Error::not_found("fight", fight_id))?;
        fight.join(
            side,
            Belligerent {
                army: army.id.clone(),
                city: army.city,
                assault,
            },
        )?;
        army.fight = Some(fight_id.to_string());
        if let Some(owner) = self.cities.get_mut(&army.city) {
            owner.counters.fights_joined += 1;
        }
        Ok(())
    }

    /// An idle army with postures joins fights on its cell: against cities
    /// it is hostile to, beside cities it supports.
    fn apply_aggressivity(&mut self, army: &mut Army) -> Result<()> {
        if army.in_fight() || army.postures.is_empty() {
            return Ok(());
        }
        let mut choice = None;
        'fights: for fight in self.fights.iter().filter(|f| f.cell == army.cell) {
            for (&city, &posture) in &army.postures {
                if city == army.city {
                    continue;
                }
                let side = if fight.cell == city || fight.involves(Side::Defence, city) {
                    Side::Defence
                } else if fight.involves(Side::Attack, city) {
                    Side::Attack
                } else {
                    continue;
                };
                let side = if posture < 0 { side.opposite() } else { side };
                choice = Some((fight.id.clone(), side));
                break 'fights;
            }
        }
        match choice {
            Some((fight_id, side)) => self.enlist(army, &fight_id, side, AssaultArgs::default()),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Fights
    // -----------------------------------------------------------------------

    /// Leave the current fight as a loser.
    pub fn army_flea(&mut self, army_id: &str) -> Result<()> {
        let army = self.army_mut(army_id)?;
        let owner = army.city;
        let fight_id = army.fight.take().ok_or_else(|| {
            Error::PreconditionFailed(format!("army {army_id} is not in a fight"))
        })?;
        if let Some(fight) = self.fights.get_mut(fight_id.as_str()) {
            fight.leave(army_id);
        }
        let city = self.city_mut(owner)?;
        city.counters.fights_left += 1;
        city.counters.fights_lost += 1;
        self.dissolve_if_decided(&fight_id);
        Ok(())
    }

    /// Change sides within the current fight. Returns the new side.
    pub fn army_flip(&mut self, army_id: &str) -> Result<Side> {
        let fight_id = self.army(army_id)?.fight.clone().ok_or_else(|| {
            Error::PreconditionFailed(format!("army {army_id} is not in a fight"))
        })?;
        let side = self
            .fights
            .get_mut(fight_id.as_str())
            .and_then(|f| f.flip(army_id))
            .ok_or_else(|| Error::Internal(format!("army {army_id} missing from fight {fight_id}")))?;
        self.dissolve_if_decided(&fight_id);
        Ok(side)
    }

    /// Close a decided fight: credit the counters, destroy the losing
    /// armies, apply what the winning attackers asked for, then dissolve.
    ///
    /// Each destroyed unit is a kill, handed out in turn to the eligible
    /// units of the winning side; the owner of the killer earns its type's
    /// kill bonus.
    pub fn fight_conclude(
        &mut self,
        defs: &Definitions,
        config: &Configuration,
        fight_id: &str,
        winner: Side,
        rng: &mut impl Rng,
    ) -> Result<()> {
        let fight = self.fight(fight_id)?.clone();
        let mut killers = Vec::new();
        let mut kills = 0usize;
        for (side, member) in fight.members() {
            let Some(army) = self
                .cities
                .get(&member.city)
                .and_then(|c| c.armies.get(member.army.as_str()))
            else {
                continue;
            };
            if side == winner {
                killers.extend(
                    army.units
                        .iter()
                        .filter(|u| u.is_eligible())
                        .map(|u| (member.city, u.type_id)),
                );
            } else {
                kills += army.units.len();
            }
        }
        for &(city, type_id) in killers.iter().cycle().take(kills) {
            let bonus = defs.unit(type_id).map_or(0, |ut| ut.pop_bonus_kill);
            if let Some(city) = self.cities.get_mut(&city) {
                city.permanent_popularity += bonus;
            }
        }

        for (side, member) in fight.members() {
            let won = side == winner;
            if let Some(city) = self.cities.get_mut(&member.city) {
                if won {
                    city.counters.fights_won += 1;
                } else {
                    city.counters.fights_lost += 1;
                }
            }
            if !won {
                self.destroy_army(defs, member.city, &member.army);
            }
        }
        if winner == Side::Attack {
            for member in fight.attack.iter() {
                self.apply_assault(defs, config, member, fight.cell, &mut *rng)?;
            }
        }
        self.dissolve(fight_id);
        Ok(())
    }

    fn destroy_army(&mut self, defs: &Definitions, city: u64, army: &str) {
        let Some(owner) = self.cities.get_mut(&city) else {
            return;
        };
        let Some(army) = owner.armies.remove(army) else {
            return;
        };
        owner.counters.units_lost += army.units.len() as u64;
        for unit in army.units.iter() {
            if let Ok(ut) = defs.unit(unit.type_id) {
                owner.permanent_popularity += ut.pop_bonus_death;
            }
        }
    }

    fn apply_assault(
        &mut self,
        defs: &Definitions,
        config: &Configuration,
        member: &Belligerent,
        target: u64,
        rng: &mut impl Rng,
    ) -> Result<()> {
        let args = member.assault;
        if member.city == target {
            return Ok(());
        }
        if args.overlord {
            self.conquer_city(member.city, target, config.rate_overlord)?;
        }
        if args.massacre {
            self.city_mut(target)?.ticks_massacres += 1;
        }
        if args.break_building {
            let victim = self.city_mut(target)?;
            let finished: Vec<(String, u64)> = victim
                .buildings
                .iter()
                .filter(|b| b.is_finished())
                .map(|b| (b.id.clone(), b.type_id))
                .collect();
            if let Some((id, type_id)) = finished.choose(rng) {
                victim.buildings.remove(id.as_str());
                if let Ok(bt) = defs.building(*type_id) {
                    victim.permanent_popularity += bt.pop_bonus_fall;
                    let pop = bt.pop_bonus_destroy;
                    self.city_mut(member.city)?.permanent_popularity += pop;
                }
            }
        }
        Ok(())
    }

    fn dissolve_if_decided(&mut self, fight_id: &str) {
        if self.fights.get(fight_id).is_some_and(Fight::is_decided) {
            self.dissolve(fight_id);
        }
    }

    /// Remove the fight and release every army still in it. Defenders idle
    /// on their own cell go back into their city.
    fn dissolve(&mut self, fight_id: &str) {
        let Some(fight) = self.fights.remove(fight_id) else {
            return;
        };
        for (side, member) in fight.members() {
            let Some(city) = self.cities.get_mut(&member.city) else {
                continue;
            };
            let Some(army) = city.armies.get_mut(member.army.as_str()) else {
                continue;
            };
            army.fight = None;
            if side == Side::Defence && army.at_home() && army.commands.is_empty() {
                if let Some(army) = city.armies.remove(member.army.as_str()) {
                    city.receive_army(army);
                }
            }
        }
        if let Some(city) = self.cities.get_mut(&fight.cell) {
            if city.assault.as_deref() == Some(fight_id) {
                city.assault = None;
            }
        }
        debug!(region = %self.name, fight = fight_id, "fight dissolved");
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Re-sort every set and rebuild the back-references that are not
    /// persisted.
    pub fn post_load(&mut self) {
        self.cities.sort();
        self.fights.sort();
        for fight in self.fights.iter_mut() {
            fight.attack.sort();
            fight.defence.sort();
        }
        for city in self.cities.iter_mut() {
            city.knowledges.sort();
            city.buildings.sort();
            city.units.sort();
            city.armies.sort();
            city.artifacts.sort();
            city.assault = None;
            let id = city.id;
            for army in city.armies.iter_mut() {
                army.city = id;
                army.units.sort();
                army.artifacts.sort();
            }
        }
        let assaults: Vec<(u64, String)> = self
            .fights
            .iter()
            .map(|f| (f.cell, f.id.clone()))
            .collect();
        for (cell, id) in assaults {
            if let Some(city) = self.cities.get_mut(&cell) {
                city.assault = Some(id);
            }
        }
        self.rebuild_lieges();
    }

    pub fn check(&self) -> Result<()> {
        let invalid = |msg: String| Error::NotValid(format!("region '{}': {msg}", self.name));
        self.cities.check()?;
        self.fights.check()?;

        let mut membership: BTreeMap<&str, &str> = BTreeMap::new();
        for fight in self.fights.iter() {
            fight.check()?;
            for (_, member) in fight.members() {
                if membership.insert(&member.army, &fight.id).is_some() {
                    return Err(invalid(format!("army {} in several fights", member.army)));
                }
                let army = self
                    .cities
                    .get(&member.city)
                    .and_then(|c| c.armies.get(member.army.as_str()))
                    .ok_or_else(|| invalid(format!("fight {} lists unknown army {}", fight.id, member.army)))?;
                if army.fight.as_deref() != Some(fight.id.as_str()) {
                    return Err(invalid(format!("army {} unaware of fight {}", army.id, fight.id)));
                }
            }
        }

        for city in self.cities.iter() {
            if city.id == 0 {
                return Err(invalid("city with id 0".to_string()));
            }
            city.knowledges.check()?;
            city.buildings.check()?;
            city.units.check()?;
            city.armies.check()?;
            city.artifacts.check()?;
            if city.overlord != 0 && !self.cities.has(&city.overlord) {
                return Err(invalid(format!("city {} has unknown overlord {}", city.id, city.overlord)));
            }
            if city.overlord == city.id && city.id != 0 {
                return Err(invalid(format!("city {} is its own overlord", city.id)));
            }
            for army in city.armies.iter() {
                if army.city != city.id {
                    return Err(invalid(format!("army {} has a stale owner", army.id)));
                }
                army.units.check()?;
                if let Some(fight) = &army.fight {
                    if membership.get(army.id.as_str()) != Some(&fight.as_str()) {
                        return Err(invalid(format!("army {} claims fight {fight}", army.id)));
                    }
                }
            }
        }
        Ok(())
    }
}

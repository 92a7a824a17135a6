use serde::{Deserialize, Serialize};
use tracing::warn;

use super::army::Army;
use super::asset::{Artifact, Building, Construction, Knowledge, Unit};
use super::config::{CityPattern, Configuration};
use super::definitions::{Blueprint, Definitions};
use super::frontier::{KnowledgeState, building_allowed, knowledge_allowed, unit_allowed};
use super::resources::{Modifier, Multiplier, Resources};
use super::sorted_set::{Keyed, SortedSet};
use crate::error::{Error, Result};
use crate::id::new_id;
use crate::notify::Notifier;
use crate::sim::RoundContext;

/// Running totals kept for scoring and display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub resource_produced: Resources,
    pub resource_sent: Resources,
    pub resource_received: Resources,
    pub tax_sent: Resources,
    pub tax_received: Resources,
    pub moves: u64,
    pub fights_joined: u64,
    pub fights_left: u64,
    pub fights_won: u64,
    pub fights_lost: u64,
    pub units_raised: u64,
    pub units_lost: u64,
}

/// A permanent site at one map vertex; `id` is the vertex id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct City {
    pub id: u64,
    pub name: String,
    pub owner: u64,
    pub deputy: u64,
    /// City collecting tax from this one, 0 for none.
    pub overlord: u64,
    pub tax_rate: Multiplier,
    pub permanent_popularity: i64,
    pub permanent_health: i64,
    pub permanent_intelligence: i64,
    /// Lawful (<0) to chaotic (>0).
    pub chaotic: i32,
    /// Bad (<0) to good (>0).
    pub alignment: i32,
    pub ethnic_group: u32,
    pub political_group: u32,
    pub cult: u32,
    pub stock: Resources,
    pub stock_capacity: Resources,
    /// Base production, before modifiers.
    pub production: Resources,
    /// Pending massacres; one recovers per production round.
    pub ticks_massacres: u32,
    /// Played by the engine: new starts and orders are refused.
    pub auto: bool,
    pub counters: Counters,
    pub knowledges: SortedSet<Knowledge>,
    pub buildings: SortedSet<Building>,
    pub units: SortedSet<Unit>,
    pub armies: SortedSet<Army>,
    pub artifacts: SortedSet<Artifact>,
    /// Fight running on this city's cell, rebuilt from the region's fights.
    #[serde(skip)]
    pub assault: Option<String>,
    /// Cities this one is the overlord of, rebuilt at load.
    #[serde(skip)]
    pub lieges: Vec<u64>,
}

impl Default for City {
    fn default() -> Self {
        City::new(0, "")
    }
}

impl Keyed for City {
    type Key = u64;

    fn key(&self) -> &u64 {
        &self.id
    }
}

impl City {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: 0,
            deputy: 0,
            overlord: 0,
            tax_rate: Multiplier::splat(0.0),
            permanent_popularity: 0,
            permanent_health: 0,
            permanent_intelligence: 0,
            chaotic: 0,
            alignment: 0,
            ethnic_group: 0,
            political_group: 0,
            cult: 0,
            stock: Resources::ZERO,
            stock_capacity: Resources::ZERO,
            production: Resources::ZERO,
            ticks_massacres: 0,
            auto: false,
            counters: Counters::default(),
            knowledges: SortedSet::new(),
            buildings: SortedSet::new(),
            units: SortedSet::new(),
            armies: SortedSet::new(),
            artifacts: SortedSet::new(),
            assault: None,
            lieges: Vec::new(),
        }
    }

    pub fn apply_pattern(&mut self, pattern: &CityPattern) {
        self.stock = pattern.stock;
        self.stock_capacity = pattern.stock_capacity;
        self.production = pattern.production;
        self.permanent_popularity = pattern.permanent_popularity;
        self.permanent_health = pattern.permanent_health;
        self.permanent_intelligence = pattern.permanent_intelligence;
    }

    /// Owner or deputy.
    pub fn is_managed_by(&self, character: u64) -> bool {
        character != 0 && (self.owner == character || self.deputy == character)
    }

    pub(crate) fn ensure_manual(&self) -> Result<()> {
        if self.auto {
            return Err(Error::PreconditionFailed(format!(
                "city {} is in automatic mode",
                self.id
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Derived values
    // -----------------------------------------------------------------------

    /// Composed production modifier of the eligible units garrisoned here.
    pub fn unit_modifier(&self, defs: &Definitions) -> Modifier {
        self.units
            .iter()
            .filter(|u| u.is_eligible())
            .filter_map(|u| defs.unit(u.type_id).ok())
            .fold(Modifier::IDENTITY, |acc, ut| acc.compose(&ut.prod))
    }

    /// Composed `(production, stock)` modifiers of finished buildings.
    pub fn building_modifiers(&self, defs: &Definitions) -> (Modifier, Modifier) {
        let mut prod = Modifier::IDENTITY;
        let mut stock = Modifier::IDENTITY;
        for b in self.buildings.iter().filter(|b| b.is_finished()) {
            if let Ok(bt) = defs.building(b.type_id) {
                prod = prod.compose(&bt.prod);
                stock = stock.compose(&bt.stock);
            }
        }
        (prod, stock)
    }

    /// Composed `(production, stock)` modifiers of finished knowledge.
    pub fn knowledge_modifiers(&self, defs: &Definitions) -> (Modifier, Modifier) {
        let mut prod = Modifier::IDENTITY;
        let mut stock = Modifier::IDENTITY;
        for k in self.knowledges.iter().filter(|k| k.is_finished()) {
            if let Ok(kt) = defs.knowledge(k.type_id) {
                prod = prod.compose(&kt.prod);
                stock = stock.compose(&kt.stock);
            }
        }
        (prod, stock)
    }

    /// Base production through unit, building then knowledge modifiers.
    pub fn actual_production(&self, defs: &Definitions) -> Resources {
        let (b, _) = self.building_modifiers(defs);
        let (k, _) = self.knowledge_modifiers(defs);
        let u = self.unit_modifier(defs);
        self.production.applied(&u.compose(&b).compose(&k))
    }

    /// Stock capacity through building then knowledge modifiers.
    pub fn actual_capacity(&self, defs: &Definitions) -> Resources {
        let (_, b) = self.building_modifiers(defs);
        let (_, k) = self.knowledge_modifiers(defs);
        self.stock_capacity.applied(&b.compose(&k))
    }

    /// Permanent popularity plus the transient bonuses of live units,
    /// finished buildings and knowledge, and live armies.
    pub fn popularity(&self, defs: &Definitions, config: &Configuration) -> i64 {
        let mut pop = self.permanent_popularity;
        let all_units = self
            .units
            .iter()
            .chain(self.armies.iter().flat_map(|a| a.units.iter()));
        for u in all_units.filter(|u| u.is_eligible()) {
            if let Ok(ut) = defs.unit(u.type_id) {
                pop += ut.pop_bonus;
            }
        }
        for b in self.buildings.iter().filter(|b| b.is_finished()) {
            if let Ok(bt) = defs.building(b.type_id) {
                pop += bt.pop_bonus;
            }
        }
        for k in self.knowledges.iter().filter(|k| k.is_finished()) {
            if let Ok(kt) = defs.knowledge(k.type_id) {
                pop += kt.pop_bonus;
            }
        }
        pop + self.armies.len() as i64 * config.pop_bonus_army_alive
    }

    pub fn health(&self) -> i64 {
        self.permanent_health
    }

    pub fn intelligence(&self) -> i64 {
        self.permanent_intelligence
    }

    // -----------------------------------------------------------------------
    // Production round
    // -----------------------------------------------------------------------

    /// One production round. Returns the tax owed to the overlord when
    /// transfers are instant; in transport mode the tax leaves in a
    /// transport army and nothing is returned.
    pub fn produce(&mut self, ctx: &RoundContext<'_>) -> Resources {
        let mut prod = self.actual_production(ctx.defs);
        if self.ticks_massacres > 0 {
            let n = i32::try_from(self.ticks_massacres).unwrap_or(i32::MAX);
            prod.multiply(&Multiplier::splat(ctx.config.massacre_impact.powi(n)));
            self.ticks_massacres -= 1;
        }
        self.stock.add(&prod);
        self.counters.resource_produced.add(&prod);

        let mut owed = Resources::ZERO;
        if self.overlord != 0 {
            let tax = prod.scaled(&self.tax_rate).trimmed_to(&self.stock);
            if !tax.is_zero() {
                self.stock.remove(&tax);
                if ctx.config.instant_transfers {
                    self.counters.tax_sent.add(&tax);
                    self.counters.resource_sent.add(&tax);
                    owed = tax;
                } else {
                    self.spawn_tax_transport(tax);
                }
            }
        }

        self.advance_units(ctx);
        self.advance_buildings(ctx.defs);
        self.advance_knowledges(ctx);

        let capacity = self.actual_capacity(ctx.defs);
        self.stock.trim_to(&capacity);
        owed
    }

    fn spawn_tax_transport(&mut self, tax: Resources) {
        let mut army = Army::new(self.id, format!("Tax of {}", self.name));
        army.stock = tax;
        army.defer_move(
            self.overlord,
            super::command::MoveArgs {
                amount: tax,
                units: Vec::new(),
                tax: true,
            },
        );
        army.defer_disband(self.id);
        self.armies.add(army);
    }

    fn advance_units(&mut self, ctx: &RoundContext<'_>) {
        let notifier: &dyn Notifier = ctx.notifier;
        for unit in self.units.iter_mut() {
            let Some(ut) = advance_one(unit, &ctx.defs.units, &mut self.stock) else {
                continue;
            };
            notifier
                .units(ctx.region, self.id)
                .item(&unit.id)
                .step(ut.ticks.saturating_sub(unit.ticks), ut.ticks)
                .send();
            if unit.ticks == 0 {
                unit.health = ut.health;
                self.permanent_popularity += ut.pop_bonus_train;
                self.counters.units_raised += 1;
            }
        }
    }

    fn advance_buildings(&mut self, defs: &Definitions) {
        for building in self.buildings.iter_mut() {
            if let Some(bt) = advance_one(building, &defs.buildings, &mut self.stock) {
                if building.ticks == 0 {
                    self.permanent_popularity += bt.pop_bonus_build;
                }
            }
        }
    }

    fn advance_knowledges(&mut self, ctx: &RoundContext<'_>) {
        let notifier: &dyn Notifier = ctx.notifier;
        for knowledge in self.knowledges.iter_mut() {
            let Some(kt) = advance_one(knowledge, &ctx.defs.knowledges, &mut self.stock) else {
                continue;
            };
            notifier
                .knowledge(ctx.region, self.id)
                .item(&knowledge.id)
                .step(kt.ticks.saturating_sub(knowledge.ticks), kt.ticks)
                .send();
            if knowledge.ticks == 0 {
                self.permanent_popularity += kt.pop_bonus_learn;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Starts
    // -----------------------------------------------------------------------

    fn pay(&mut self, cost: &Resources) -> Result<()> {
        if !self.stock.covers(cost) {
            return Err(Error::PreconditionFailed(format!(
                "city {} cannot afford {:?}",
                self.id, cost.0
            )));
        }
        self.stock.remove(cost);
        Ok(())
    }

    /// Start studying a knowledge type. Returns the new instance id.
    pub fn study(&mut self, defs: &Definitions, type_id: u64) -> Result<String> {
        self.ensure_manual()?;
        let kt = defs.knowledge(type_id)?;
        if self.knowledges.iter().any(|k| k.type_id == type_id) {
            return Err(Error::already_exists("knowledge", type_id));
        }
        if !knowledge_allowed(kt, &KnowledgeState::of(&self.knowledges)) {
            return Err(Error::PreconditionFailed(format!(
                "knowledge type {type_id} is not on the frontier of city {}",
                self.id
            )));
        }
        self.pay(&kt.cost0)?;
        let id = new_id();
        self.knowledges.add(Knowledge {
            id: id.clone(),
            type_id,
            ticks: kt.ticks,
        });
        if kt.ticks == 0 {
            self.permanent_popularity += kt.pop_bonus_learn;
        }
        Ok(id)
    }

    /// Start building. Returns the new instance id.
    pub fn build(&mut self, defs: &Definitions, config: &Configuration, type_id: u64) -> Result<String> {
        self.ensure_manual()?;
        let bt = defs.building(type_id)?;
        if !bt.multiple_allowed && self.buildings.iter().any(|b| b.type_id == type_id) {
            return Err(Error::already_exists("building", type_id));
        }
        let popularity = self.popularity(defs, config);
        let knowledge = KnowledgeState::of(&self.knowledges);
        if !building_allowed(bt, popularity, &self.buildings, &knowledge) {
            return Err(Error::PreconditionFailed(format!(
                "building type {type_id} is not on the frontier of city {}",
                self.id
            )));
        }
        self.pay(&bt.cost0)?;
        let id = new_id();
        self.buildings.add(Building {
            id: id.clone(),
            type_id,
            ticks: bt.ticks,
        });
        if bt.ticks == 0 {
            self.permanent_popularity += bt.pop_bonus_build;
        }
        Ok(id)
    }

    /// Start training a unit. Returns the new instance id.
    pub fn train(&mut self, defs: &Definitions, config: &Configuration, type_id: u64) -> Result<String> {
        self.ensure_manual()?;
        let ut = defs.unit(type_id)?;
        if !unit_allowed(ut, &self.buildings) {
            return Err(Error::PreconditionFailed(format!(
                "unit type {type_id} needs building type {}",
                ut.required_building
            )));
        }
        if self.popularity(defs, config) < ut.req_pop {
            return Err(Error::PreconditionFailed(format!(
                "unit type {type_id} needs popularity {}",
                ut.req_pop
            )));
        }
        self.pay(&ut.cost0)?;
        let id = new_id();
        let finished = ut.ticks == 0;
        self.units.add(Unit {
            id: id.clone(),
            type_id,
            ticks: ut.ticks,
            health: if finished { ut.health } else { 0 },
        });
        if finished {
            self.permanent_popularity += ut.pop_bonus_train;
            self.counters.units_raised += 1;
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Armies
    // -----------------------------------------------------------------------

    /// Remove the listed units that are eligible to leave; others stay.
    fn take_units(&mut self, ids: &[String]) -> Vec<Unit> {
        let mut out = Vec::new();
        for id in ids {
            if self.units.get(id.as_str()).is_some_and(Unit::is_eligible) {
                if let Some(u) = self.units.remove(id.as_str()) {
                    out.push(u);
                }
            }
        }
        out
    }

    /// Raise an army from the listed units. Ineligible or unknown units are
    /// skipped; fails with `not-found` when none is left.
    pub fn create_army(&mut self, config: &Configuration, name: &str, unit_ids: &[String]) -> Result<String> {
        self.ensure_manual()?;
        let units = self.take_units(unit_ids);
        if units.is_empty() {
            return Err(Error::not_found("eligible unit", unit_ids.join(",")));
        }
        let mut army = Army::new(self.id, name);
        army.units.extend(units);
        self.permanent_popularity += config.pop_bonus_army_create;
        let id = army.id.clone();
        self.armies.add(army);
        Ok(id)
    }

    /// Gather every eligible unit into a defending army. Never fails; the
    /// army may be empty.
    pub fn create_defence(&mut self) -> String {
        let ids: Vec<String> = self
            .units
            .iter()
            .filter(|u| u.is_eligible())
            .map(|u| u.id.clone())
            .collect();
        let mut army = Army::new(self.id, format!("Defence of {}", self.name));
        army.units.extend(self.take_units(&ids));
        let id = army.id.clone();
        self.armies.add(army);
        id
    }

    /// An army carrying `amount` out of the city stock.
    pub fn create_transport(&mut self, config: &Configuration, name: &str, amount: Resources) -> Result<String> {
        self.ensure_manual()?;
        if amount.is_zero() {
            return Err(Error::InvalidArgument("empty transport".to_string()));
        }
        self.pay(&amount)?;
        let mut army = Army::new(self.id, name);
        army.stock = amount;
        self.permanent_popularity += config.pop_bonus_army_create;
        let id = army.id.clone();
        self.armies.add(army);
        Ok(id)
    }

    fn docked_army(&mut self, army_id: &str) -> Result<&mut Army> {
        let city = self.id;
        let army = self
            .armies
            .get_mut(army_id)
            .ok_or_else(|| Error::not_found("army", army_id))?;
        if army.cell != city || army.in_fight() {
            return Err(Error::PreconditionFailed(format!(
                "army {army_id} is not idle at city {city}"
            )));
        }
        Ok(army)
    }

    pub fn transfer_resources_to_army(&mut self, army_id: &str, amount: Resources) -> Result<()> {
        if !self.stock.covers(&amount) {
            return Err(Error::PreconditionFailed(format!(
                "city {} cannot afford {:?}",
                self.id, amount.0
            )));
        }
        self.docked_army(army_id)?.stock.add(&amount);
        self.stock.remove(&amount);
        Ok(())
    }

    pub fn transfer_resources_to_city(&mut self, army_id: &str, amount: Resources) -> Result<()> {
        let army = self.docked_army(army_id)?;
        if !army.stock.covers(&amount) {
            return Err(Error::PreconditionFailed(format!(
                "army {army_id} does not carry {:?}",
                amount.0
            )));
        }
        army.stock.remove(&amount);
        self.stock.add(&amount);
        Ok(())
    }

    /// Move eligible units from the city into the army. Returns how many moved.
    pub fn transfer_units_to_army(&mut self, army_id: &str, unit_ids: &[String]) -> Result<usize> {
        self.docked_army(army_id)?;
        let units = self.take_units(unit_ids);
        if units.is_empty() {
            return Err(Error::not_found("eligible unit", unit_ids.join(",")));
        }
        let moved = units.len();
        self.docked_army(army_id)?.units.extend(units);
        Ok(moved)
    }

    /// Move units from the army back into the city. Returns how many moved.
    pub fn transfer_units_to_city(&mut self, army_id: &str, unit_ids: &[String]) -> Result<usize> {
        let army = self.docked_army(army_id)?;
        let units: Vec<Unit> = unit_ids
            .iter()
            .filter_map(|id| army.units.remove(id.as_str()))
            .collect();
        if units.is_empty() {
            return Err(Error::not_found("unit", unit_ids.join(",")));
        }
        let moved = units.len();
        self.units.extend(units);
        Ok(moved)
    }

    /// Absorb the content of a disbanding army.
    pub fn receive_army(&mut self, army: Army) {
        self.stock.add(&army.stock);
        self.units.extend(army.units);
        self.artifacts.extend(army.artifacts);
    }

    // -----------------------------------------------------------------------
    // Politics
    // -----------------------------------------------------------------------

    pub fn set_overlord(&mut self, overlord: u64, rate: f64) {
        self.overlord = overlord;
        self.tax_rate = Multiplier::splat(rate);
    }

    pub fn gain_freedom(&mut self) {
        self.overlord = 0;
        self.tax_rate = Multiplier::splat(0.0);
    }
}

/// Advance one asset by a tick if the city can pay for it. Returns the
/// asset's type when progress was made.
fn advance_one<'d, A, B>(asset: &mut A, catalog: &'d SortedSet<B>, stock: &mut Resources) -> Option<&'d B>
where
    A: Construction,
    B: Blueprint,
{
    if asset.is_finished() {
        return None;
    }
    let Some(bp) = catalog.get(&asset.type_id()) else {
        warn!(asset = asset.id(), type_id = asset.type_id(), kind = B::KIND, "unknown type, asset stalled");
        return None;
    };
    if !stock.covers(bp.tick_cost()) {
        return None;
    }
    stock.remove(bp.tick_cost());
    *asset.ticks_mut() -= 1;
    Some(bp)
}

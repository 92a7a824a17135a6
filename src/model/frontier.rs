//! What a city may legally start next.
//!
//! Requirements are checked against *finished* knowledge only; conflicts are
//! checked against finished and in-progress knowledge alike.

use std::collections::BTreeSet;

use super::asset::{Building, Construction, Knowledge};
use super::definitions::{BuildingType, Definitions, KnowledgeType, UnitType};
use super::sorted_set::SortedSet;

/// Knowledge type IDs split by completion.
#[derive(Debug, Default)]
pub struct KnowledgeState {
    pub finished: BTreeSet<u64>,
    pub all: BTreeSet<u64>,
}

impl KnowledgeState {
    pub fn of(owned: &SortedSet<Knowledge>) -> Self {
        let mut state = Self::default();
        for k in owned.iter() {
            state.all.insert(k.type_id);
            if k.is_finished() {
                state.finished.insert(k.type_id);
            }
        }
        state
    }

    fn satisfies(&self, requires: &[u64], conflicts: &[u64]) -> bool {
        requires.iter().all(|r| self.finished.contains(r))
            && !conflicts.iter().any(|c| self.all.contains(c))
    }
}

pub fn knowledge_allowed(kt: &KnowledgeType, owned: &KnowledgeState) -> bool {
    !owned.all.contains(&kt.id) && owned.satisfies(&kt.requires, &kt.conflicts)
}

pub fn building_allowed(
    bt: &BuildingType,
    popularity: i64,
    built: &SortedSet<Building>,
    owned: &KnowledgeState,
) -> bool {
    if bt.pop_required > popularity {
        return false;
    }
    if !bt.multiple_allowed && built.iter().any(|b| b.type_id == bt.id) {
        return false;
    }
    owned.satisfies(&bt.requires, &bt.conflicts)
}

/// Finished buildings only: a unit cannot train in a half-built barracks.
pub fn unit_allowed(ut: &UnitType, built: &SortedSet<Building>) -> bool {
    ut.required_building == 0
        || built
            .iter()
            .any(|b| b.type_id == ut.required_building && b.is_finished())
}

pub fn knowledge_frontier<'a>(
    defs: &'a Definitions,
    owned: &SortedSet<Knowledge>,
) -> Vec<&'a KnowledgeType> {
    let state = KnowledgeState::of(owned);
    defs.knowledges
        .iter()
        .filter(|kt| knowledge_allowed(kt, &state))
        .collect()
}

pub fn building_frontier<'a>(
    defs: &'a Definitions,
    popularity: i64,
    built: &SortedSet<Building>,
    owned: &SortedSet<Knowledge>,
) -> Vec<&'a BuildingType> {
    let state = KnowledgeState::of(owned);
    defs.buildings
        .iter()
        .filter(|bt| building_allowed(bt, popularity, built, &state))
        .collect()
}

pub fn unit_frontier<'a>(defs: &'a Definitions, built: &SortedSet<Building>) -> Vec<&'a UnitType> {
    defs.units.iter().filter(|ut| unit_allowed(ut, built)).collect()
}

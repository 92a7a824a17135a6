use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::asset::{Artifact, Unit};
use super::command::{Action, AssaultArgs, Command, MoveArgs};
use super::resources::Resources;
use super::sorted_set::{Keyed, SortedSet};
use crate::id::new_id;

/// A group of units, resources and artifacts detached from a city.
///
/// Armies are stored in their owner city's army set for their whole life;
/// `city` is the back-reference to that owner and is rebuilt at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Army {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip)]
    pub city: u64,
    pub cell: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fight: Option<String>,
    #[serde(default)]
    pub stock: Resources,
    #[serde(default)]
    pub units: SortedSet<Unit>,
    #[serde(default)]
    pub artifacts: SortedSet<Artifact>,
    #[serde(default)]
    pub commands: VecDeque<Command>,
    /// Stance toward other cities: negative engages them, positive
    /// supports them, when met in a fight on the army's cell.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub postures: BTreeMap<u64, i64>,
}

impl Keyed for Army {
    type Key = String;

    fn key(&self) -> &String {
        &self.id
    }
}

impl Army {
    pub fn new(city: u64, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            city,
            cell: city,
            fight: None,
            stock: Resources::ZERO,
            units: SortedSet::new(),
            artifacts: SortedSet::new(),
            commands: VecDeque::new(),
            postures: BTreeMap::new(),
        }
    }

    pub fn in_fight(&self) -> bool {
        self.fight.is_some()
    }

    /// Standing on its owner's cell.
    pub fn at_home(&self) -> bool {
        self.cell == self.city
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.stock.is_zero() && self.artifacts.is_empty()
    }

    // -- order queue --

    pub fn defer(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    pub fn defer_move(&mut self, cell: u64, args: MoveArgs) {
        self.defer(Command::new(cell, Action::Move(args)));
    }

    pub fn defer_wait(&mut self, cell: u64) {
        self.defer(Command::new(cell, Action::Wait));
    }

    pub fn defer_attack(&mut self, cell: u64, args: AssaultArgs) {
        self.defer(Command::new(cell, Action::Attack(args)));
    }

    pub fn defer_defend(&mut self, cell: u64) {
        self.defer(Command::new(cell, Action::Defend));
    }

    pub fn defer_disband(&mut self, cell: u64) {
        self.defer(Command::new(cell, Action::Disband));
    }

    pub fn cancel(&mut self) {
        self.commands.clear();
    }

    pub fn set_posture(&mut self, city: u64, posture: i64) {
        if posture == 0 {
            self.postures.remove(&city);
        } else {
            self.postures.insert(city, posture);
        }
    }
}

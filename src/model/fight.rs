use serde::{Deserialize, Serialize};

use super::command::AssaultArgs;
use super::sorted_set::{Keyed, SortedSet};
use crate::error::{Error, Result};
use crate::id::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Side {
    Attack,
    Defence,
}

string_enum!(Side {
    Attack => "attack",
    Defence => "defence",
});

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Attack => Side::Defence,
            Side::Defence => Side::Attack,
        }
    }
}

/// An army taking part in a fight, with the city that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Belligerent {
    pub army: String,
    pub city: u64,
    /// What this army wants from the target if the attackers win.
    #[serde(default)]
    pub assault: AssaultArgs,
}

impl Keyed for Belligerent {
    type Key = String;

    fn key(&self) -> &String {
        &self.army
    }
}

/// Two sets of armies meeting on one cell.
///
/// This type only tracks membership. Keeping each army's `fight` field in
/// step with these sets is the region's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fight {
    pub id: String,
    pub cell: u64,
    #[serde(default)]
    pub attack: SortedSet<Belligerent>,
    #[serde(default)]
    pub defence: SortedSet<Belligerent>,
}

impl Keyed for Fight {
    type Key = String;

    fn key(&self) -> &String {
        &self.id
    }
}

impl Fight {
    pub fn new(cell: u64) -> Self {
        Self {
            id: new_id(),
            cell,
            attack: SortedSet::new(),
            defence: SortedSet::new(),
        }
    }

    pub fn side(&self, side: Side) -> &SortedSet<Belligerent> {
        match side {
            Side::Attack => &self.attack,
            Side::Defence => &self.defence,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SortedSet<Belligerent> {
        match side {
            Side::Attack => &mut self.attack,
            Side::Defence => &mut self.defence,
        }
    }

    pub fn side_of(&self, army: &str) -> Option<Side> {
        if self.attack.has(army) {
            Some(Side::Attack)
        } else if self.defence.has(army) {
            Some(Side::Defence)
        } else {
            None
        }
    }

    pub fn join(&mut self, side: Side, member: Belligerent) -> Result<()> {
        if self.side_of(&member.army).is_some() {
            return Err(Error::already_exists("fighting army", &member.army));
        }
        self.side_mut(side).add(member);
        Ok(())
    }

    pub fn leave(&mut self, army: &str) -> Option<(Side, Belligerent)> {
        if let Some(m) = self.attack.remove(army) {
            return Some((Side::Attack, m));
        }
        self.defence.remove(army).map(|m| (Side::Defence, m))
    }

    /// Move an army to the other side. Returns its new side.
    pub fn flip(&mut self, army: &str) -> Option<Side> {
        let (side, member) = self.leave(army)?;
        let to = side.opposite();
        self.side_mut(to).add(member);
        Some(to)
    }

    /// A fight lives only while both sides have someone in them.
    pub fn is_decided(&self) -> bool {
        self.attack.is_empty() || self.defence.is_empty()
    }

    /// Does `city` own an army on `side`?
    pub fn involves(&self, side: Side, city: u64) -> bool {
        self.side(side).iter().any(|m| m.city == city)
    }

    pub fn members(&self) -> impl Iterator<Item = (Side, &Belligerent)> {
        self.attack
            .iter()
            .map(|m| (Side::Attack, m))
            .chain(self.defence.iter().map(|m| (Side::Defence, m)))
    }

    pub fn check(&self) -> Result<()> {
        self.attack.check()?;
        self.defence.check()?;
        if let Some(m) = self.attack.iter().find(|m| self.defence.has(&m.army)) {
            return Err(Error::NotValid(format!(
                "army {} on both sides of fight {}",
                m.army, self.id
            )));
        }
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use super::sorted_set::Keyed;

/// A live asset still (or no longer) under construction.
///
/// Units, buildings and knowledge differ only in the catalog their type
/// comes from; progress is always "ticks left".
pub trait Construction: Keyed<Key = String> {
    fn id(&self) -> &str;
    fn type_id(&self) -> u64;
    fn ticks(&self) -> u32;
    fn ticks_mut(&mut self) -> &mut u32;

    fn is_finished(&self) -> bool {
        self.ticks() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    #[serde(rename = "type")]
    pub type_id: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ticks: u32,
    #[serde(default)]
    pub health: u32,
}

impl Unit {
    /// Finished and alive: the only units that may leave their city.
    pub fn is_eligible(&self) -> bool {
        self.ticks == 0 && self.health > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    #[serde(rename = "type")]
    pub type_id: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knowledge {
    pub id: String,
    #[serde(rename = "type")]
    pub type_id: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ticks: u32,
}

/// Carried item. Opaque at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Keyed for Artifact {
    type Key = String;

    fn key(&self) -> &String {
        &self.id
    }
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

macro_rules! construction {
    ($ty:ident) => {
        impl Keyed for $ty {
            type Key = String;

            fn key(&self) -> &String {
                &self.id
            }
        }

        impl Construction for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn type_id(&self) -> u64 {
                self.type_id
            }
            fn ticks(&self) -> u32 {
                self.ticks
            }
            fn ticks_mut(&mut self) -> &mut u32 {
                &mut self.ticks
            }
        }
    };
}

construction!(Unit);
construction!(Building);
construction!(Knowledge);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_needs_training_and_health() {
        let mut unit = Unit {
            id: "u".into(),
            type_id: 1,
            ticks: 1,
            health: 5,
        };
        assert!(!unit.is_eligible());
        unit.ticks = 0;
        assert!(unit.is_eligible());
        unit.health = 0;
        assert!(!unit.is_eligible());
    }

    #[test]
    fn finished_assets_omit_ticks() {
        let b = Building {
            id: "b".into(),
            type_id: 4,
            ticks: 0,
        };
        assert!(b.is_finished());
        assert_eq!(serde_json::to_string(&b).unwrap(), r#"{"id":"b","type":4}"#);
        let k: Knowledge = serde_json::from_str(r#"{"id":"k","type":2,"ticks":3}"#).unwrap();
        assert_eq!(Construction::ticks(&k), 3);
        assert!(!k.is_finished());
    }
}

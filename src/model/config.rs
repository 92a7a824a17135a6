use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::resources::Resources;
use crate::error::{Error, Result};

/// Game-wide tunables. Every field has a default so a partial `config.json`
/// is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Production ratio applied once per pending massacre.
    pub massacre_impact: f64,
    /// Tax reaches the overlord in the same round instead of travelling in
    /// a transport army.
    pub instant_transfers: bool,
    /// Permanent popularity change when a city raises an army.
    pub pop_bonus_army_create: i64,
    /// Permanent popularity change when an army disbands at a friendly city.
    pub pop_bonus_army_disband: i64,
    /// Transient popularity per live army.
    pub pop_bonus_army_alive: i64,
    /// Tax rate set on conquest.
    pub rate_overlord: f64,
    /// Applied round-robin to the seed cities of a new region.
    pub city_patterns: Vec<CityPattern>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            massacre_impact: 0.9,
            instant_transfers: true,
            pop_bonus_army_create: 0,
            pop_bonus_army_disband: 0,
            pop_bonus_army_alive: 0,
            rate_overlord: 0.1,
            city_patterns: Vec::new(),
        }
    }
}

/// Starting state for a freshly instantiated city.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CityPattern {
    pub stock: Resources,
    pub stock_capacity: Resources,
    pub production: Resources,
    pub permanent_popularity: i64,
    pub permanent_health: i64,
    pub permanent_intelligence: i64,
}

impl Configuration {
    /// Read `path` if it exists, defaults otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let config: Configuration =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(path, e))?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.massacre_impact) {
            return Err(Error::NotValid(format!(
                "massacre_impact {} outside [0, 1]",
                self.massacre_impact
            )));
        }
        if !(0.0..=1.0).contains(&self.rate_overlord) {
            return Err(Error::NotValid(format!(
                "rate_overlord {} outside [0, 1]",
                self.rate_overlord
            )));
        }
        Ok(())
    }

    /// Pattern for the `n`-th seed city, if any pattern is configured.
    pub fn pattern(&self, n: usize) -> Option<&CityPattern> {
        if self.city_patterns.is_empty() {
            None
        } else {
            self.city_patterns.get(n % self.city_patterns.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Configuration = serde_json::from_str(r#"{"instant_transfers": false}"#).unwrap();
        assert!(!config.instant_transfers);
        assert_eq!(config.massacre_impact, 0.9);
        assert_eq!(config.rate_overlord, 0.1);
        assert!(config.check().is_ok());
    }

    #[test]
    fn patterns_cycle() {
        let mut config = Configuration::default();
        assert!(config.pattern(0).is_none());
        config.city_patterns = vec![
            CityPattern {
                permanent_popularity: 1,
                ..CityPattern::default()
            },
            CityPattern {
                permanent_popularity: 2,
                ..CityPattern::default()
            },
        ];
        assert_eq!(config.pattern(0).unwrap().permanent_popularity, 1);
        assert_eq!(config.pattern(3).unwrap().permanent_popularity, 2);
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"rate_overlord": 1.5}"#).unwrap();
        assert_eq!(Configuration::load(&path).unwrap_err().kind(), ErrorKind::NotValid);
    }
}

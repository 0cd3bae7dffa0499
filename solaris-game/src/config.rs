//! Game configuration
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_MIN_PLAYERS;
use crate::roles::DistributionPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("minority_pct must be between 1 and 99 (got {0})")]
    MinorityPct(u32),
    #[error("min_players must be at least 2 (got {0})")]
    MinPlayers(usize),
}

/// Tunables shared by every session of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "GameConfig::default_min_players")]
    pub min_players: usize,
    #[serde(default)]
    pub distribution: DistributionPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: Self::default_min_players(),
            distribution: DistributionPolicy::default(),
        }
    }
}

impl GameConfig {
    const fn default_min_players() -> usize {
        DEFAULT_MIN_PLAYERS
    }

    /// Parse overrides from JSON; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values fail
    /// [`GameConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Rejects a minority share outside `1..=99` and minimums below two.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pct = self.distribution.minority_pct;
        if pct == 0 || pct >= 100 {
            return Err(ConfigError::MinorityPct(pct));
        }
        if self.min_players < 2 {
            return Err(ConfigError::MinPlayers(self.min_players));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Ability;

    #[test]
    fn empty_object_yields_defaults() {
        let config = GameConfig::from_json("{}").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.min_players, 3);
        assert_eq!(config.distribution.minority_pct, 25);
        assert_eq!(config.distribution.specialists.len(), 2);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config =
            GameConfig::from_json(r#"{"distribution": {"minority_pct": 40}}"#).unwrap();
        assert_eq!(config.min_players, 3);
        assert_eq!(config.distribution.minority_pct, 40);
        assert_eq!(
            config.distribution.specialists[0].ability,
            Ability::Investigate
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            GameConfig::from_json(r#"{"distribution": {"minority_pct": 0}}"#),
            Err(ConfigError::MinorityPct(0))
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"distribution": {"minority_pct": 100}}"#),
            Err(ConfigError::MinorityPct(100))
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{"min_players": 1}"#),
            Err(ConfigError::MinPlayers(1))
        ));
        assert!(matches!(
            GameConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}

//! Engine configuration: policy denylist, default base values and finalizer floors.
//!
//! Loaded from the file named by `PERKEVAL_CONFIG_PATH` (JSON, or YAML by extension),
//! falling back to the built-in defaults.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::is_yaml_path;
use crate::perks::stat::{Stat, StatValues};

pub const CONFIG_PATH_ENV: &str = "PERKEVAL_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stats no effect may modify, regardless of catalog content.
    pub disabled_targets: BTreeSet<Stat>,
    /// Base values used for any stat the caller does not supply.
    pub defaults: StatValues,
    /// Smallest timed-job duration handed to schedulers.
    pub duration_floor: f64,
    pub bet_multiplier_floor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disabled_targets: BTreeSet::new(),
            defaults: default_base_values(),
            duration_floor: 0.1,
            bet_multiplier_floor: 0.01,
        }
    }
}

pub fn default_base_values() -> StatValues {
    StatValues::new()
        .with(Stat::Income, 0.0)
        .with(Stat::TradeLimits, 40.0)
        .with(Stat::CommoditiesLimit, 5.0)
        .with(Stat::JobSlots, 1.0)
        .with(Stat::TimedDuration, 0.0)
        .with(Stat::ChanceRollBonus, 0.0)
        .with(Stat::SlotBetMultiplier, 1.0)
        .with(Stat::SlotBetLimit, 1000.0)
        .with(Stat::SlotWinMultiplier, 1.0)
        .with(Stat::SlotHourlySpinLimit, 20.0)
        .with(Stat::StealChance, 0.25)
        .with(Stat::StealAmountMin, 50.0)
        .with(Stat::StealAmountMax, 100.0)
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: EngineConfig = serde_json::from_str(json)?;
        config.normalize();
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.normalize();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if is_yaml_path(path) {
            Self::from_yaml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
    }

    pub fn with_disabled_target(mut self, stat: Stat) -> Self {
        self.disabled_targets.insert(stat);
        self
    }

    pub fn is_disabled(&self, stat: Stat) -> bool {
        self.disabled_targets.contains(&stat)
    }

    /// A partial `defaults` table in a file only overrides the stats it names.
    fn normalize(&mut self) {
        self.defaults.fill_from(&default_base_values());
        if !self.duration_floor.is_finite() || self.duration_floor <= 0.0 {
            self.duration_floor = 0.1;
        }
        if !self.bet_multiplier_floor.is_finite() || self.bet_multiplier_floor < 0.0 {
            self.bet_multiplier_floor = 0.01;
        }
    }
}

/// Load engine configuration from `PERKEVAL_CONFIG_PATH`, or the built-in defaults.
pub fn load_engine_config_from_env() -> EngineConfig {
    let Some(path) = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from) else {
        tracing::info!(target: "perkeval::config", "engine_config.loaded=builtin");
        return EngineConfig::default();
    };

    match EngineConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "perkeval::config",
                path = %path.display(),
                disabled_targets = config.disabled_targets.len(),
                "engine_config.loaded=file"
            );
            config
        }
        Err(err) => {
            tracing::warn!(
                target: "perkeval::config",
                path = %path.display(),
                error = %err,
                "engine_config.load_failed"
            );
            EngineConfig::default()
        }
    }
}

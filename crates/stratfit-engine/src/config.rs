//! Simulation configuration, loadable from YAML.

use crate::path::PathConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// USD represented by one unit of a path value (paths are in $M).
pub const USD_PER_UNIT: f64 = 1_000_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid yaml: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for deterministic RNG; mixed with the scenario id per run.
    pub seed: u64,
    /// Number of paths per run.
    pub paths: usize,
    /// Walk shape; `path.start_value` is the starting ARR in $M.
    pub path: PathConfig,
    /// Cash at month 0 in USD.
    pub start_cash_usd: f64,
    /// Monthly operating cost in USD at neutral levers.
    pub monthly_opex_usd: f64,
    /// Runway reported for paths that never run out, in months.
    pub runway_cap_months: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            paths: 500,
            path: PathConfig::default(),
            start_cash_usd: 3_000_000.0,
            monthly_opex_usd: 250_000.0,
            runway_cap_months: 48.0,
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: SimConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Starting ARR in USD.
    pub fn start_arr_usd(&self) -> f64 {
        self.path.start_value * USD_PER_UNIT
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.path;
        let numbers = [
            p.start_value,
            p.floor,
            p.drift_scale,
            p.volatility_scale,
            p.jump_probability,
            p.jump_scale,
            self.start_cash_usd,
            self.monthly_opex_usd,
            self.runway_cap_months,
        ];
        if numbers.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid("non-finite value"));
        }
        if self.paths == 0 {
            return Err(ConfigError::Invalid("paths must be >= 1"));
        }
        if p.steps == 0 {
            return Err(ConfigError::Invalid("steps must be >= 1"));
        }
        if p.floor < 0.0 || p.start_value < p.floor {
            return Err(ConfigError::Invalid("start_value must be >= floor >= 0"));
        }
        if !(0.0..=1.0).contains(&p.jump_probability) {
            return Err(ConfigError::Invalid("jump_probability must be within [0,1]"));
        }
        if p.volatility_scale < 0.0 || p.jump_scale < 0.0 {
            return Err(ConfigError::Invalid("volatility and jump scales must be >= 0"));
        }
        if self.start_cash_usd < 0.0 || self.monthly_opex_usd < 0.0 {
            return Err(ConfigError::Invalid("cash and opex must be >= 0"));
        }
        if self.runway_cap_months <= 0.0 {
            return Err(ConfigError::Invalid("runway cap must be > 0"));
        }
        Ok(())
    }
}

//! Named lever presets used to initialize scenarios.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use stratfit_core::{Lever, LeverVector};
use thiserror::Error;

/// Presets compiled into the binary.
const BUILTIN_PRESETS_YAML: &str = include_str!("../../../assets/presets/presets.yaml");

#[derive(Debug, Error, PartialEq)]
pub enum PresetError {
    #[error("unknown preset: {0}")]
    Unknown(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid preset file: {0}")]
    Parse(String),
    #[error("duplicate preset: {0}")]
    Duplicate(String),
}

impl From<std::io::Error> for PresetError {
    fn from(e: std::io::Error) -> Self {
        PresetError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for PresetError {
    fn from(e: serde_yaml::Error) -> Self {
        PresetError::Parse(e.to_string())
    }
}

/// A named starting lever configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeverPreset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub levers: LeverVector,
}

impl LeverPreset {
    /// Full lever vector: missing levers are filled with neutral.
    pub fn lever_vector(&self) -> LeverVector {
        let mut v = LeverVector::neutral();
        for (lever, value) in self.levers.iter() {
            v.set(lever, value);
        }
        v
    }

    pub fn value(&self, lever: Lever) -> f64 {
        self.levers.value(lever)
    }
}

/// Parse a YAML list of presets, rejecting duplicate names.
pub fn parse_presets(text: &str) -> Result<Vec<LeverPreset>, PresetError> {
    let presets: Vec<LeverPreset> = serde_yaml::from_str(text)?;
    for (i, p) in presets.iter().enumerate() {
        if presets[..i].iter().any(|q| q.name == p.name) {
            return Err(PresetError::Duplicate(p.name.clone()));
        }
    }
    Ok(presets)
}

pub fn load_presets<P: AsRef<Path>>(path: P) -> Result<Vec<LeverPreset>, PresetError> {
    parse_presets(&fs::read_to_string(path)?)
}

pub fn builtin_presets() -> Result<Vec<LeverPreset>, PresetError> {
    parse_presets(BUILTIN_PRESETS_YAML)
}

pub fn find_preset<'a>(presets: &'a [LeverPreset], name: &str) -> Result<&'a LeverPreset, PresetError> {
    presets
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| PresetError::Unknown(name.to_string()))
}

/// Full lever vector of a built-in preset.
pub fn preset(name: &str) -> Result<LeverVector, PresetError> {
    let presets = builtin_presets()?;
    Ok(find_preset(&presets, name)?.lever_vector())
}

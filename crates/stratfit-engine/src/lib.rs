#![deny(warnings)]

//! Simulation engine for STRATFIT.
//!
//! This crate provides validated utilities for:
//! - A seeded linear-congruential generator ([`rng::Lcg`])
//! - Lever-driven trajectory generation ([`path`])
//! - Cross-sectional percentile bands ([`percentile`])
//! - Monte Carlo summaries of a lever vector ([`summary`])
//! - Named lever presets ([`presets`])
//!
//! Everything here is pure and synchronous: identical inputs always give
//! identical outputs, and no function mutates its arguments.

pub mod config;
pub mod model;
pub mod path;
pub mod percentile;
pub mod presets;
pub mod rng;
pub mod summary;

use thiserror::Error;

pub use config::{ConfigError, SimConfig};
pub use model::ModelParams;
pub use path::{generate_batch, generate_path, PathConfig, PathParams};
pub use percentile::{aggregate, aggregate_default, percentile, AggregateError};
pub use presets::{builtin_presets, preset, LeverPreset, PresetError};
pub use summary::{run, simulate, simulate_bands, SimulationRun};

/// Errors produced by a simulation run.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Preset(#[from] PresetError),
}

#![deny(warnings)]

//! Core domain models and invariants for STRATFIT.
//!
//! This crate defines the serializable types shared by the engine, the
//! comparison layer and the runtime, with validation helpers to guarantee
//! basic invariants. Lever values are clamped on every write path, so a
//! `LeverVector` can never hold a value outside [0, 100].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lower bound of every lever.
pub const LEVER_MIN: f64 = 0.0;
/// Upper bound of every lever.
pub const LEVER_MAX: f64 = 100.0;
/// Value a lever takes in a freshly initialized scenario.
pub const LEVER_NEUTRAL: f64 = 50.0;

/// A named, user-adjustable strategy dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lever {
    /// Strength of market demand for the product.
    DemandStrength,
    /// Ability to raise prices without losing customers.
    PricingPower,
    /// Discipline on operating costs.
    CostDiscipline,
    /// Pace of hiring.
    HiringIntensity,
    /// Friction and overhead in operations.
    OperatingDrag,
    /// External market volatility.
    MarketVolatility,
    /// Risk of failing to execute the plan.
    ExecutionRisk,
}

impl Lever {
    /// Every lever, in declaration order.
    pub const ALL: [Lever; 7] = [
        Lever::DemandStrength,
        Lever::PricingPower,
        Lever::CostDiscipline,
        Lever::HiringIntensity,
        Lever::OperatingDrag,
        Lever::MarketVolatility,
        Lever::ExecutionRisk,
    ];

    /// Wire key of the lever (camelCase).
    pub fn key(self) -> &'static str {
        match self {
            Lever::DemandStrength => "demandStrength",
            Lever::PricingPower => "pricingPower",
            Lever::CostDiscipline => "costDiscipline",
            Lever::HiringIntensity => "hiringIntensity",
            Lever::OperatingDrag => "operatingDrag",
            Lever::MarketVolatility => "marketVolatility",
            Lever::ExecutionRisk => "executionRisk",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Lever::DemandStrength => "Demand Strength",
            Lever::PricingPower => "Pricing Power",
            Lever::CostDiscipline => "Cost Discipline",
            Lever::HiringIntensity => "Hiring Intensity",
            Lever::OperatingDrag => "Operating Drag",
            Lever::MarketVolatility => "Market Volatility",
            Lever::ExecutionRisk => "Execution Risk",
        }
    }

    /// Typical influence of the lever on scenario divergence, in [0, 1].
    ///
    /// Hand-tuned product constants, not derived from data. Changes need
    /// product sign-off.
    pub fn importance_weight(self) -> f64 {
        match self {
            Lever::DemandStrength => 0.90,
            Lever::PricingPower => 0.80,
            Lever::CostDiscipline => 0.60,
            Lever::HiringIntensity => 0.50,
            Lever::OperatingDrag => 0.55,
            Lever::MarketVolatility => 0.70,
            Lever::ExecutionRisk => 0.65,
        }
    }
}

impl fmt::Display for Lever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Lever {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lever::ALL
            .iter()
            .copied()
            .find(|l| l.key() == s)
            .ok_or_else(|| ValidationError::UnknownLever(s.to_string()))
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over a byte stream.
pub fn fnv1a<I: IntoIterator<Item = u8>>(bytes: I) -> u64 {
    bytes
        .into_iter()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Clamp a raw lever value into [0, 100]. Non-finite input maps to the lower bound.
pub fn clamp_lever(value: f64) -> f64 {
    if !value.is_finite() {
        LEVER_MIN
    } else {
        value.clamp(LEVER_MIN, LEVER_MAX)
    }
}

/// Mapping of levers to values in [0, 100].
///
/// May be partial when deserialized from an external snapshot; values are
/// clamped on construction, on `set` and on deserialization.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Lever, f64>", into = "BTreeMap<Lever, f64>")]
pub struct LeverVector {
    values: BTreeMap<Lever, f64>,
}

impl LeverVector {
    /// Every lever at the neutral value.
    pub fn neutral() -> Self {
        Self::from_pairs(Lever::ALL.iter().map(|&l| (l, LEVER_NEUTRAL)))
    }

    /// Build from (lever, value) pairs, clamping each value.
    pub fn from_pairs<I: IntoIterator<Item = (Lever, f64)>>(pairs: I) -> Self {
        let values = pairs
            .into_iter()
            .map(|(l, v)| (l, clamp_lever(v)))
            .collect();
        Self { values }
    }

    /// Value of a lever if present.
    pub fn get(&self, lever: Lever) -> Option<f64> {
        self.values.get(&lever).copied()
    }

    /// Value of a lever, falling back to neutral when absent.
    pub fn value(&self, lever: Lever) -> f64 {
        self.get(lever).unwrap_or(LEVER_NEUTRAL)
    }

    /// Set a lever, returning the stored (clamped) value.
    pub fn set(&mut self, lever: Lever, value: f64) -> f64 {
        let v = clamp_lever(value);
        self.values.insert(lever, v);
        v
    }

    /// Copy-on-write variant of [`LeverVector::set`].
    pub fn with(&self, lever: Lever, value: f64) -> Self {
        let mut next = self.clone();
        next.set(lever, value);
        next
    }

    pub fn contains(&self, lever: Lever) -> bool {
        self.values.contains_key(&lever)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lever, f64)> + '_ {
        self.values.iter().map(|(&l, &v)| (l, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fingerprint used to detect lever changes. Persisted, so it must not
    /// depend on the toolchain: FNV-1a over each key and its value bits.
    pub fn fingerprint(&self) -> u64 {
        fnv1a(
            self.values
                .iter()
                .flat_map(|(l, v)| l.key().bytes().chain(v.to_bits().to_le_bytes())),
        )
    }
}

impl From<BTreeMap<Lever, f64>> for LeverVector {
    fn from(map: BTreeMap<Lever, f64>) -> Self {
        Self::from_pairs(map)
    }
}

impl From<LeverVector> for BTreeMap<Lever, f64> {
    fn from(v: LeverVector) -> Self {
        v.values
    }
}

/// Three representative percentiles of a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileTriple {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl PercentileTriple {
    pub fn is_ordered(&self) -> bool {
        self.p10 <= self.p50 && self.p50 <= self.p90
    }
}

/// Per-timestep low/median/high bands of a batch of trajectories.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub p05: Vec<f64>,
    pub p50: Vec<f64>,
    pub p95: Vec<f64>,
}

impl PercentileBands {
    /// Number of time steps covered.
    pub fn len(&self) -> usize {
        self.p50.len()
    }

    pub fn is_empty(&self) -> bool {
        self.p50.is_empty()
    }

    /// (low, median, high) at time step `t`.
    pub fn at(&self, t: usize) -> Option<(f64, f64, f64)> {
        Some((*self.p05.get(t)?, *self.p50.get(t)?, *self.p95.get(t)?))
    }

    /// True when the three sequences have equal length and are ordered at every step.
    pub fn is_ordered(&self) -> bool {
        self.p05.len() == self.p50.len()
            && self.p50.len() == self.p95.len()
            && (0..self.len()).all(|t| self.p05[t] <= self.p50[t] && self.p50[t] <= self.p95[t])
    }
}

/// Categorical rating of a simulation outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Strong,
    Stable,
    Fragile,
    Critical,
}

impl Rating {
    /// Band an overall score in [0, 100].
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Rating::Excellent
        } else if score >= 65.0 {
            Rating::Strong
        } else if score >= 50.0 {
            Rating::Stable
        } else if score >= 30.0 {
            Rating::Fragile
        } else {
            Rating::Critical
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rating::Excellent => "Excellent",
            Rating::Strong => "Strong",
            Rating::Stable => "Stable",
            Rating::Fragile => "Fragile",
            Rating::Critical => "Critical",
        };
        f.write_str(s)
    }
}

/// Risk classification derived from the survival rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    Severe,
}

impl RiskLevel {
    pub fn from_survival(survival_rate: f64) -> Self {
        if survival_rate >= 0.9 {
            RiskLevel::Low
        } else if survival_rate >= 0.7 {
            RiskLevel::Moderate
        } else if survival_rate >= 0.5 {
            RiskLevel::Elevated
        } else {
            RiskLevel::Severe
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::Elevated => "Elevated",
            RiskLevel::Severe => "Severe",
        };
        f.write_str(s)
    }
}

/// Read-only result of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    /// Scenario the run was produced for.
    pub scenario_id: String,
    /// Share of paths that never ran out of cash, in [0, 1].
    pub survival_rate: f64,
    /// Final annual recurring revenue in USD.
    pub arr: PercentileTriple,
    /// Runway in months.
    pub runway_months: PercentileTriple,
    /// Final cash balance in USD.
    pub cash: PercentileTriple,
    /// Overall score in [0, 100].
    pub overall_score: f64,
    pub rating: Rating,
    pub risk: RiskLevel,
    /// Number of simulated paths.
    pub paths: usize,
    /// Horizon in months.
    pub horizon_months: u32,
}

impl SimulationSummary {
    pub fn median_arr(&self) -> f64 {
        self.arr.p50
    }

    pub fn median_runway(&self) -> f64 {
        self.runway_months.p50
    }
}

/// Unique identifier of a saved scenario.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub String);

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A saved combination of lever values and its simulation result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    pub levers: LeverVector,
    #[serde(default)]
    pub summary: Option<SimulationSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_baseline: bool,
}

impl Scenario {
    /// A new, not yet simulated, non-baseline scenario.
    pub fn new(id: ScenarioId, name: impl Into<String>, levers: LeverVector, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            levers,
            summary: None,
            created_at: now,
            updated_at: now,
            is_baseline: false,
        }
    }

    /// Copy of the scenario carrying `summary`.
    pub fn with_summary(&self, summary: SimulationSummary, now: DateTime<Utc>) -> Self {
        Self {
            summary: Some(summary),
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Lever key is not one of the known levers.
    #[error("unknown lever: {0}")]
    UnknownLever(String),
    /// Lever input outside [0, 100].
    #[error("lever {lever} value {value} is out of range [0, 100]")]
    LeverOutOfRange { lever: Lever, value: f64 },
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Survival rate must be within [0, 1].
    #[error("survival rate must be within [0,1]")]
    InvalidSurvival,
    /// Score must be within [0, 100].
    #[error("overall score must be within [0,100]")]
    InvalidScore,
    /// A percentile triple is not ordered.
    #[error("percentiles of {0} are not ordered")]
    UnorderedPercentiles(&'static str),
    /// Names must not be blank.
    #[error("scenario name must not be empty")]
    EmptyName,
    /// Update timestamp precedes creation.
    #[error("scenario updated before it was created")]
    TimestampOrder,
}

/// Validate raw lever input without clamping.
pub fn validate_lever_input(lever: Lever, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if !(LEVER_MIN..=LEVER_MAX).contains(&value) {
        return Err(ValidationError::LeverOutOfRange { lever, value });
    }
    Ok(value)
}

/// Parse a `key=value` lever assignment, e.g. `demandStrength=70`.
pub fn parse_lever_assignment(s: &str) -> Result<(Lever, f64), ValidationError> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| ValidationError::UnknownLever(s.to_string()))?;
    let lever: Lever = key.trim().parse()?;
    let value: f64 = raw.trim().parse().map_err(|_| ValidationError::NonFinite)?;
    Ok((lever, validate_lever_input(lever, value)?))
}

/// Validate a simulation summary.
pub fn validate_summary(s: &SimulationSummary) -> Result<(), ValidationError> {
    let finite = [
        s.survival_rate,
        s.overall_score,
        s.arr.p10,
        s.arr.p50,
        s.arr.p90,
        s.runway_months.p10,
        s.runway_months.p50,
        s.runway_months.p90,
        s.cash.p10,
        s.cash.p50,
        s.cash.p90,
    ];
    if finite.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    if !(0.0..=1.0).contains(&s.survival_rate) {
        return Err(ValidationError::InvalidSurvival);
    }
    if !(0.0..=100.0).contains(&s.overall_score) {
        return Err(ValidationError::InvalidScore);
    }
    if !s.arr.is_ordered() {
        return Err(ValidationError::UnorderedPercentiles("arr"));
    }
    if !s.runway_months.is_ordered() {
        return Err(ValidationError::UnorderedPercentiles("runway"));
    }
    if !s.cash.is_ordered() {
        return Err(ValidationError::UnorderedPercentiles("cash"));
    }
    Ok(())
}

/// Validate a scenario, including its summary when present.
pub fn validate_scenario(s: &Scenario) -> Result<(), ValidationError> {
    if s.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if s.updated_at < s.created_at {
        return Err(ValidationError::TimestampOrder);
    }
    if let Some(summary) = &s.summary {
        validate_summary(summary)?;
    }
    Ok(())
}

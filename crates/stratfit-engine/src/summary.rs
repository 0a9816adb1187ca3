//! Monte Carlo run of a lever vector into a `SimulationSummary`.
//!
//! Each path walks ARR (in $M) with [`generate_path`] and a cash balance
//! that earns one twelfth of ARR per month against a lever-scaled
//! operating cost. A path survives when its cash never goes negative.

use crate::config::{SimConfig, USD_PER_UNIT};
use crate::model::ModelParams;
use crate::path::generate_batch;
use crate::percentile::{aggregate_default, triple};
use crate::EngineError;
use serde::{Deserialize, Serialize};
use stratfit_core::{fnv1a, LeverVector, PercentileBands, Rating, RiskLevel, SimulationSummary};
use tracing::info;

const SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

/// Score weights: survival, ARR growth, runway.
const SCORE_SURVIVAL: f64 = 40.0;
const SCORE_GROWTH: f64 = 30.0;
const SCORE_RUNWAY: f64 = 30.0;
/// ARR multiple over the start that earns the full growth component.
const FULL_GROWTH_MULTIPLE: f64 = 3.0;

/// Outcome of a single simulated path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathOutcome {
    pub final_arr_usd: f64,
    pub final_cash_usd: f64,
    pub runway_months: f64,
    pub survived: bool,
}

/// Summary and visualization bands from one batch of paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub summary: SimulationSummary,
    /// ARR bands in $M, one point per month.
    pub bands: PercentileBands,
}

/// Seed for a scenario: the configured seed mixed with a stable hash of its id.
pub fn scenario_seed(base_seed: u64, scenario_id: &str) -> u64 {
    base_seed ^ fnv1a(scenario_id.bytes()).wrapping_mul(SEED_MIX)
}

/// Walk the cash balance along one ARR path.
pub fn evaluate_path(arr_path: &[f64], monthly_opex_usd: f64, config: &SimConfig) -> PathOutcome {
    let cap = config.runway_cap_months;
    let mut cash = config.start_cash_usd;
    let final_arr_usd = arr_path.last().copied().unwrap_or(0.0) * USD_PER_UNIT;

    for (month, &arr) in arr_path.iter().enumerate().skip(1) {
        let net = arr * USD_PER_UNIT / 12.0 - monthly_opex_usd;
        if cash + net < 0.0 {
            let runway = (month - 1) as f64 + cash / -net;
            return PathOutcome {
                final_arr_usd,
                final_cash_usd: 0.0,
                runway_months: runway.min(cap),
                survived: false,
            };
        }
        cash += net;
    }

    let horizon = arr_path.len().saturating_sub(1) as f64;
    let burn = monthly_opex_usd - final_arr_usd / 12.0;
    let runway = if burn > 0.0 { horizon + cash / burn } else { cap };
    PathOutcome {
        final_arr_usd,
        final_cash_usd: cash,
        runway_months: runway.min(cap),
        survived: true,
    }
}

/// Overall 0–100 score from survival, median ARR growth and median runway.
pub fn overall_score(
    survival_rate: f64,
    median_final_arr: f64,
    start_arr: f64,
    median_runway: f64,
    runway_cap: f64,
) -> f64 {
    let growth = if start_arr > 0.0 {
        ((median_final_arr / start_arr - 1.0) / (FULL_GROWTH_MULTIPLE - 1.0)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let runway = (median_runway / runway_cap).clamp(0.0, 1.0);
    (survival_rate * SCORE_SURVIVAL + growth * SCORE_GROWTH + runway * SCORE_RUNWAY)
        .round()
        .clamp(0.0, 100.0)
}

/// Reduce per-path outcomes into a summary.
pub fn summarize(scenario_id: &str, outcomes: &[PathOutcome], config: &SimConfig) -> SimulationSummary {
    let n = outcomes.len();
    let survived = outcomes.iter().filter(|o| o.survived).count();
    let survival_rate = if n == 0 { 0.0 } else { survived as f64 / n as f64 };

    let arr = triple(&outcomes.iter().map(|o| o.final_arr_usd).collect::<Vec<_>>());
    let runway_months = triple(&outcomes.iter().map(|o| o.runway_months).collect::<Vec<_>>());
    let cash = triple(&outcomes.iter().map(|o| o.final_cash_usd).collect::<Vec<_>>());

    let overall_score = overall_score(
        survival_rate,
        arr.p50,
        config.start_arr_usd(),
        runway_months.p50,
        config.runway_cap_months,
    );

    SimulationSummary {
        scenario_id: scenario_id.to_string(),
        survival_rate,
        arr,
        runway_months,
        cash,
        overall_score,
        rating: Rating::from_score(overall_score),
        risk: RiskLevel::from_survival(survival_rate),
        paths: n,
        horizon_months: config.path.steps,
    }
}

/// Simulate a lever vector for a scenario, returning summary and bands.
pub fn run(levers: &LeverVector, scenario_id: &str, config: &SimConfig) -> Result<SimulationRun, EngineError> {
    config.validate()?;
    let model = ModelParams::from_levers(levers);
    let seed = scenario_seed(config.seed, scenario_id);
    let paths = generate_batch(&model.path, seed, config.paths, &config.path);
    let bands = aggregate_default(&paths)?;

    let opex = config.monthly_opex_usd * model.opex_multiplier;
    let outcomes: Vec<PathOutcome> = paths.iter().map(|p| evaluate_path(p, opex, config)).collect();
    let summary = summarize(scenario_id, &outcomes, config);
    info!(
        scenario_id,
        survival = summary.survival_rate,
        score = summary.overall_score,
        rating = %summary.rating,
        "simulation complete"
    );
    Ok(SimulationRun { summary, bands })
}

/// Summary only.
pub fn simulate(levers: &LeverVector, scenario_id: &str, config: &SimConfig) -> Result<SimulationSummary, EngineError> {
    run(levers, scenario_id, config).map(|r| r.summary)
}

/// ARR bands only.
pub fn simulate_bands(levers: &LeverVector, scenario_id: &str, config: &SimConfig) -> Result<PercentileBands, EngineError> {
    run(levers, scenario_id, config).map(|r| r.bands)
}

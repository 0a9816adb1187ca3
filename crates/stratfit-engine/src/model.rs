//! Mapping from lever positions to simulation parameters.

use crate::path::PathParams;
use serde::{Deserialize, Serialize};
use stratfit_core::{Lever, LeverVector};

const MULTIPLIER_MIN: f64 = 0.8;
const MULTIPLIER_SPAN: f64 = 0.7;

/// Parameters derived from a lever vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub path: PathParams,
    /// Scales the configured monthly operating cost, in [0.4, 1.7].
    pub opex_multiplier: f64,
}

fn unit(levers: &LeverVector, lever: Lever) -> f64 {
    levers.value(lever) / 100.0
}

fn multiplier(mix: f64) -> f64 {
    MULTIPLIER_MIN + MULTIPLIER_SPAN * mix
}

impl ModelParams {
    /// Each path multiplier lands in [0.8, 1.5]. Missing levers count as neutral.
    pub fn from_levers(levers: &LeverVector) -> Self {
        let demand = unit(levers, Lever::DemandStrength);
        let pricing = unit(levers, Lever::PricingPower);
        let cost = unit(levers, Lever::CostDiscipline);
        let hiring = unit(levers, Lever::HiringIntensity);
        let drag = unit(levers, Lever::OperatingDrag);
        let volatility = unit(levers, Lever::MarketVolatility);
        let execution = unit(levers, Lever::ExecutionRisk);

        Self {
            path: PathParams {
                growth_rate: multiplier(0.6 * demand + 0.4 * hiring),
                market_expansion: multiplier(0.7 * pricing + 0.3 * cost),
                operational_risk: multiplier(0.5 * volatility + 0.3 * execution + 0.2 * drag),
            },
            opex_multiplier: 0.7 + 0.6 * hiring + 0.4 * drag - 0.3 * cost,
        }
    }
}

#![deny(warnings)]

//! Scenario comparison: outcome deltas, divergence score and lever impact.
//!
//! [`calculate_delta`] is pure. It borrows both scenarios immutably and
//! returns a fresh [`ScenarioDelta`]; a scenario without a simulation
//! summary yields a zeroed delta labelled [`DivergenceLabel::NoData`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use stratfit_core::{Lever, LeverVector, Scenario, ScenarioId, SimulationSummary};
use thiserror::Error;
use tracing::debug;

/// Weights of the divergence score components and their normalizers.
///
/// The defaults are hand-tuned product constants with no documented
/// derivation; treat them as tunable, not as engineering truths.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceWeights {
    pub survival: f64,
    pub arr: f64,
    pub runway: f64,
    pub score: f64,
    /// Runway difference that counts as fully divergent, in months.
    pub runway_ceiling_months: f64,
}

impl Default for DivergenceWeights {
    fn default() -> Self {
        Self {
            survival: 0.35,
            arr: 0.30,
            runway: 0.20,
            score: 0.15,
            runway_ceiling_months: 48.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weights must sum to 1.0, got {0}")]
    NotNormalized(f64),
    #[error("weights must be within [0,1]")]
    OutOfRange,
    #[error("runway ceiling must be > 0")]
    InvalidCeiling,
}

impl DivergenceWeights {
    pub fn validate(&self) -> Result<(), WeightsError> {
        let w = [self.survival, self.arr, self.runway, self.score];
        if w.iter().any(|x| !(0.0..=1.0).contains(x)) {
            return Err(WeightsError::OutOfRange);
        }
        let sum: f64 = w.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(WeightsError::NotNormalized(sum));
        }
        if !(self.runway_ceiling_months.is_finite() && self.runway_ceiling_months > 0.0) {
            return Err(WeightsError::InvalidCeiling);
        }
        Ok(())
    }
}

/// Categorical banding of the divergence score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceLabel {
    #[serde(rename = "No Data")]
    NoData,
    #[serde(rename = "Nearly Identical")]
    NearlyIdentical,
    #[serde(rename = "Moderate Differences")]
    ModerateDifferences,
    #[serde(rename = "Significant Divergence")]
    SignificantDivergence,
    #[serde(rename = "Major Strategic Shift")]
    MajorStrategicShift,
    #[serde(rename = "Fundamentally Different")]
    FundamentallyDifferent,
}

impl DivergenceLabel {
    /// Band a score in [0, 100]; bands are contiguous and cover the range.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=14 => DivergenceLabel::NearlyIdentical,
            15..=34 => DivergenceLabel::ModerateDifferences,
            35..=59 => DivergenceLabel::SignificantDivergence,
            60..=84 => DivergenceLabel::MajorStrategicShift,
            _ => DivergenceLabel::FundamentallyDifferent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DivergenceLabel::NoData => "No Data",
            DivergenceLabel::NearlyIdentical => "Nearly Identical",
            DivergenceLabel::ModerateDifferences => "Moderate Differences",
            DivergenceLabel::SignificantDivergence => "Significant Divergence",
            DivergenceLabel::MajorStrategicShift => "Major Strategic Shift",
            DivergenceLabel::FundamentallyDifferent => "Fundamentally Different",
        }
    }
}

impl fmt::Display for DivergenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change of one lever between the two scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverDelta {
    pub lever: Lever,
    pub value_a: f64,
    pub value_b: f64,
    /// `value_b - value_a`.
    pub delta: f64,
    /// `|delta| * importance / 100`.
    pub impact_on_divergence: f64,
}

/// Comparison of scenario B (exploration) against scenario A (baseline).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDelta {
    pub scenario_a: ScenarioId,
    pub scenario_b: ScenarioId,
    /// Percentage points.
    pub survival_delta: f64,
    pub arr_delta: f64,
    pub arr_delta_percent: f64,
    /// Months.
    pub runway_delta: f64,
    pub runway_delta_percent: f64,
    pub score_delta: f64,
    /// 0–100.
    pub divergence_score: u8,
    pub divergence_label: DivergenceLabel,
    /// Sorted by descending |impact|, ties by lever key.
    pub lever_deltas: Vec<LeverDelta>,
}

impl ScenarioDelta {
    fn no_data(a: &Scenario, b: &Scenario) -> Self {
        Self {
            scenario_a: a.id.clone(),
            scenario_b: b.id.clone(),
            survival_delta: 0.0,
            arr_delta: 0.0,
            arr_delta_percent: 0.0,
            runway_delta: 0.0,
            runway_delta_percent: 0.0,
            score_delta: 0.0,
            divergence_score: 0,
            divergence_label: DivergenceLabel::NoData,
            lever_deltas: Vec::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.divergence_label != DivergenceLabel::NoData
    }

    /// The `n` levers contributing most to the divergence.
    pub fn top_drivers(&self, n: usize) -> &[LeverDelta] {
        &self.lever_deltas[..n.min(self.lever_deltas.len())]
    }
}

/// `delta` as a percentage of `base`; 0 when `base` is 0.
pub fn percent_change(delta: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        delta * 100.0 / base
    }
}

/// Weighted 0–100 divergence between two summaries. Symmetric in its arguments.
pub fn divergence_score(a: &SimulationSummary, b: &SimulationSummary, weights: &DivergenceWeights) -> u8 {
    let survival_norm = (b.survival_rate - a.survival_rate).abs();
    let arr_mean = (a.median_arr() + b.median_arr()) / 2.0;
    let arr_norm = if arr_mean == 0.0 {
        0.0
    } else {
        (b.median_arr() - a.median_arr()).abs() / arr_mean
    };
    let runway_norm = (b.median_runway() - a.median_runway()).abs() / weights.runway_ceiling_months;
    let score_norm = (b.overall_score - a.overall_score).abs() / 100.0;

    let raw = survival_norm * weights.survival
        + arr_norm * weights.arr
        + runway_norm * weights.runway
        + score_norm * weights.score;
    if raw.is_nan() {
        return 0;
    }
    (raw.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn by_impact(x: &LeverDelta, y: &LeverDelta) -> Ordering {
    y.impact_on_divergence
        .abs()
        .total_cmp(&x.impact_on_divergence.abs())
        .then_with(|| x.lever.key().cmp(y.lever.key()))
}

/// Per-lever deltas for levers present in both vectors, ranked by impact.
pub fn lever_deltas(a: &LeverVector, b: &LeverVector) -> Vec<LeverDelta> {
    let mut out: Vec<LeverDelta> = a
        .iter()
        .filter_map(|(lever, value_a)| {
            let value_b = b.get(lever)?;
            let delta = value_b - value_a;
            Some(LeverDelta {
                lever,
                value_a,
                value_b,
                delta,
                impact_on_divergence: delta.abs() * lever.importance_weight() / 100.0,
            })
        })
        .collect();
    out.sort_by(by_impact);
    out
}

/// Compare `b` against baseline `a` with the default weights.
pub fn calculate_delta(a: &Scenario, b: &Scenario) -> ScenarioDelta {
    calculate_delta_with(a, b, &DivergenceWeights::default())
}

/// Compare `b` against baseline `a` with explicit weights.
pub fn calculate_delta_with(a: &Scenario, b: &Scenario, weights: &DivergenceWeights) -> ScenarioDelta {
    let (sa, sb) = match (&a.summary, &b.summary) {
        (Some(sa), Some(sb)) => (sa, sb),
        _ => {
            debug!(a = %a.id, b = %b.id, "missing simulation summary, returning no-data delta");
            return ScenarioDelta::no_data(a, b);
        }
    };

    let arr_delta = sb.median_arr() - sa.median_arr();
    let runway_delta = sb.median_runway() - sa.median_runway();
    let divergence_score = divergence_score(sa, sb, weights);
    let delta = ScenarioDelta {
        scenario_a: a.id.clone(),
        scenario_b: b.id.clone(),
        survival_delta: (sb.survival_rate - sa.survival_rate) * 100.0,
        arr_delta,
        arr_delta_percent: percent_change(arr_delta, sa.median_arr()),
        runway_delta,
        runway_delta_percent: percent_change(runway_delta, sa.median_runway()),
        score_delta: sb.overall_score - sa.overall_score,
        divergence_score,
        divergence_label: DivergenceLabel::from_score(divergence_score),
        lever_deltas: lever_deltas(&a.levers, &b.levers),
    };
    debug!(
        a = %a.id,
        b = %b.id,
        score = delta.divergence_score,
        label = %delta.divergence_label,
        "scenario delta computed"
    );
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use stratfit_core::{PercentileTriple, Rating, RiskLevel};

    fn summary(survival: f64, arr: f64, runway: f64, score: f64) -> SimulationSummary {
        SimulationSummary {
            scenario_id: "s".into(),
            survival_rate: survival,
            arr: PercentileTriple { p10: arr * 0.8, p50: arr, p90: arr * 1.2 },
            runway_months: PercentileTriple { p10: runway * 0.5, p50: runway, p90: runway },
            cash: PercentileTriple::default(),
            overall_score: score,
            rating: Rating::from_score(score),
            risk: RiskLevel::from_survival(survival),
            paths: 100,
            horizon_months: 36,
        }
    }

    fn scenario(id: &str, levers: LeverVector, summary: Option<SimulationSummary>) -> Scenario {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut s = Scenario::new(ScenarioId(id.into()), id, levers, now);
        s.summary = summary;
        s
    }

    #[test]
    fn default_weights_sum_to_one() {
        DivergenceWeights::default().validate().unwrap();
        let bad = DivergenceWeights { survival: 0.5, ..DivergenceWeights::default() };
        assert!(matches!(bad.validate(), Err(WeightsError::NotNormalized(_))));
        let neg = DivergenceWeights { survival: -0.1, arr: 0.75, ..DivergenceWeights::default() };
        assert_eq!(neg.validate(), Err(WeightsError::OutOfRange));
    }

    #[test]
    fn concrete_demand_scenario() {
        let base_levers = LeverVector::neutral();
        let explore_levers = base_levers.with(Lever::DemandStrength, 70.0);
        let a = scenario("base", base_levers, Some(summary(0.8, 2_000_000.0, 24.0, 60.0)));
        let b = scenario("explore", explore_levers, Some(summary(0.85, 2_400_000.0, 26.0, 66.0)));
        let d = calculate_delta(&a, &b);
        assert_eq!(d.arr_delta, 400_000.0);
        assert_eq!(d.arr_delta_percent, 20.0);
        assert_eq!(d.score_delta, 6.0);
        assert_eq!(d.lever_deltas[0].lever, Lever::DemandStrength);
        assert_eq!(d.lever_deltas[0].delta, 20.0);
        assert!((d.lever_deltas[0].impact_on_divergence - 0.18).abs() < 1e-12);
        assert!(d.lever_deltas[1..].iter().all(|l| l.delta == 0.0));
        assert!(d.has_data());
    }

    #[test]
    fn divergence_matches_hand_computation() {
        let a = scenario("a", LeverVector::neutral(), Some(summary(0.9, 2_000_000.0, 30.0, 70.0)));
        let b = scenario("b", LeverVector::neutral(), Some(summary(0.5, 1_000_000.0, 18.0, 45.0)));
        // 0.4*0.35 + (1M/1.5M)*0.30 + (12/48)*0.20 + 0.25*0.15 = 0.4275
        let d = calculate_delta(&a, &b);
        assert_eq!(d.divergence_score, 43);
        assert_eq!(d.divergence_label, DivergenceLabel::SignificantDivergence);
        assert!((d.survival_delta + 40.0).abs() < 1e-9);
        assert_eq!(d.runway_delta, -12.0);
        assert!((d.runway_delta_percent + 40.0).abs() < 1e-9);
    }

    #[test]
    fn missing_summary_yields_no_data() {
        let a = scenario("a", LeverVector::neutral(), None);
        let b = scenario("b", LeverVector::neutral().with(Lever::PricingPower, 90.0),
                         Some(summary(0.9, 1.0, 1.0, 1.0)));
        for d in [calculate_delta(&a, &b), calculate_delta(&b, &a)] {
            assert_eq!(d.divergence_label, DivergenceLabel::NoData);
            assert_eq!(d.divergence_label.to_string(), "No Data");
            assert_eq!(d.divergence_score, 0);
            assert_eq!(d.survival_delta, 0.0);
            assert_eq!(d.arr_delta, 0.0);
            assert_eq!(d.arr_delta_percent, 0.0);
            assert_eq!(d.runway_delta, 0.0);
            assert_eq!(d.score_delta, 0.0);
            assert!(d.lever_deltas.is_empty());
            assert!(!d.has_data());
        }
    }

    #[test]
    fn zero_baseline_guards_percentages() {
        let a = scenario("a", LeverVector::neutral(), Some(summary(0.0, 0.0, 0.0, 0.0)));
        let b = scenario("b", LeverVector::neutral(), Some(summary(0.0, 500_000.0, 6.0, 10.0)));
        let d = calculate_delta(&a, &b);
        assert_eq!(d.arr_delta_percent, 0.0);
        assert_eq!(d.runway_delta_percent, 0.0);
        assert!(d.arr_delta_percent.is_finite());
        let both_zero = calculate_delta(&a, &a);
        assert_eq!(both_zero.divergence_score, 0);
        assert_eq!(both_zero.divergence_label, DivergenceLabel::NearlyIdentical);
    }

    #[test]
    fn only_shared_levers_are_compared() {
        let a = LeverVector::from_pairs([(Lever::DemandStrength, 10.0), (Lever::PricingPower, 10.0)]);
        let b = LeverVector::from_pairs([(Lever::DemandStrength, 20.0), (Lever::ExecutionRisk, 90.0)]);
        let d = lever_deltas(&a, &b);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].lever, Lever::DemandStrength);
    }

    #[test]
    fn equal_impacts_sorted_by_key() {
        let a = LeverVector::neutral();
        let b = a.with(Lever::DemandStrength, 80.0);
        let order: Vec<&str> = lever_deltas(&a, &b).iter().map(|l| l.lever.key()).collect();
        assert_eq!(
            order,
            [
                "demandStrength",
                "costDiscipline",
                "executionRisk",
                "hiringIntensity",
                "marketVolatility",
                "operatingDrag",
                "pricingPower",
            ]
        );
    }

    #[test]
    fn labels_cover_range_monotonically() {
        let order = [
            DivergenceLabel::NearlyIdentical,
            DivergenceLabel::ModerateDifferences,
            DivergenceLabel::SignificantDivergence,
            DivergenceLabel::MajorStrategicShift,
            DivergenceLabel::FundamentallyDifferent,
        ];
        let rank = |l: DivergenceLabel| order.iter().position(|&o| o == l).unwrap();
        for s in 1..=100u8 {
            assert!(rank(DivergenceLabel::from_score(s)) >= rank(DivergenceLabel::from_score(s - 1)));
        }
        assert_eq!(DivergenceLabel::from_score(14), DivergenceLabel::NearlyIdentical);
        assert_eq!(DivergenceLabel::from_score(15), DivergenceLabel::ModerateDifferences);
        assert_eq!(DivergenceLabel::from_score(85), DivergenceLabel::FundamentallyDifferent);
    }

    #[test]
    fn label_serializes_as_display_text() {
        let s = serde_json::to_string(&DivergenceLabel::MajorStrategicShift).unwrap();
        assert_eq!(s, "\"Major Strategic Shift\"");
    }

    #[test]
    fn top_drivers_is_bounded() {
        let a = scenario("a", LeverVector::neutral(), Some(summary(0.9, 1.0, 1.0, 1.0)));
        let b = scenario("b", LeverVector::neutral(), Some(summary(0.9, 1.0, 1.0, 1.0)));
        let d = calculate_delta(&a, &b);
        assert_eq!(d.top_drivers(3).len(), 3);
        assert_eq!(d.top_drivers(100).len(), Lever::ALL.len());
    }

    fn arb_summary() -> impl Strategy<Value = SimulationSummary> {
        (0.0f64..=1.0, 0.0f64..1.0e8, 0.0f64..60.0, 0.0f64..=100.0)
            .prop_map(|(s, a, r, sc)| summary(s, a, r, sc))
    }

    fn arb_levers() -> impl Strategy<Value = LeverVector> {
        prop::array::uniform7(0.0f64..=100.0)
            .prop_map(|v| LeverVector::from_pairs(Lever::ALL.iter().copied().zip(v)))
    }

    proptest! {
        #[test]
        fn deltas_antisymmetric(sa in arb_summary(), sb in arb_summary(), la in arb_levers(), lb in arb_levers()) {
            let a = scenario("a", la, Some(sa));
            let b = scenario("b", lb, Some(sb));
            let ab = calculate_delta(&a, &b);
            let ba = calculate_delta(&b, &a);
            prop_assert_eq!(ab.survival_delta, -ba.survival_delta);
            prop_assert_eq!(ab.arr_delta, -ba.arr_delta);
            prop_assert_eq!(ab.runway_delta, -ba.runway_delta);
            prop_assert_eq!(ab.score_delta, -ba.score_delta);
            prop_assert_eq!(ab.divergence_score, ba.divergence_score);
        }

        #[test]
        fn divergence_bounded(sa in arb_summary(), sb in arb_summary()) {
            let a = scenario("a", LeverVector::neutral(), Some(sa));
            let b = scenario("b", LeverVector::neutral(), Some(sb));
            let d = calculate_delta(&a, &b);
            prop_assert!(d.divergence_score <= 100);
            prop_assert_eq!(d.divergence_label, DivergenceLabel::from_score(d.divergence_score));
        }

        #[test]
        fn lever_deltas_sorted(la in arb_levers(), lb in arb_levers()) {
            let d = lever_deltas(&la, &lb);
            prop_assert_eq!(d.len(), Lever::ALL.len());
            for w in d.windows(2) {
                prop_assert!(w[0].impact_on_divergence.abs() >= w[1].impact_on_divergence.abs());
            }
        }
    }
}

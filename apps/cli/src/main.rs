#![deny(warnings)]

//! Headless CLI: simulate a preset, optionally compare it with a second one.

use anyhow::{anyhow, Result};
use persistence::{cents_to_usd, usd_to_cents, JsonFileStore, KvStore, MemoryStore};
use stratfit_compare::ScenarioDelta;
use stratfit_core::{parse_lever_assignment, Lever, Scenario, SimulationSummary};
use stratfit_engine::{simulate_bands, SimConfig};
use stratfit_runtime::{Command, Controller, WORKING_SCENARIO_ID};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    preset: Option<String>,
    compare: Option<String>,
    overrides: Vec<(Lever, f64)>,
    config: Option<String>,
    save: Option<String>,
    json: bool,
    version: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--preset" => args.preset = it.next(),
            "--compare" => args.compare = it.next(),
            "--set" => {
                let raw = it.next().ok_or_else(|| anyhow!("--set expects key=value"))?;
                args.overrides.push(parse_lever_assignment(&raw)?);
            }
            "--config" => args.config = it.next(),
            "--save" => args.save = it.next(),
            "--json" => args.json = true,
            "--version" => args.version = true,
            _ => {}
        }
    }
    Ok(args)
}

struct Report {
    primary: Scenario,
    secondary: Option<Scenario>,
    delta: Option<ScenarioDelta>,
}

/// Set the working levers, run them and save the result as a scenario.
fn run_and_save<S: KvStore>(
    controller: &mut Controller<S>,
    preset: &str,
    overrides: &[(Lever, f64)],
) -> Result<Scenario> {
    controller.dispatch(Command::ApplyPreset(preset.to_string()))?;
    for &(lever, value) in overrides {
        controller.dispatch(Command::SetLever { lever, value })?;
    }
    controller.dispatch(Command::RunSimulation)?;
    controller.dispatch(Command::SaveScenario { name: preset.to_string() })?;
    controller
        .state()
        .scenarios
        .last()
        .cloned()
        .ok_or_else(|| anyhow!("scenario was not saved"))
}

fn session<S: KvStore>(mut controller: Controller<S>, args: &Args, persist: bool) -> Result<Report> {
    let preset = args.preset.as_deref().unwrap_or("baseline");
    let primary = run_and_save(&mut controller, preset, &args.overrides)?;
    controller.dispatch(Command::SetBaseline(primary.id.clone()))?;

    let (secondary, delta) = match args.compare.as_deref() {
        Some(name) => {
            let other = run_and_save(&mut controller, name, &[])?;
            let delta = controller.compare(&primary.id, &other.id)?;
            (Some(other), Some(delta))
        }
        None => (None, None),
    };

    if persist {
        controller.persist()?;
    }
    Ok(Report { primary, secondary, delta })
}

/// Dollar amount rounded to whole cents.
fn money(usd: f64) -> String {
    usd_to_cents(usd)
        .map(|c| format!("${}", cents_to_usd(c)))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Median money figures in whole cents, for exact downstream totals.
fn money_cents(s: &SimulationSummary) -> serde_json::Value {
    serde_json::json!({
        "arrP50Cents": usd_to_cents(s.arr.p50),
        "cashP50Cents": usd_to_cents(s.cash.p50),
    })
}

fn summary_line(name: &str, s: &SimulationSummary) -> String {
    format!(
        "{} | score: {:.1} ({}) | survival: {:.1}% ({} risk) | ARR p50: {} | cash p50: {} | runway p50: {:.1} mo",
        name,
        s.overall_score,
        s.rating,
        s.survival_rate * 100.0,
        s.risk,
        money(s.arr.p50),
        money(s.cash.p50),
        s.runway_months.p50
    )
}

fn delta_lines(d: &ScenarioDelta) -> Vec<String> {
    let mut lines = vec![format!(
        "Delta {} -> {} | divergence: {} ({})",
        d.scenario_a, d.scenario_b, d.divergence_score, d.divergence_label
    )];
    if !d.has_data() {
        return lines;
    }
    // survival_delta is already in percentage points
    lines.push(format!(
        "  survival: {:+.1} pts | ARR: {:+.0} ({:+.1}%) | runway: {:+.1} mo ({:+.1}%) | score: {:+.1}",
        d.survival_delta,
        d.arr_delta,
        d.arr_delta_percent,
        d.runway_delta,
        d.runway_delta_percent,
        d.score_delta
    ));
    for ld in d.top_drivers(3) {
        lines.push(format!(
            "  {:<18} {:>5.1} -> {:>5.1} (impact {:.2})",
            ld.lever.label(),
            ld.value_a,
            ld.value_b,
            ld.impact_on_divergence
        ));
    }
    lines
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    if args.version {
        println!("stratfit {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_SHA"));
        return Ok(());
    }
    info!(preset = ?args.preset, compare = ?args.compare, "starting CLI");

    let config = match &args.config {
        Some(path) => SimConfig::from_yaml_file(path)?,
        None => SimConfig::default(),
    };

    let report = match &args.save {
        Some(path) => {
            let store = JsonFileStore::open(path)?;
            session(Controller::restore(store, config.clone())?, &args, true)?
        }
        None => session(Controller::new(MemoryStore::new(), config.clone()), &args, false)?,
    };

    let bands = simulate_bands(&report.primary.levers, WORKING_SCENARIO_ID, &config)?;

    if args.json {
        let out = serde_json::json!({
            "scenario": report.primary,
            "money": report.primary.summary.as_ref().map(money_cents),
            "bands": bands,
            "comparison": report.secondary,
            "delta": report.delta,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for scenario in std::iter::once(&report.primary).chain(report.secondary.as_ref()) {
        if let Some(summary) = &scenario.summary {
            println!("{}", summary_line(&scenario.name, summary));
        }
    }
    println!("ARR bands ($M) | month: p05 / p50 / p95");
    for t in (0..bands.len()).step_by(6) {
        if let Some((lo, mid, hi)) = bands.at(t) {
            println!("  {:>3}: {:.2} / {:.2} / {:.2}", t, lo, mid, hi);
        }
    }
    if let Some(delta) = &report.delta {
        for line in delta_lines(delta) {
            println!("{}", line);
        }
    }
    if let Some(path) = &args.save {
        println!("saved to {}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratfit_compare::DivergenceLabel;
    use stratfit_core::{PercentileTriple, Rating, RiskLevel, ScenarioId};

    fn delta(survival_delta: f64) -> ScenarioDelta {
        ScenarioDelta {
            scenario_a: ScenarioId("baseline".into()),
            scenario_b: ScenarioId("turbulent".into()),
            survival_delta,
            arr_delta: -120_000.0,
            arr_delta_percent: -5.0,
            runway_delta: -2.0,
            runway_delta_percent: -4.0,
            score_delta: -3.0,
            divergence_score: 12,
            divergence_label: DivergenceLabel::NearlyIdentical,
            lever_deltas: Vec::new(),
        }
    }

    #[test]
    fn survival_delta_printed_as_points() {
        let lines = delta_lines(&delta(-0.4));
        assert!(lines[1].contains("survival: -0.4 pts"), "{}", lines[1]);
    }

    #[test]
    fn no_data_delta_prints_header_only() {
        let mut d = delta(0.0);
        d.divergence_label = DivergenceLabel::NoData;
        assert_eq!(delta_lines(&d).len(), 1);
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(money(2_400_000.0), "$2400000.00");
        assert_eq!(money(12.346), "$12.35");
        assert_eq!(money(f64::NAN), "n/a");
    }

    #[test]
    fn money_cents_uses_medians() {
        let triple = |p50| PercentileTriple { p10: 0.0, p50, p90: p50 };
        let s = SimulationSummary {
            scenario_id: "current".into(),
            survival_rate: 1.0,
            arr: triple(2_400_000.0),
            runway_months: triple(48.0),
            cash: triple(1_250_000.5),
            overall_score: 80.0,
            rating: Rating::from_score(80.0),
            risk: RiskLevel::from_survival(1.0),
            paths: 10,
            horizon_months: 36,
        };
        assert_eq!(
            money_cents(&s),
            serde_json::json!({ "arrP50Cents": 240_000_000i64, "cashP50Cents": 125_000_050i64 })
        );
        assert!(summary_line("base", &s).contains("ARR p50: $2400000.00"));
    }
}

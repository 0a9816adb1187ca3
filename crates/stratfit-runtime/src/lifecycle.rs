//! Freshness state machine for simulation results.
//!
//! ```text
//! idle/stale/complete/error --begin_run--> running
//! running --finish--> complete
//! running --fail--> error        (last good summary kept)
//! complete --levers_changed--> stale
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use stratfit_core::SimulationSummary;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Stale,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Stale => "stale",
            RunStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("a simulation run is already in progress")]
    AlreadyRunning,
    #[error("no run in progress (status: {0})")]
    NotRunning(RunStatus),
    #[error("simulation run failed: {0}")]
    RunFailed(String),
}

/// Status plus the last successful result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationLifecycle {
    status: RunStatus,
    last_good: Option<SimulationSummary>,
    /// Fingerprint of the levers that produced `last_good`.
    last_good_fingerprint: Option<u64>,
    /// Fingerprint of the levers of the run in progress.
    pending_fingerprint: Option<u64>,
    last_error: Option<String>,
}

impl SimulationLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Last successful summary, kept across failures and staleness.
    pub fn last_good(&self) -> Option<&SimulationSummary> {
        self.last_good.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Summary matching the current levers, if the last run is still valid.
    pub fn fresh_summary(&self) -> Option<&SimulationSummary> {
        match self.status {
            RunStatus::Complete => self.last_good.as_ref(),
            _ => None,
        }
    }

    pub fn begin_run(&mut self, fingerprint: u64) -> Result<(), LifecycleError> {
        if self.status == RunStatus::Running {
            return Err(LifecycleError::AlreadyRunning);
        }
        debug!(from = %self.status, fingerprint, "run started");
        self.status = RunStatus::Running;
        self.pending_fingerprint = Some(fingerprint);
        Ok(())
    }

    pub fn finish(&mut self, summary: SimulationSummary) -> Result<(), LifecycleError> {
        if self.status != RunStatus::Running {
            return Err(LifecycleError::NotRunning(self.status));
        }
        self.status = RunStatus::Complete;
        self.last_good = Some(summary);
        self.last_good_fingerprint = self.pending_fingerprint.take();
        self.last_error = None;
        debug!("run complete");
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), LifecycleError> {
        if self.status != RunStatus::Running {
            return Err(LifecycleError::NotRunning(self.status));
        }
        let message = message.into();
        warn!(error = %message, "run failed; keeping last good result");
        self.status = RunStatus::Error;
        self.pending_fingerprint = None;
        self.last_error = Some(message);
        Ok(())
    }

    /// Invalidate a complete result when the lever fingerprint moves away from it.
    pub fn levers_changed(&mut self, fingerprint: u64) {
        if self.status == RunStatus::Complete && self.last_good_fingerprint != Some(fingerprint) {
            debug!(fingerprint, "levers changed; result is stale");
            self.status = RunStatus::Stale;
        }
    }

    /// Drive one run through the machine. Nothing is stored unless `compute` succeeds.
    pub fn run_with<F, E>(&mut self, fingerprint: u64, compute: F) -> Result<SimulationSummary, LifecycleError>
    where
        F: FnOnce() -> Result<SimulationSummary, E>,
        E: fmt::Display,
    {
        self.begin_run(fingerprint)?;
        match compute() {
            Ok(summary) => {
                self.finish(summary.clone())?;
                Ok(summary)
            }
            Err(e) => {
                let message = e.to_string();
                self.fail(message.clone())?;
                Err(LifecycleError::RunFailed(message))
            }
        }
    }

    /// Settle a state restored mid-run: no computation survives a restart.
    pub fn recover(&mut self) {
        if self.status == RunStatus::Running {
            self.pending_fingerprint = None;
            self.status = if self.last_good.is_some() {
                RunStatus::Stale
            } else {
                RunStatus::Idle
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratfit_core::{PercentileTriple, Rating, RiskLevel};

    fn summary(score: f64) -> SimulationSummary {
        SimulationSummary {
            scenario_id: "current".into(),
            survival_rate: 0.9,
            arr: PercentileTriple::default(),
            runway_months: PercentileTriple::default(),
            cash: PercentileTriple::default(),
            overall_score: score,
            rating: Rating::from_score(score),
            risk: RiskLevel::Low,
            paths: 1,
            horizon_months: 36,
        }
    }

    #[test]
    fn idle_to_complete() {
        let mut lc = SimulationLifecycle::new();
        assert_eq!(lc.status(), RunStatus::Idle);
        lc.begin_run(1).unwrap();
        assert_eq!(lc.status(), RunStatus::Running);
        assert_eq!(lc.begin_run(1), Err(LifecycleError::AlreadyRunning));
        lc.finish(summary(70.0)).unwrap();
        assert_eq!(lc.status(), RunStatus::Complete);
        assert_eq!(lc.fresh_summary().map(|s| s.overall_score), Some(70.0));
    }

    #[test]
    fn lever_change_makes_stale_until_rerun() {
        let mut lc = SimulationLifecycle::new();
        lc.run_with(1, || Ok::<_, String>(summary(60.0))).unwrap();
        lc.levers_changed(1);
        assert_eq!(lc.status(), RunStatus::Complete);
        lc.levers_changed(2);
        assert_eq!(lc.status(), RunStatus::Stale);
        assert!(lc.fresh_summary().is_none());
        assert!(lc.last_good().is_some());
        lc.run_with(2, || Ok::<_, String>(summary(65.0))).unwrap();
        assert_eq!(lc.status(), RunStatus::Complete);
    }

    #[test]
    fn failure_keeps_last_good() {
        let mut lc = SimulationLifecycle::new();
        lc.run_with(1, || Ok::<_, String>(summary(55.0))).unwrap();
        let err = lc.run_with(2, || Err::<SimulationSummary, _>("boom")).unwrap_err();
        assert_eq!(err, LifecycleError::RunFailed("boom".into()));
        assert_eq!(lc.status(), RunStatus::Error);
        assert_eq!(lc.last_error(), Some("boom"));
        assert_eq!(lc.last_good().map(|s| s.overall_score), Some(55.0));
        assert!(lc.fresh_summary().is_none());
        // lever edits do not clear the error
        lc.levers_changed(3);
        assert_eq!(lc.status(), RunStatus::Error);
        // user may retry
        lc.run_with(3, || Ok::<_, String>(summary(58.0))).unwrap();
        assert_eq!(lc.last_error(), None);
    }

    #[test]
    fn finish_and_fail_require_running() {
        let mut lc = SimulationLifecycle::new();
        assert_eq!(lc.finish(summary(1.0)), Err(LifecycleError::NotRunning(RunStatus::Idle)));
        assert_eq!(lc.fail("x"), Err(LifecycleError::NotRunning(RunStatus::Idle)));
    }

    #[test]
    fn recover_settles_interrupted_run() {
        let mut lc = SimulationLifecycle::new();
        lc.begin_run(1).unwrap();
        lc.recover();
        assert_eq!(lc.status(), RunStatus::Idle);
        lc.run_with(1, || Ok::<_, String>(summary(50.0))).unwrap();
        lc.begin_run(2).unwrap();
        lc.recover();
        assert_eq!(lc.status(), RunStatus::Stale);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RunStatus::Stale).unwrap(), "\"stale\"");
    }
}

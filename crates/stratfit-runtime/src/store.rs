//! Application state owned by a single controller.
//!
//! All mutation goes through [`Controller::dispatch`] with a [`Command`].
//! Every command that changes state bumps [`AppState::version`]. Scenarios and lever
//! vectors are replaced, never edited in place, so snapshots handed out
//! earlier stay valid.

use crate::lifecycle::{LifecycleError, RunStatus, SimulationLifecycle};
use chrono::{DateTime, Utc};
use persistence::{get_json, put_json, KvStore, PersistenceError, SCHEMA_VERSION, SCHEMA_VERSION_KEY};
use serde::{Deserialize, Serialize};
use stratfit_compare::{calculate_delta, ScenarioDelta};
use stratfit_core::{validate_scenario, Lever, LeverVector, Scenario, ScenarioId, ValidationError};
use stratfit_engine::{preset, simulate, EngineError, PresetError, SimConfig};
use thiserror::Error;
use tracing::{debug, info};

/// Undo history depth.
pub const HISTORY_LIMIT: usize = 50;
/// Key the state is stored under.
pub const STATE_KEY: &str = "stratfit.app_state";
/// Scenario id used when simulating the unsaved working levers.
pub const WORKING_SCENARIO_ID: &str = "current";

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("unknown scenario: {0}")]
    UnknownScenario(ScenarioId),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error("no baseline scenario set")]
    NoBaseline,
    #[error("stored schema version {found} does not match {expected}")]
    SchemaMismatch { found: String, expected: &'static str },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Preset(#[from] PresetError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// User intents accepted by the controller.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetLever { lever: Lever, value: f64 },
    SetLevers(LeverVector),
    ApplyPreset(String),
    Undo,
    Redo,
    /// Simulate the working levers.
    RunSimulation,
    /// Re-simulate a saved scenario with its own levers and id.
    RunScenario(ScenarioId),
    /// Save the working levers (and their fresh result, if any) as a scenario.
    SaveScenario { name: String },
    SetBaseline(ScenarioId),
    DeleteScenario(ScenarioId),
    RenameScenario { id: ScenarioId, name: String },
}

/// Versioned application state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub version: u64,
    pub levers: LeverVector,
    pub undo: Vec<LeverVector>,
    pub redo: Vec<LeverVector>,
    pub scenarios: Vec<Scenario>,
    pub lifecycle: SimulationLifecycle,
    next_id: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 0,
            levers: LeverVector::neutral(),
            undo: Vec::new(),
            redo: Vec::new(),
            scenarios: Vec::new(),
            lifecycle: SimulationLifecycle::new(),
            next_id: 1,
        }
    }
}

impl AppState {
    pub fn scenario(&self, id: &ScenarioId) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| &s.id == id)
    }

    pub fn baseline(&self) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.is_baseline)
    }

    fn position(&self, id: &ScenarioId) -> Result<usize, StoreError> {
        self.scenarios
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| StoreError::UnknownScenario(id.clone()))
    }
}

/// Owns the state, the simulation config and the injected store.
pub struct Controller<S: KvStore> {
    state: AppState,
    store: S,
    config: SimConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<S: KvStore> Controller<S> {
    pub fn new(store: S, config: SimConfig) -> Self {
        Self {
            state: AppState::default(),
            store,
            config,
            clock: Utc::now,
        }
    }

    /// Load the persisted state, or start fresh when none is stored.
    /// A store written with another schema version is rejected.
    pub fn restore(store: S, config: SimConfig) -> Result<Self, StoreError> {
        if let Some(found) = store.get(SCHEMA_VERSION_KEY)? {
            if found != SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
        }
        let mut state: AppState = get_json(&store, STATE_KEY)?.unwrap_or_default();
        state.lifecycle.recover();
        info!(version = state.version, scenarios = state.scenarios.len(), "state restored");
        Ok(Self {
            state,
            store,
            config,
            clock: Utc::now,
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn status(&self) -> RunStatus {
        self.state.lifecycle.status()
    }

    pub fn persist(&mut self) -> Result<(), StoreError> {
        self.store.put(SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_string())?;
        put_json(&mut self.store, STATE_KEY, &self.state)?;
        info!(version = self.state.version, "state persisted");
        Ok(())
    }

    /// Apply a command. The version is bumped whenever state changed,
    /// including a failed run, which records its error status.
    pub fn dispatch(&mut self, command: Command) -> Result<(), StoreError> {
        debug!(?command, version = self.state.version, "dispatch");
        let result = self.apply(command);
        let changed = match &result {
            Ok(changed) => *changed,
            Err(StoreError::Lifecycle(LifecycleError::RunFailed(_))) => true,
            Err(_) => false,
        };
        if changed {
            self.state.version += 1;
        }
        result.map(|_| ())
    }

    /// Returns whether the state changed.
    fn apply(&mut self, command: Command) -> Result<bool, StoreError> {
        match command {
            Command::SetLever { lever, value } => {
                let next = self.state.levers.with(lever, value);
                self.replace_levers(next);
                Ok(true)
            }
            Command::SetLevers(levers) => {
                self.replace_levers(levers);
                Ok(true)
            }
            Command::ApplyPreset(name) => {
                let levers = preset(&name)?;
                self.replace_levers(levers);
                Ok(true)
            }
            Command::Undo => {
                let prev = self.state.undo.pop().ok_or(StoreError::NothingToUndo)?;
                let current = std::mem::replace(&mut self.state.levers, prev);
                self.state.redo.push(current);
                self.notify_levers();
                Ok(true)
            }
            Command::Redo => {
                let next = self.state.redo.pop().ok_or(StoreError::NothingToRedo)?;
                let current = std::mem::replace(&mut self.state.levers, next);
                self.state.undo.push(current);
                self.notify_levers();
                Ok(true)
            }
            Command::RunSimulation => {
                let levers = self.state.levers.clone();
                let config = &self.config;
                self.state
                    .lifecycle
                    .run_with(levers.fingerprint(), || simulate(&levers, WORKING_SCENARIO_ID, config))?;
                Ok(true)
            }
            Command::RunScenario(id) => {
                let idx = self.state.position(&id)?;
                let scenario = &self.state.scenarios[idx];
                let summary = simulate(&scenario.levers, &scenario.id.0, &self.config)?;
                let updated = scenario.with_summary(summary, (self.clock)());
                self.state.scenarios[idx] = updated;
                Ok(true)
            }
            Command::SaveScenario { name } => {
                let now = (self.clock)();
                let id = ScenarioId(format!("scenario-{}", self.state.next_id));
                let mut scenario = Scenario::new(id, name.trim(), self.state.levers.clone(), now);
                scenario.summary = self.state.lifecycle.fresh_summary().cloned();
                validate_scenario(&scenario)?;
                self.state.next_id += 1;
                info!(id = %scenario.id, name = %scenario.name, "scenario saved");
                self.state.scenarios.push(scenario);
                Ok(true)
            }
            Command::SetBaseline(id) => {
                self.state.position(&id)?;
                let now = (self.clock)();
                let mut changed = false;
                for s in &mut self.state.scenarios {
                    let flag = s.id == id;
                    if s.is_baseline != flag {
                        *s = Scenario {
                            is_baseline: flag,
                            updated_at: now,
                            ..s.clone()
                        };
                        changed = true;
                    }
                }
                Ok(changed)
            }
            Command::DeleteScenario(id) => {
                let idx = self.state.position(&id)?;
                self.state.scenarios.remove(idx);
                Ok(true)
            }
            Command::RenameScenario { id, name } => {
                let idx = self.state.position(&id)?;
                let renamed = Scenario {
                    name: name.trim().to_string(),
                    updated_at: (self.clock)(),
                    ..self.state.scenarios[idx].clone()
                };
                validate_scenario(&renamed)?;
                self.state.scenarios[idx] = renamed;
                Ok(true)
            }
        }
    }

    fn replace_levers(&mut self, next: LeverVector) {
        let prev = std::mem::replace(&mut self.state.levers, next);
        self.state.undo.push(prev);
        if self.state.undo.len() > HISTORY_LIMIT {
            self.state.undo.remove(0);
        }
        self.state.redo.clear();
        self.notify_levers();
    }

    fn notify_levers(&mut self) {
        let fingerprint = self.state.levers.fingerprint();
        self.state.lifecycle.levers_changed(fingerprint);
    }

    /// Delta of scenario `b` against scenario `a`.
    pub fn compare(&self, a: &ScenarioId, b: &ScenarioId) -> Result<ScenarioDelta, StoreError> {
        let sa = self
            .state
            .scenario(a)
            .ok_or_else(|| StoreError::UnknownScenario(a.clone()))?;
        let sb = self
            .state
            .scenario(b)
            .ok_or_else(|| StoreError::UnknownScenario(b.clone()))?;
        Ok(calculate_delta(sa, sb))
    }

    /// The working levers as an unsaved scenario, carrying their fresh result if any.
    pub fn working_scenario(&self) -> Scenario {
        let now = (self.clock)();
        let mut s = Scenario::new(
            ScenarioId(WORKING_SCENARIO_ID.to_string()),
            "Current",
            self.state.levers.clone(),
            now,
        );
        s.summary = self.state.lifecycle.fresh_summary().cloned();
        s
    }

    /// Delta of the working levers against the baseline.
    pub fn compare_working_to_baseline(&self) -> Result<ScenarioDelta, StoreError> {
        let baseline = self.state.baseline().ok_or(StoreError::NoBaseline)?;
        Ok(calculate_delta(baseline, &self.working_scenario()))
    }
}

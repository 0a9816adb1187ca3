#![deny(warnings)]

//! State controller for STRATFIT.
//!
//! - [`lifecycle`]: freshness of simulation results (idle, running,
//!   complete, stale, error).
//! - [`store`]: the single owner of application state. Callers send
//!   [`Command`]s; persistence goes through the injected [`KvStore`].

pub mod lifecycle;
pub mod store;

pub use lifecycle::{LifecycleError, RunStatus, SimulationLifecycle};
pub use persistence::KvStore;
pub use store::{AppState, Command, Controller, StoreError, HISTORY_LIMIT, STATE_KEY, WORKING_SCENARIO_ID};

//! phytodiscover-client: Search-session client for the spectral matching backend.
//! - Response normalisation (every observed payload shape → canonical results)
//! - Search executors (JSON POST and query-string GET)
//! - Data-file registry (cached list of selectable input files)
//! - Search session controller (state machine with stale-response guard)

pub mod executor;
pub mod normalise;
pub mod registry;
pub mod session;

pub use executor::{ExecuteError, HttpSearchExecutor, SearchExecutor};
pub use normalise::{normalize, normalize_with};
pub use registry::{DataFileRegistry, DataFileSource, HttpDataFileSource, RegistryState};
pub use session::{Completion, SearchSession, SessionSettings, SessionState, SubmitError, Ticket};

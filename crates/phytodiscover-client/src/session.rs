//! Search session controller.
//!
//! One controller per user session. It validates submissions, issues at most
//! one search at a time through the injected `SearchExecutor`, and settles the
//! response into `Success` or `Failed`.
//!
//! ```text
//!   Idle ──submit──▶ Loading ──response──▶ Success ─┐
//!    ▲                  │   └──failure───▶ Failed  ─┤
//!    └──── abandon ─────┘        ▲                  │
//!                                └──── submit ──────┘ (via Loading)
//! ```
//!
//! Every request is tagged with a sequence number. A completion whose
//! sequence is not the outstanding one is discarded, which covers abandoned
//! searches and timeouts alike.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use phytodiscover_common::{AnalysisModule, ClassifiedError, ResultSet, SearchQuery, ValidationError};
use phytodiscover_config::{Config, DataFilePolicy, UndecodablePolicy};

use crate::executor::{ExecuteError, SearchExecutor};
use crate::normalise;
use crate::registry::DataFileRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading { query: SearchQuery },
    Success { query: SearchQuery, results: ResultSet },
    Failed { query: SearchQuery, error: ClassifiedError },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle          => "idle",
            SessionState::Loading { .. } => "loading",
            SessionState::Success { .. } => "success",
            SessionState::Failed { .. }  => "failed",
        }
    }

    pub fn query(&self) -> Option<&SearchQuery> {
        match self {
            SessionState::Idle => None,
            SessionState::Loading { query }
            | SessionState::Success { query, .. }
            | SessionState::Failed { query, .. } => Some(query),
        }
    }
}

/// A rejected submission. The session state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("search #{sequence} is still in flight")]
    InFlight { sequence: u64 },
}

/// Handle for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    sequence: u64,
    query: SearchQuery,
}

impl Ticket {
    pub fn sequence(&self) -> u64 { self.sequence }
    pub fn query(&self) -> &SearchQuery { &self.query }
}

/// Outcome of a dispatched request, tagged with its sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub sequence: u64,
    pub outcome: Result<String, ExecuteError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub data_file: DataFilePolicy,
    /// Modules whose data file policy differs from `data_file`.
    pub module_data_file: HashMap<AnalysisModule, DataFilePolicy>,
    pub restrict_to_registry: bool,
    pub undecodable_results: UndecodablePolicy,
    pub request_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            data_file: DataFilePolicy::Optional,
            module_data_file: HashMap::new(),
            restrict_to_registry: true,
            undecodable_results: UndecodablePolicy::Preserve,
            request_timeout: None,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            data_file: config.search.data_file,
            module_data_file: AnalysisModule::ALL
                .into_iter()
                .filter_map(|m| config.modules.data_file_override(m).map(|p| (m, p)))
                .collect(),
            restrict_to_registry: config.search.restrict_to_registry,
            undecodable_results: config.search.undecodable_results,
            request_timeout: config.backend.request_timeout(),
        }
    }

    pub fn data_file_policy(&self, module: AnalysisModule) -> DataFilePolicy {
        self.module_data_file.get(&module).copied().unwrap_or(self.data_file)
    }
}

pub struct SearchSession {
    executor: Arc<dyn SearchExecutor>,
    registry: DataFileRegistry,
    settings: SessionSettings,
    state: SessionState,
    last_sequence: u64,
    outstanding: Option<u64>,
}

impl SearchSession {
    pub fn new(
        executor: Arc<dyn SearchExecutor>,
        registry: DataFileRegistry,
        settings: SessionSettings,
    ) -> Self {
        Self {
            executor,
            registry,
            settings,
            state: SessionState::Idle,
            last_sequence: 0,
            outstanding: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn registry(&self) -> &DataFileRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DataFileRegistry {
        &mut self.registry
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Sequence of the in-flight request, if any.
    pub fn outstanding(&self) -> Option<u64> {
        self.outstanding
    }

    pub fn validate(&self, query: &SearchQuery) -> Result<(), ValidationError> {
        if query.compound_name().is_empty() {
            return Err(ValidationError::EmptyCompoundName);
        }
        match query.data_file() {
            None if self.settings.data_file_policy(query.module()) == DataFilePolicy::Required => {
                Err(ValidationError::MissingDataFile { module: query.module() })
            }
            Some(file)
                if self.settings.restrict_to_registry
                    && self.registry.has_list()
                    && !self.registry.contains(file) =>
            {
                Err(ValidationError::UnknownDataFile { file: file.to_string() })
            }
            _ => Ok(()),
        }
    }

    /// `Idle | Success | Failed → Loading`. Rejected while a search is in
    /// flight or when the query does not validate.
    pub fn begin(&mut self, query: SearchQuery) -> Result<Ticket, SubmitError> {
        if let Some(sequence) = self.outstanding {
            debug!(sequence, "Submission rejected, search in flight");
            return Err(SubmitError::InFlight { sequence });
        }
        if let Err(err) = self.validate(&query) {
            debug!(error = %err, "Submission rejected by validation");
            return Err(err.into());
        }

        self.last_sequence += 1;
        let sequence = self.last_sequence;
        self.outstanding = Some(sequence);
        self.state = SessionState::Loading { query: query.clone() };

        info!(
            sequence,
            module = query.module().slug(),
            compound = query.compound_name(),
            data_file = query.data_file().unwrap_or("-"),
            "Search issued"
        );
        Ok(Ticket { sequence, query })
    }

    /// The request for `ticket`, detached from the session so the caller can
    /// await or spawn it. The configured timeout is applied here.
    pub fn dispatch(&self, ticket: Ticket) -> impl Future<Output = Completion> + Send + 'static {
        let executor = Arc::clone(&self.executor);
        let timeout = self.settings.request_timeout;
        async move {
            let request = executor.execute(&ticket.query);
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, request).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ExecuteError::TimedOut),
                },
                None => request.await,
            };
            Completion { sequence: ticket.sequence, outcome }
        }
    }

    /// `Loading → Success | Failed`. Returns `false`, changing nothing, when
    /// the completion belongs to a superseded request.
    pub fn settle(&mut self, completion: Completion) -> bool {
        if self.outstanding != Some(completion.sequence) {
            debug!(
                sequence = completion.sequence,
                outstanding = ?self.outstanding,
                "Discarding stale search response"
            );
            return false;
        }

        let query = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Loading { query } => query,
            other => {
                warn!(state = other.name(), "Outstanding sequence without a loading state");
                self.state = other;
                self.outstanding = None;
                return false;
            }
        };
        self.outstanding = None;

        let outcome = completion
            .outcome
            .map_err(ExecuteError::classify)
            .and_then(|body| normalise::normalize_with(body, self.settings.undecodable_results));

        self.state = match outcome {
            Ok(results) => {
                info!(
                    sequence = completion.sequence,
                    matches = results.matches.len(),
                    unstructured = results.unstructured,
                    "Search succeeded"
                );
                SessionState::Success { query, results }
            }
            Err(error) => {
                warn!(
                    sequence = completion.sequence,
                    kind = error.kind().as_str(),
                    error = %error,
                    "Search failed"
                );
                SessionState::Failed { query, error }
            }
        };
        true
    }

    /// Tears down the in-flight search: `Loading → Idle`. Its response, if
    /// it ever arrives, is discarded by `settle`.
    pub fn abandon(&mut self) -> bool {
        let Some(sequence) = self.outstanding.take() else {
            return false;
        };
        info!(sequence, "Search abandoned");
        self.state = SessionState::Idle;
        true
    }

    /// Validate, issue and settle one search.
    pub async fn submit(&mut self, query: SearchQuery) -> Result<&SessionState, SubmitError> {
        let ticket = self.begin(query)?;
        let completion = self.dispatch(ticket).await;
        self.settle(completion);
        Ok(&self.state)
    }
}

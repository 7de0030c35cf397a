//! Data-file registry.
//!
//! Fetches the list of input files the backend can search, caches it for the
//! life of the session and tracks the user's selection. The list is fetched
//! once; only `refresh` re-fetches. A failed fetch keeps the last good list
//! available as stale data.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use phytodiscover_common::{BackendClient, ClassifiedError, ValidationError};

use crate::executor::ExecuteError;

/// Where the file list comes from.
#[async_trait]
pub trait DataFileSource: Send + Sync {
    async fn fetch_files(&self) -> Result<Vec<String>, ClassifiedError>;
}

/// `GET /api/data-files` → `{"files": ["...", ...]}`
pub struct HttpDataFileSource {
    client: BackendClient,
    path: String,
}

impl HttpDataFileSource {
    pub fn new(client: BackendClient, path: impl Into<String>) -> Self {
        Self { client, path: path.into() }
    }
}

#[derive(Debug, Deserialize)]
struct FilesBody {
    files: Vec<Value>,
}

/// Keeps non-blank string entries in order, without duplicates.
fn parse_files(body: &str) -> Result<Vec<String>, ClassifiedError> {
    let parsed: FilesBody =
        serde_json::from_str(body).map_err(|_| ClassifiedError::malformed(body))?;

    let mut files: Vec<String> = Vec::with_capacity(parsed.files.len());
    for entry in parsed.files {
        match entry {
            Value::String(name) => {
                let name = name.trim();
                if !name.is_empty() && !files.iter().any(|f| f == name) {
                    files.push(name.to_string());
                }
            }
            other => warn!(entry = %other, "Ignoring non-string data file entry"),
        }
    }
    Ok(files)
}

#[async_trait]
impl DataFileSource for HttpDataFileSource {
    #[instrument(skip(self))]
    async fn fetch_files(&self) -> Result<Vec<String>, ClassifiedError> {
        let request = self
            .client
            .get(&self.path)
            .map_err(|e| ClassifiedError::Network { cause: e.to_string() })?;
        let resp = request
            .send()
            .await
            .map_err(|e| ExecuteError::from_reqwest(e).classify())?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ExecuteError::from_reqwest(e).classify())?;
        if !status.is_success() {
            return Err(ExecuteError::Http { status: status.as_u16(), body }.classify());
        }
        parse_files(&body)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryState {
    Uninitialized,
    /// A fetch is in progress; `previous` is the list held before it started.
    Loading { previous: Option<Vec<String>> },
    Ready { files: Vec<String>, default: Option<String> },
    /// `stale` is the last good list, if one was ever fetched.
    Failed { error: ClassifiedError, stale: Option<Vec<String>> },
}

pub struct DataFileRegistry {
    source: Arc<dyn DataFileSource>,
    state: RegistryState,
    selected: Option<String>,
}

impl DataFileRegistry {
    pub fn new(source: Arc<dyn DataFileSource>) -> Self {
        Self {
            source,
            state: RegistryState::Uninitialized,
            selected: None,
        }
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    /// Current list: fresh when `Ready`, otherwise the last good one (or empty).
    pub fn files(&self) -> &[String] {
        match &self.state {
            RegistryState::Ready { files, .. } => files,
            RegistryState::Loading { previous: Some(files) } => files,
            RegistryState::Failed { stale: Some(files), .. } => files,
            _ => &[],
        }
    }

    /// Whether any list, fresh or stale, is held.
    pub fn has_list(&self) -> bool {
        matches!(
            self.state,
            RegistryState::Ready { .. }
                | RegistryState::Loading { previous: Some(_) }
                | RegistryState::Failed { stale: Some(_), .. }
        )
    }

    /// True when the held list survived a failed fetch.
    pub fn is_stale(&self) -> bool {
        matches!(self.state, RegistryState::Failed { stale: Some(_), .. })
    }

    pub fn contains(&self, file: &str) -> bool {
        self.files().iter().any(|f| f == file)
    }

    pub fn default_file(&self) -> Option<&str> {
        match &self.state {
            RegistryState::Ready { default, .. } => default.as_deref(),
            _ => self.files().first().map(String::as_str),
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Selects a file. When a list is held the file must be on it.
    pub fn select(&mut self, file: impl Into<String>) -> Result<(), ValidationError> {
        let file = file.into();
        if self.has_list() && !self.contains(&file) {
            return Err(ValidationError::UnknownDataFile { file });
        }
        self.selected = Some(file);
        Ok(())
    }

    /// Fetches the list unless it is already `Ready`.
    pub async fn load(&mut self) -> &RegistryState {
        if matches!(self.state, RegistryState::Ready { .. }) {
            return &self.state;
        }
        self.fetch().await
    }

    /// Fetches the list even when one is cached.
    pub async fn refresh(&mut self) -> &RegistryState {
        self.fetch().await
    }

    async fn fetch(&mut self) -> &RegistryState {
        let previous = match std::mem::replace(&mut self.state, RegistryState::Uninitialized) {
            RegistryState::Ready { files, .. } => Some(files),
            RegistryState::Loading { previous } => previous,
            RegistryState::Failed { stale, .. } => stale,
            RegistryState::Uninitialized => None,
        };
        self.state = RegistryState::Loading { previous: previous.clone() };

        self.state = match self.source.fetch_files().await {
            Ok(files) => {
                info!(count = files.len(), "Data file list loaded");
                if self.selected.is_none() {
                    self.selected = files.first().cloned();
                }
                let default = files.first().cloned();
                RegistryState::Ready { files, default }
            }
            Err(error) => {
                warn!(error = %error, stale = previous.is_some(), "Data file list fetch failed");
                RegistryState::Failed { error, stale: previous }
            }
        };
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned fetch outcomes in order and counts calls.
    struct ScriptedSource {
        replies: Mutex<VecDeque<Result<Vec<String>, ClassifiedError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<Vec<String>, ClassifiedError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl DataFileSource for ScriptedSource {
        async fn fetch_files(&self) -> Result<Vec<String>, ClassifiedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClassifiedError::Network { cause: "script exhausted".into() }))
        }
    }

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn offline() -> ClassifiedError {
        ClassifiedError::Network { cause: "connection refused".into() }
    }

    #[test]
    fn test_load_selects_first_file() {
        let source = ScriptedSource::new(vec![Ok(files(&["data/example_data.mzML", "data/synthetic_data.mzML"]))]);
        let mut registry = DataFileRegistry::new(source);

        tokio_test::block_on(registry.load());

        assert_eq!(registry.selected(), Some("data/example_data.mzML"));
        assert_eq!(registry.default_file(), Some("data/example_data.mzML"));
        assert_eq!(registry.files().len(), 2);
    }

    #[test]
    fn test_load_is_idempotent_when_ready() {
        let source = ScriptedSource::new(vec![Ok(files(&["a.mzML"])), Ok(files(&["b.mzML"]))]);
        let mut registry = DataFileRegistry::new(source.clone());

        tokio_test::block_on(async {
            registry.load().await;
            registry.load().await;
        });
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.files(), &files(&["a.mzML"])[..]);

        tokio_test::block_on(registry.refresh());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.files(), &files(&["b.mzML"])[..]);
    }

    #[test]
    fn test_failure_keeps_stale_list() {
        let source = ScriptedSource::new(vec![Ok(files(&["a.mzML", "b.mzML"])), Err(offline())]);
        let mut registry = DataFileRegistry::new(source);

        tokio_test::block_on(async {
            registry.load().await;
            registry.refresh().await;
        });

        assert!(registry.is_stale());
        assert!(matches!(registry.state(), RegistryState::Failed { error, .. } if *error == offline()));
        assert_eq!(registry.files(), &files(&["a.mzML", "b.mzML"])[..]);
        assert_eq!(registry.selected(), Some("a.mzML"));
    }

    #[test]
    fn test_failed_registry_retries_on_load() {
        let source = ScriptedSource::new(vec![Err(offline()), Ok(files(&["a.mzML"]))]);
        let mut registry = DataFileRegistry::new(source);

        tokio_test::block_on(registry.load());
        assert!(!registry.has_list());
        assert!(registry.files().is_empty());

        tokio_test::block_on(registry.load());
        assert!(matches!(registry.state(), RegistryState::Ready { .. }));
    }

    #[test]
    fn test_refresh_keeps_existing_selection() {
        let source = ScriptedSource::new(vec![
            Ok(files(&["a.mzML", "b.mzML"])),
            Ok(files(&["c.mzML", "b.mzML"])),
            Ok(files(&["c.mzML"])),
        ]);
        let mut registry = DataFileRegistry::new(source);

        tokio_test::block_on(registry.load());
        registry.select("b.mzML").unwrap();

        tokio_test::block_on(registry.refresh());
        assert_eq!(registry.selected(), Some("b.mzML"));

        // no longer listed; left for validation to reject
        tokio_test::block_on(registry.refresh());
        assert_eq!(registry.selected(), Some("b.mzML"));
        assert!(!registry.contains("b.mzML"));
        assert_eq!(registry.default_file(), Some("c.mzML"));
    }

    #[test]
    fn test_free_form_selection_survives_load() {
        let source = ScriptedSource::new(vec![Ok(files(&["a.mzML"]))]);
        let mut registry = DataFileRegistry::new(source);

        registry.select("/abs/path/run42.mzML").unwrap();

        tokio_test::block_on(registry.load());
        assert_eq!(registry.selected(), Some("/abs/path/run42.mzML"));
        assert_eq!(registry.default_file(), Some("a.mzML"));
        assert_eq!(
            registry.select("z.mzML"),
            Err(ValidationError::UnknownDataFile { file: "z.mzML".into() })
        );
    }

    #[test]
    fn test_parse_files_body() {
        let parsed = parse_files(r#"{"files": ["a.mzML", " ", 3, "b.mzML", "a.mzML"]}"#).unwrap();
        assert_eq!(parsed, files(&["a.mzML", "b.mzML"]));

        assert!(matches!(
            parse_files(r#"{"data": []}"#),
            Err(ClassifiedError::MalformedPayload { .. })
        ));
        assert_eq!(parse_files(r#"{"files": []}"#).unwrap(), Vec::<String>::new());
    }
}

//! Configuration loading for PhytoDiscover.
//! Reads phytodiscover.toml from the current directory or the path in the
//! PHYTODISCOVER_CONFIG env var. A missing file means built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use phytodiscover_common::AnalysisModule;

pub const CONFIG_ENV_VAR: &str = "PHYTODISCOVER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "phytodiscover.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
}

// ── [backend] ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Unset means searches wait for the backend indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url()        -> String { "http://localhost:8001".to_string() }
fn default_connect_timeout() -> u64    { 10 }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

// ── [search] ─────────────────────────────────────────────────────────────────

/// How a search is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStyle {
    /// `POST <path>` with `{module, compound_name, mzml_file?}`.
    JsonPost,
    /// `GET <path>?compound_name=&file_path=&db_name=`.
    QueryString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFilePolicy {
    Required,
    Optional,
}

/// What to do with a `results` string that is not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndecodablePolicy {
    /// Keep the text verbatim as an unstructured result.
    #[default]
    Preserve,
    /// Fail the search with a malformed-payload error.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_style")]
    pub style: SearchStyle,
    #[serde(default = "default_search_path")]
    pub path: String,
    #[serde(default = "default_data_file_policy")]
    pub data_file: DataFilePolicy,
    /// Only accept data files the registry currently lists.
    #[serde(default = "bool_true")]
    pub restrict_to_registry: bool,
    #[serde(default)]
    pub undecodable_results: UndecodablePolicy,
}

fn default_style()            -> SearchStyle    { SearchStyle::JsonPost }
fn default_search_path()      -> String         { "/search".to_string() }
fn default_data_file_policy() -> DataFilePolicy { DataFilePolicy::Optional }
fn bool_true()                -> bool           { true }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            style: default_style(),
            path: default_search_path(),
            data_file: default_data_file_policy(),
            restrict_to_registry: bool_true(),
            undecodable_results: UndecodablePolicy::default(),
        }
    }
}

// ── [registry] ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

fn default_registry_path() -> String { "/api/data-files".to_string() }

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { path: default_registry_path(), enabled: bool_true() }
    }
}

// ── [modules] ────────────────────────────────────────────────────────────────

/// Per-module settings: the library database name sent as `db_name` by
/// query-string searches, and optional overrides of `[search].data_file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default = "default_clinical_db")]
    pub clinical_diagnostics_db: String,
    #[serde(default = "default_food_db")]
    pub food_safety_db: String,
    #[serde(default = "default_forensic_db")]
    pub forensic_toxicology_db: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_diagnostics_data_file: Option<DataFilePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_safety_data_file: Option<DataFilePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forensic_toxicology_data_file: Option<DataFilePolicy>,
}

fn default_clinical_db() -> String { "clinical_diagnostics.db".to_string() }
fn default_food_db()     -> String { "food_safety.db".to_string() }
fn default_forensic_db() -> String { "forensic_toxicology.db".to_string() }

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            clinical_diagnostics_db: default_clinical_db(),
            food_safety_db: default_food_db(),
            forensic_toxicology_db: default_forensic_db(),
            clinical_diagnostics_data_file: None,
            food_safety_data_file: None,
            forensic_toxicology_data_file: None,
        }
    }
}

impl ModulesConfig {
    pub fn db_name(&self, module: AnalysisModule) -> &str {
        match module {
            AnalysisModule::ClinicalDiagnostics => &self.clinical_diagnostics_db,
            AnalysisModule::FoodSafety          => &self.food_safety_db,
            AnalysisModule::ForensicToxicology  => &self.forensic_toxicology_db,
        }
    }

    /// Module-specific data file policy, if one is configured.
    pub fn data_file_override(&self, module: AnalysisModule) -> Option<DataFilePolicy> {
        match module {
            AnalysisModule::ClinicalDiagnostics => self.clinical_diagnostics_data_file,
            AnalysisModule::FoodSafety          => self.food_safety_data_file,
            AnalysisModule::ForensicToxicology  => self.forensic_toxicology_data_file,
        }
    }
}


impl Config {
    /// Load configuration from phytodiscover.toml.
    /// Checks PHYTODISCOVER_CONFIG env var first, then current directory.
    /// A missing file means built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let path = Path::new(&path);
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Config::default());
        }
        Self::load_from(path)
    }

    /// Load an explicitly named file. Unlike `load`, a missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Effective data file policy for `module`.
    pub fn data_file_policy(&self, module: AnalysisModule) -> DataFilePolicy {
        self.modules.data_file_override(module).unwrap_or(self.search.data_file)
    }
}

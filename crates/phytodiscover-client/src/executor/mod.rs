//! Search executors.
//!
//! The session controller never builds requests itself: it hands each query
//! to a `SearchExecutor`, so the route/method pairing stays configuration.

pub mod http;

pub use http::HttpSearchExecutor;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use phytodiscover_common::{ClassifiedError, SearchQuery};

/// Why an executor produced no usable body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    /// The backend answered with a non-2xx status.
    #[error("backend answered with status {status}")]
    Http { status: u16, body: String },

    /// No response was received.
    #[error("transport failure: {0}")]
    Network(String),

    #[error("request timed out")]
    TimedOut,
}

impl ExecuteError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExecuteError::TimedOut
        } else {
            ExecuteError::Network(err.to_string())
        }
    }

    /// Maps the failure onto the user-facing taxonomy. HTTP failures carry
    /// the body's `detail` text when the backend supplied one.
    pub fn classify(self) -> ClassifiedError {
        match self {
            ExecuteError::Http { status, body } => ClassifiedError::Http {
                status,
                detail: extract_detail(&body),
            },
            ExecuteError::Network(cause) => ClassifiedError::Network { cause },
            ExecuteError::TimedOut => ClassifiedError::Network {
                cause: "request timed out".to_string(),
            },
        }
    }
}

/// `detail` of an error body. Structured details (FastAPI validation lists)
/// are rendered as compact JSON.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Common interface for every way of putting a search on the wire.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Run one search and return the raw 2xx body.
    async fn execute(&self, query: &SearchQuery) -> Result<String, ExecuteError>;
}

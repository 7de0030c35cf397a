use serde::Serialize;
use thiserror::Error;

use crate::models::AnalysisModule;

/// Longest slice of an unreadable body kept on a `MalformedPayload` error.
pub const EXCERPT_LIMIT: usize = 512;

/// Infrastructure errors: client construction, URLs, configuration.
#[derive(Debug, Error)]
pub enum PhytoError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unknown analysis module: {0}")]
    UnknownModule(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PhytoError>;

// ── Search failure taxonomy ──────────────────────────────────────────────────

/// Local input problems. Never sent to the backend; blocks submission.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("compound name must not be empty")]
    EmptyCompoundName,

    #[error("{module} searches require a data file")]
    MissingDataFile { module: AnalysisModule },

    #[error("data file '{file}' is not offered by the backend")]
    UnknownDataFile { file: String },
}

/// Coarse classification used by presentation to pick an affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Http,
    BackendReported,
    MalformedPayload,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation       => "validation",
            ErrorKind::Network          => "network",
            ErrorKind::Http             => "http",
            ErrorKind::BackendReported  => "backend_reported",
            ErrorKind::MalformedPayload => "malformed_payload",
        }
    }
}

/// A search failure with its classification preserved end to end.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ClassifiedError {
    #[error(transparent)]
    Validation(ValidationError),

    /// No response was received at all.
    #[error("could not reach the search backend: {cause}")]
    Network { cause: String },

    #[error("{}", http_message(.status, .detail))]
    Http { status: u16, detail: Option<String> },

    /// 2xx response whose body carries an `error` field.
    #[error("backend reported an error: {0}")]
    BackendReported(String),

    #[error("backend returned an unreadable payload: {excerpt}")]
    MalformedPayload { excerpt: String },
}

fn http_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) => detail.clone(),
        None => format!("request failed with status {}", status),
    }
}

impl ClassifiedError {
    /// Build a malformed-payload error, keeping at most `EXCERPT_LIMIT` bytes
    /// of the raw body (cut on a char boundary).
    pub fn malformed(raw: &str) -> Self {
        Self::MalformedPayload { excerpt: excerpt(raw) }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifiedError::Validation(_)           => ErrorKind::Validation,
            ClassifiedError::Network { .. }          => ErrorKind::Network,
            ClassifiedError::Http { .. }             => ErrorKind::Http,
            ClassifiedError::BackendReported(_)      => ErrorKind::BackendReported,
            ClassifiedError::MalformedPayload { .. } => ErrorKind::MalformedPayload,
        }
    }

    /// Whether resubmitting the same query could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifiedError::Network { .. } => true,
            ClassifiedError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Short hint telling the user what to do next.
    pub fn user_hint(&self) -> &'static str {
        match self {
            ClassifiedError::Validation(_) => "Fix the highlighted input and search again.",
            ClassifiedError::Network { .. } => {
                "The search backend could not be reached. Check the connection and retry."
            }
            ClassifiedError::Http { .. } if self.is_retryable() => {
                "The search backend failed to answer. Retrying may help."
            }
            ClassifiedError::Http { .. } => "The search backend rejected the request.",
            ClassifiedError::BackendReported(_) => {
                "The search ran but the backend could not complete it."
            }
            ClassifiedError::MalformedPayload { .. } => {
                "The backend answered in a format this client does not understand."
            }
        }
    }
}

impl From<ValidationError> for ClassifiedError {
    fn from(err: ValidationError) -> Self {
        ClassifiedError::Validation(err)
    }
}

fn excerpt(raw: &str) -> String {
    if raw.len() <= EXCERPT_LIMIT {
        return raw.to_string();
    }
    let mut end = EXCERPT_LIMIT;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &raw[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_message_prefers_detail() {
        let with_detail = ClassifiedError::Http { status: 404, detail: Some("Compound not found".into()) };
        assert_eq!(with_detail.to_string(), "Compound not found");

        let bare = ClassifiedError::Http { status: 502, detail: None };
        assert_eq!(bare.to_string(), "request failed with status 502");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClassifiedError::Network { cause: "refused".into() }.is_retryable());
        assert!(ClassifiedError::Http { status: 503, detail: None }.is_retryable());
        assert!(!ClassifiedError::Http { status: 422, detail: None }.is_retryable());
        assert!(!ClassifiedError::BackendReported("no spectra".into()).is_retryable());
        assert!(!ClassifiedError::from(ValidationError::EmptyCompoundName).is_retryable());
    }

    #[test]
    fn test_excerpt_cuts_on_char_boundary() {
        let raw = "é".repeat(EXCERPT_LIMIT);
        let err = ClassifiedError::malformed(&raw);
        let ClassifiedError::MalformedPayload { excerpt } = err else {
            panic!("expected malformed payload");
        };
        assert!(excerpt.ends_with('…'));
        assert!(excerpt.len() <= EXCERPT_LIMIT + '…'.len_utf8());
    }

    #[test]
    fn test_short_excerpt_kept_verbatim() {
        let err = ClassifiedError::malformed("<html>Bad Gateway</html>");
        assert_eq!(
            err,
            ClassifiedError::MalformedPayload { excerpt: "<html>Bad Gateway</html>".into() }
        );
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn test_serialized_kind_tag() {
        let err = ClassifiedError::Network { cause: "connection refused".into() };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "network");
        assert_eq!(json["detail"]["cause"], "connection refused");
    }
}

//! phytodiscover-common: Shared types, errors, and the backend HTTP client
//! used across all PhytoDiscover crates.

pub mod error;
pub mod http;
pub mod models;

// Re-export commonly used types
pub use error::{ClassifiedError, ErrorKind, PhytoError, ValidationError};
pub use http::BackendClient;
pub use models::{
    AnalysisModule, CanonicalResult, PayloadShape, RawTextResult, ResultSet, SearchQuery,
};

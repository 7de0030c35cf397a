//! Search domain types: the submitted query and the canonical result model
//! every backend payload shape is normalised into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PhytoError;

// ---------------------------------------------------------------------------
// Analysis module
// ---------------------------------------------------------------------------

/// Spectral library the backend searches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisModule {
    ClinicalDiagnostics,
    FoodSafety,
    ForensicToxicology,
}

impl AnalysisModule {
    pub const ALL: [AnalysisModule; 3] = [
        AnalysisModule::ClinicalDiagnostics,
        AnalysisModule::FoodSafety,
        AnalysisModule::ForensicToxicology,
    ];

    /// Name sent as `module` in JSON search bodies.
    pub fn display_name(&self) -> &'static str {
        match self {
            AnalysisModule::ClinicalDiagnostics => "Clinical Diagnostics",
            AnalysisModule::FoodSafety          => "Food Safety",
            AnalysisModule::ForensicToxicology  => "Forensic Toxicology",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            AnalysisModule::ClinicalDiagnostics => "clinical-diagnostics",
            AnalysisModule::FoodSafety          => "food-safety",
            AnalysisModule::ForensicToxicology  => "forensic-toxicology",
        }
    }
}

impl fmt::Display for AnalysisModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AnalysisModule {
    type Err = PhytoError;

    /// Accepts the slug, the snake_case name or the display name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', ' '], "-");
        AnalysisModule::ALL
            .into_iter()
            .find(|m| m.slug() == wanted)
            .ok_or_else(|| PhytoError::UnknownModule(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Search query
// ---------------------------------------------------------------------------

/// Parameters of one submission. Fields are private: a query is never
/// mutated after construction, a new one is built per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    module: AnalysisModule,
    compound_name: String,
    data_file: Option<String>,
}

impl SearchQuery {
    /// Trims the compound name and data file; a blank data file becomes `None`.
    /// Emptiness of the compound name is checked by the session controller.
    pub fn new(
        module: AnalysisModule,
        compound_name: impl Into<String>,
        data_file: Option<String>,
    ) -> Self {
        let compound_name = compound_name.into().trim().to_string();
        let data_file = data_file
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        Self { module, compound_name, data_file }
    }

    pub fn module(&self) -> AnalysisModule { self.module }
    pub fn compound_name(&self) -> &str { &self.compound_name }
    pub fn data_file(&self) -> Option<&str> { self.data_file.as_deref() }
}

// ---------------------------------------------------------------------------
// Canonical result
// ---------------------------------------------------------------------------

/// One ranked spectral match, independent of the backend payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResult {
    /// Backend identifier, or `#<rank>` when the backend sent none.
    pub match_id: String,
    pub compound_name: String,
    pub query_id: Option<String>,
    /// Precursor m/z of the query spectrum.
    pub query_mz: Option<f64>,
    /// m/z of the matched library entry.
    pub match_mz: Option<f64>,
    pub score: f64,
    /// Set when `score` falls outside `[0, 1]`. The score itself is kept as sent.
    pub score_out_of_range: bool,
}

impl CanonicalResult {
    pub fn new(match_id: impl Into<String>, compound_name: impl Into<String>, score: f64) -> Self {
        Self {
            match_id: match_id.into(),
            compound_name: compound_name.into(),
            query_id: None,
            query_mz: None,
            match_mz: None,
            score,
            score_out_of_range: !(0.0..=1.0).contains(&score),
        }
    }
}

/// Backend text that could not be decoded into structured matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTextResult {
    pub text: String,
}

/// Which branch of the normalisation fallback chain matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// `{"results": [...]}`
    ResultList,
    /// `[...]` at the top level.
    BareList,
    /// `{"query": {...}, "matches": [...]}`
    QueryMatches,
    /// `{"results": "<json text>"}` decoded once.
    DoubleEncoded,
    /// `{"results": "<text>"}` kept verbatim.
    OpaqueText,
    /// `{"results": null}`
    NullResults,
}

impl PayloadShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadShape::ResultList    => "result_list",
            PayloadShape::BareList      => "bare_list",
            PayloadShape::QueryMatches  => "query_matches",
            PayloadShape::DoubleEncoded => "double_encoded",
            PayloadShape::OpaqueText    => "opaque_text",
            PayloadShape::NullResults   => "null_results",
        }
    }
}

/// Normalised outcome of a successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub shape: PayloadShape,
    /// In backend order. Never re-sorted.
    pub matches: Vec<CanonicalResult>,
    /// Present exactly when `unstructured` is set.
    pub raw_text: Option<RawTextResult>,
    pub unstructured: bool,
    /// Records discarded for missing `compoundName` or `score`.
    pub dropped: usize,
    /// Compound echoed back in a `query` block, if any.
    pub query_compound: Option<String>,
}

impl ResultSet {
    pub fn structured(shape: PayloadShape, matches: Vec<CanonicalResult>, dropped: usize) -> Self {
        Self {
            shape,
            matches,
            raw_text: None,
            unstructured: false,
            dropped,
            query_compound: None,
        }
    }

    pub fn unstructured(text: impl Into<String>) -> Self {
        Self {
            shape: PayloadShape::OpaqueText,
            matches: Vec::new(),
            raw_text: Some(RawTextResult { text: text.into() }),
            unstructured: true,
            dropped: 0,
            query_compound: None,
        }
    }

    /// Number of result-bearing entries: matches, or the single raw text.
    pub fn len(&self) -> usize {
        if self.unstructured { 1 } else { self.matches.len() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn out_of_range_count(&self) -> usize {
        self.matches.iter().filter(|m| m.score_out_of_range).count()
    }
}

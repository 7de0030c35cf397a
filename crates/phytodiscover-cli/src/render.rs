//! Plain-text rendering of session and registry state.

use std::fmt::Write;

use phytodiscover_client::{DataFileRegistry, RegistryState, SessionState, SubmitError};
use phytodiscover_common::{CanonicalResult, ClassifiedError, ResultSet};

fn mz(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}

fn row(r: &CanonicalResult) -> String {
    let flag = if r.score_out_of_range { " (!)" } else { "" };
    format!(
        "{:<12} {:<32} {:>10} {:>10} {:>8.4}{}",
        r.match_id,
        r.compound_name,
        mz(r.query_mz),
        mz(r.match_mz),
        r.score,
        flag,
    )
}

fn results(out: &mut String, set: &ResultSet) {
    if let Some(raw) = &set.raw_text {
        let _ = writeln!(out, "Backend returned unstructured text:");
        let _ = writeln!(out, "{}", raw.text);
        return;
    }
    if set.matches.is_empty() {
        let _ = writeln!(out, "No matches.");
    } else {
        let _ = writeln!(
            out,
            "{:<12} {:<32} {:>10} {:>10} {:>8}",
            "MATCH", "COMPOUND", "QUERY M/Z", "MATCH M/Z", "SCORE"
        );
        for r in &set.matches {
            let _ = writeln!(out, "{}", row(r));
        }
    }
    if set.out_of_range_count() > 0 {
        let _ = writeln!(out, "(!) score outside [0, 1], shown as sent by the backend");
    }
    if set.dropped > 0 {
        let _ = writeln!(out, "{} incomplete record(s) skipped", set.dropped);
    }
}

fn failure(out: &mut String, error: &ClassifiedError) {
    let _ = writeln!(out, "Error [{}]: {}", error.kind().as_str(), error);
    let _ = writeln!(out, "{}", error.user_hint());
}

pub fn session(state: &SessionState) -> String {
    let mut out = String::new();
    match state {
        SessionState::Idle => out.push_str("No search submitted.\n"),
        SessionState::Loading { query } => {
            let _ = writeln!(out, "Searching for {}...", query.compound_name());
        }
        SessionState::Success { query, results: set } => {
            let _ = writeln!(
                out,
                "{} in {} ({})",
                query.compound_name(),
                query.data_file().unwrap_or("default data file"),
                query.module()
            );
            results(&mut out, set);
        }
        SessionState::Failed { error, .. } => failure(&mut out, error),
    }
    out
}

/// A submission the session refused before anything was sent.
pub fn rejected(err: &SubmitError) -> String {
    let mut out = String::new();
    match err {
        SubmitError::Invalid(invalid) => failure(&mut out, &ClassifiedError::from(invalid.clone())),
        SubmitError::InFlight { .. } => {
            let _ = writeln!(out, "Search not sent: {}", err);
        }
    }
    out
}

pub fn registry(registry: &DataFileRegistry) -> String {
    let mut out = String::new();
    if let RegistryState::Failed { error, .. } = registry.state() {
        failure(&mut out, error);
        if registry.is_stale() {
            let _ = writeln!(out, "Showing the last known list:");
        }
    }
    for file in registry.files() {
        let marker = if Some(file.as_str()) == registry.selected() { "*" } else { " " };
        let _ = writeln!(out, "{} {}", marker, file);
    }
    if registry.files().is_empty() && !matches!(registry.state(), RegistryState::Failed { .. }) {
        out.push_str("No data files available.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use phytodiscover_common::{AnalysisModule, PayloadShape, SearchQuery, ValidationError};

    fn query() -> SearchQuery {
        SearchQuery::new(AnalysisModule::FoodSafety, "Chlorpyrifos", Some("data/synthetic_data.mzML".into()))
    }

    #[test]
    fn test_success_table_flags_out_of_range() {
        let mut hit = CanonicalResult::new("m1", "Chlorpyrifos", 1.2);
        hit.match_mz = Some(349.9336);
        let state = SessionState::Success {
            query: query(),
            results: ResultSet::structured(PayloadShape::ResultList, vec![hit], 1),
        };
        let text = session(&state);
        assert!(text.contains("349.9336"));
        assert!(text.contains("1.2000 (!)"));
        assert!(text.contains("1 incomplete record(s) skipped"));
    }

    #[test]
    fn test_failure_shows_kind_and_hint() {
        let state = SessionState::Failed {
            query: query(),
            error: ClassifiedError::Network { cause: "connection refused".into() },
        };
        let text = session(&state);
        assert!(text.starts_with("Error [network]: could not reach the search backend"));
        assert!(text.contains("retry"));
    }

    #[test]
    fn test_rejected_submission_shows_fix_input_hint() {
        let text = rejected(&SubmitError::Invalid(ValidationError::EmptyCompoundName));
        assert!(text.starts_with("Error [validation]: compound name must not be empty\n"));
        assert!(text.contains(ClassifiedError::from(ValidationError::EmptyCompoundName).user_hint()));
    }

    #[test]
    fn test_unstructured_text_printed_verbatim() {
        let state = SessionState::Success {
            query: query(),
            results: ResultSet::unstructured("Top hit: Chlorpyrifos 0.88"),
        };
        assert!(session(&state).contains("Top hit: Chlorpyrifos 0.88\n"));
    }
}

//! Response normalisation.
//!
//! Maps whatever body the search backend returned onto a `ResultSet` or a
//! `ClassifiedError`. Payload shapes are tried as an ordered fallback chain:
//!
//! 1. `error` field present      → backend-reported error (beats any matches)
//! 2. top-level array / `results` array → structured list
//! 3. `query` + `matches`         → structured list with query context
//! 4. `results` string            → decoded once as JSON, else opaque text
//! 5. anything else               → malformed payload
//!
//! `normalize` never panics: every byte sequence yields one of the two outcomes.

pub mod fields;

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use phytodiscover_common::{ClassifiedError, PayloadShape, ResultSet};
use phytodiscover_config::UndecodablePolicy;

use fields::QueryContext;

/// Recognised top-level payload layouts.
#[derive(Debug, Clone, PartialEq)]
enum Payload<'a> {
    BackendError(String),
    ResultList(&'a [Value]),
    BareList(&'a [Value]),
    QueryMatches { query: Option<&'a Value>, matches: &'a [Value] },
    Text(&'a str),
    NullResults,
    Unrecognised,
}

fn classify(value: &Value) -> Payload<'_> {
    let obj = match value {
        Value::Array(items) => return Payload::BareList(items),
        Value::Object(obj) => obj,
        _ => return Payload::Unrecognised,
    };

    match obj.get("error") {
        None | Some(Value::Null) => {}
        Some(Value::String(msg)) => return Payload::BackendError(msg.clone()),
        Some(other) => return Payload::BackendError(other.to_string()),
    }

    match (obj.get("results"), obj.get("matches")) {
        (Some(Value::Array(items)), _) => Payload::ResultList(items),
        (_, Some(Value::Array(matches))) => Payload::QueryMatches {
            query: obj.get("query"),
            matches,
        },
        (Some(Value::String(text)), _) => Payload::Text(text),
        (Some(Value::Null), _) => Payload::NullResults,
        _ => Payload::Unrecognised,
    }
}

/// Normalise with the default policy (undecodable `results` text is kept).
pub fn normalize(raw: impl AsRef<[u8]>) -> Result<ResultSet, ClassifiedError> {
    normalize_with(raw, UndecodablePolicy::default())
}

pub fn normalize_with(
    raw: impl AsRef<[u8]>,
    policy: UndecodablePolicy,
) -> Result<ResultSet, ClassifiedError> {
    let body = String::from_utf8_lossy(raw.as_ref());
    let value: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Response body is not JSON");
            return Err(ClassifiedError::malformed(&body));
        }
    };

    let set = match classify(&value) {
        Payload::Text(text) => decode_text(text, policy)?,
        payload => structured(payload, &body)?,
    };

    if set.dropped > 0 {
        warn!(dropped = set.dropped, shape = set.shape.as_str(), "Dropped result records missing a compound name or score");
    }
    let out_of_range = set.out_of_range_count();
    if out_of_range > 0 {
        warn!(count = out_of_range, "Similarity scores outside [0, 1]");
    }
    debug!(shape = set.shape.as_str(), entries = set.len(), "Normalised search response");
    Ok(set)
}

/// A `results` string gets exactly one nested parse. Whatever that yields is
/// never decoded again.
fn decode_text(text: &str, policy: UndecodablePolicy) -> Result<ResultSet, ClassifiedError> {
    let inner = match serde_json::from_str::<Value>(text) {
        Ok(inner) => inner,
        Err(_) => return opaque(text, policy),
    };

    match classify(&inner) {
        Payload::Text(_) | Payload::Unrecognised => opaque(text, policy),
        payload => {
            let mut set = structured(payload, text)?;
            set.shape = PayloadShape::DoubleEncoded;
            Ok(set)
        }
    }
}

/// Text that is not a recognisable payload. Only text that looks like a
/// JSON document is subject to the reject policy; display strings are
/// always kept.
fn opaque(text: &str, policy: UndecodablePolicy) -> Result<ResultSet, ClassifiedError> {
    let trimmed = text.trim_start();
    let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');
    if looks_like_json && policy == UndecodablePolicy::Reject {
        return Err(ClassifiedError::malformed(text));
    }
    Ok(ResultSet::unstructured(text))
}

fn structured(payload: Payload<'_>, body: &str) -> Result<ResultSet, ClassifiedError> {
    match payload {
        Payload::BackendError(msg) => Err(ClassifiedError::BackendReported(msg)),
        Payload::ResultList(items) => Ok(records(PayloadShape::ResultList, items, &QueryContext::default())),
        Payload::BareList(items) => Ok(records(PayloadShape::BareList, items, &QueryContext::default())),
        Payload::QueryMatches { query, matches } => {
            let ctx = QueryContext::from_value(query);
            let mut set = records(PayloadShape::QueryMatches, matches, &ctx);
            set.query_compound = ctx.compound_name;
            Ok(set)
        }
        Payload::NullResults => Ok(ResultSet::structured(PayloadShape::NullResults, Vec::new(), 0)),
        Payload::Text(_) | Payload::Unrecognised => Err(ClassifiedError::malformed(body)),
    }
}

fn records(shape: PayloadShape, items: &[Value], ctx: &QueryContext) -> ResultSet {
    let mut matches = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    let mut dropped = 0;

    for (index, item) in items.iter().enumerate() {
        let resolved = item
            .as_object()
            .and_then(|obj| fields::resolve_record(obj, index, ctx));
        let Some(mut result) = resolved else {
            dropped += 1;
            continue;
        };
        // match ids stay unique within one response
        if !seen.insert(result.match_id.clone()) {
            let base = std::mem::take(&mut result.match_id);
            let mut suffix = index + 1;
            loop {
                let candidate = format!("{}#{}", base, suffix);
                if seen.insert(candidate.clone()) {
                    result.match_id = candidate;
                    break;
                }
                suffix += 1;
            }
        }
        matches.push(result);
    }

    ResultSet::structured(shape, matches, dropped)
}

//! Field-name resolution for result records.
//!
//! Each canonical attribute has an ordered alias list: the camelCase
//! canonical name first, then the backend spellings in fixed priority.
//! The first alias present with a non-null value decides the attribute,
//! so identical input always resolves identically.

use serde_json::{Map, Value};

use phytodiscover_common::CanonicalResult;

pub const MATCH_ID: &[&str]      = &["matchId", "match_id", "id"];
pub const COMPOUND_NAME: &[&str] = &["compoundName", "compound_name", "name", "match_name", "match_id"];
pub const QUERY_ID: &[&str]      = &["queryId", "query_id"];
pub const QUERY_MZ: &[&str]      = &["queryMz", "query_mz", "mz_query"];
pub const MATCH_MZ: &[&str]      = &["matchMz", "match_mz", "mz_match", "precursor_mz", "mz"];
pub const SCORE: &[&str]         = &["score", "similarity", "similarity_score"];

/// Keys read from a `query` block echoed beside a match list.
pub const ECHO_COMPOUND: &[&str] = &["compoundName", "compound_name", "name"];
pub const ECHO_MZ: &[&str]       = &["precursorMz", "precursor_mz", "mz"];

fn first_present<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// Text attribute. Numbers are accepted and rendered (backends send `"id": 1`).
pub fn text(obj: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    match first_present(obj, aliases)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numeric attribute. Numeric strings are parsed; anything unparseable or
/// non-finite counts as missing.
pub fn number(obj: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    let parsed = match first_present(obj, aliases)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Values inherited from a `query` block by every match beneath it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryContext {
    pub compound_name: Option<String>,
    pub precursor_mz: Option<f64>,
}

impl QueryContext {
    pub fn from_value(query: Option<&Value>) -> Self {
        match query.and_then(Value::as_object) {
            Some(obj) => Self {
                compound_name: text(obj, ECHO_COMPOUND),
                precursor_mz: number(obj, ECHO_MZ),
            },
            None => Self::default(),
        }
    }
}

/// Builds a canonical result, or `None` when `compoundName` or `score`
/// cannot be resolved. `index` is the record's position in the backend list.
pub fn resolve_record(
    obj: &Map<String, Value>,
    index: usize,
    ctx: &QueryContext,
) -> Option<CanonicalResult> {
    let compound_name = text(obj, COMPOUND_NAME)?;
    let score = number(obj, SCORE)?;
    let match_id = text(obj, MATCH_ID).unwrap_or_else(|| format!("#{}", index + 1));

    let mut result = CanonicalResult::new(match_id, compound_name, score);
    result.query_id = text(obj, QUERY_ID);
    result.query_mz = number(obj, QUERY_MZ).or(ctx.precursor_mz);
    result.match_mz = number(obj, MATCH_MZ);
    Some(result)
}

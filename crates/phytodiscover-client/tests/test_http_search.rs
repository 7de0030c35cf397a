//! End-to-end search sessions against a local mock backend.
//!
//! Run with: cargo test --package phytodiscover-client --test test_http_search

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use phytodiscover_client::{
    DataFileRegistry, HttpDataFileSource, HttpSearchExecutor, RegistryState, SearchSession,
    SessionSettings, SessionState,
};
use phytodiscover_common::{AnalysisModule, BackendClient, ClassifiedError, PayloadShape, SearchQuery};
use phytodiscover_config::{ModulesConfig, SearchStyle};

fn client(base_url: &str) -> BackendClient {
    BackendClient::new(base_url, Duration::from_secs(2), Some(Duration::from_secs(5)))
        .expect("client builds")
}

fn session(base_url: &str, style: SearchStyle) -> SearchSession {
    let executor = HttpSearchExecutor::new(client(base_url), style, "/search", ModulesConfig::default());
    let registry = DataFileRegistry::new(Arc::new(HttpDataFileSource::new(client(base_url), "/api/data-files")));
    SearchSession::new(Arc::new(executor), registry, SessionSettings::default())
}

#[tokio::test]
async fn test_json_post_search() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/search")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "module": "Clinical Diagnostics",
            "compound_name": "Aspirin",
            "mzml_file": "data/example_data.mzML",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"results":[{"query_id":"scan=19","match_id":"Aspirin","score":0.9312,"mz_query":181.0501,"mz_match":181.0495}]}"#)
        .create_async()
        .await;

    let mut session = session(&server.url(), SearchStyle::JsonPost);
    let query = SearchQuery::new(
        AnalysisModule::ClinicalDiagnostics,
        "Aspirin",
        Some("data/example_data.mzML".into()),
    );
    let state = session.submit(query).await.expect("submission accepted");

    let SessionState::Success { results, .. } = state else {
        panic!("expected success, got {state:?}");
    };
    assert_eq!(results.matches.len(), 1);
    assert_eq!(results.matches[0].match_id, "Aspirin");
    assert_eq!(results.matches[0].query_id.as_deref(), Some("scan=19"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_json_post_omits_absent_data_file() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/search")
        .match_body(Matcher::Json(json!({"module": "Forensic Toxicology", "compound_name": "Fentanyl"})))
        .with_status(200)
        .with_body(r#"{"results": "No library match above threshold"}"#)
        .create_async()
        .await;

    let mut session = session(&server.url(), SearchStyle::JsonPost);
    let state = session
        .submit(SearchQuery::new(AnalysisModule::ForensicToxicology, "Fentanyl", None))
        .await
        .unwrap();

    let SessionState::Success { results, .. } = state else {
        panic!("expected success, got {state:?}");
    };
    assert!(results.unstructured);
    assert_eq!(results.shape, PayloadShape::OpaqueText);
    assert_eq!(
        results.raw_text.as_ref().map(|r| r.text.as_str()),
        Some("No library match above threshold")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_query_string_search() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("compound_name".into(), "Chlorpyrifos".into()),
            Matcher::UrlEncoded("file_path".into(), "data/synthetic_data.mzML".into()),
            Matcher::UrlEncoded("db_name".into(), "food_safety.db".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "query": {"compound_name": "Chlorpyrifos", "precursor_mz": 349.9},
                "matches": [{"compound_name": "Chlorpyrifos", "precursor_mz": 349.93, "score": 0.88}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let mut session = session(&server.url(), SearchStyle::QueryString);
    let query = SearchQuery::new(
        AnalysisModule::FoodSafety,
        "Chlorpyrifos",
        Some("data/synthetic_data.mzML".into()),
    );
    let state = session.submit(query).await.unwrap();

    let SessionState::Success { results, .. } = state else {
        panic!("expected success, got {state:?}");
    };
    assert_eq!(results.shape, PayloadShape::QueryMatches);
    assert_eq!(results.matches[0].query_mz, Some(349.9));
    assert_eq!(results.matches[0].match_mz, Some(349.93));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_error_detail_surfaces() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/search")
        .with_status(500)
        .with_body(r#"{"detail":"Failed to load mzML file: truncated"}"#)
        .create_async()
        .await;

    let mut session = session(&server.url(), SearchStyle::JsonPost);
    let state = session
        .submit(SearchQuery::new(AnalysisModule::ClinicalDiagnostics, "Metformin", None))
        .await
        .unwrap();

    let SessionState::Failed { error, .. } = state else {
        panic!("expected failure, got {state:?}");
    };
    assert_eq!(
        error,
        &ClassifiedError::Http { status: 500, detail: Some("Failed to load mzML file: truncated".into()) }
    );
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let mut session = session("http://127.0.0.1:1", SearchStyle::JsonPost);
    let state = session
        .submit(SearchQuery::new(AnalysisModule::ClinicalDiagnostics, "Aspirin", None))
        .await
        .unwrap();

    let SessionState::Failed { error, .. } = state else {
        panic!("expected failure, got {state:?}");
    };
    assert!(matches!(error, ClassifiedError::Network { .. }), "got {error:?}");
}

#[tokio::test]
async fn test_registry_feeds_validation() {
    let mut server = Server::new_async().await;
    let files = server
        .mock("GET", "/api/data-files")
        .with_status(200)
        .with_body(r#"{"files": ["data/example_data.mzML", "data/synthetic_data.mzML"]}"#)
        .expect(1)
        .create_async()
        .await;

    let mut session = session(&server.url(), SearchStyle::JsonPost);
    session.registry_mut().load().await;
    session.registry_mut().load().await;

    assert_eq!(session.registry().selected(), Some("data/example_data.mzML"));
    let unlisted = SearchQuery::new(AnalysisModule::FoodSafety, "Aspirin", Some("other.mzML".into()));
    assert!(session.submit(unlisted).await.is_err());
    assert_eq!(session.state(), &SessionState::Idle);
    files.assert_async().await;
}

#[tokio::test]
async fn test_registry_http_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/data-files")
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let mut registry = DataFileRegistry::new(Arc::new(HttpDataFileSource::new(client(&server.url()), "/api/data-files")));
    let state = registry.load().await;

    assert_eq!(
        state,
        &RegistryState::Failed {
            error: ClassifiedError::Http { status: 503, detail: None },
            stale: None,
        }
    );
}

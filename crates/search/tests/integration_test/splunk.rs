//! Request/response handling of `SplunkClient` against a mock management API.

use serde_json::json;
use sli_core::TimeWindow;
use sli_search::*;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> TimeWindow {
    TimeWindow::parse("1704067200", "1704067500").unwrap()
}

fn client(server: &MockServer) -> SplunkClient {
    SplunkClient::new(reqwest::Client::new(), &SearchEndpoint::new(server.uri(), "test-token")).unwrap()
}

#[tokio::test]
async fn submit_posts_form_with_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_string_contains("search=search+index%3Dweb"))
        .and(body_string_contains("earliest_time=1704067200"))
        .and(body_string_contains("latest_time=1704067500"))
        .and(body_string_contains("output_mode=json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "1704067501.42"})))
        .expect(1)
        .mount(&server)
        .await;

    let handle = client(&server).submit("index=web | stats count", &window()).await.unwrap();
    assert_eq!(handle.sid, "1704067501.42");
}

#[tokio::test]
async fn submit_rejection_carries_splunk_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "messages": [{"type": "FATAL", "text": "Unknown search command 'statz'."}]
        })))
        .mount(&server)
        .await;

    let err = client(&server).submit("index=web | statz", &window()).await.unwrap_err();
    assert!(matches!(err, SearchError::Submission(_)));
    let msg = err.to_string();
    assert!(msg.contains("400"), "got: {msg}");
    assert!(msg.contains("statz"), "got: {msg}");
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn status_maps_dispatch_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/sid-1"))
        .and(query_param("output_mode", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": [{"name": "sid-1", "content": {"dispatchState": "FINALIZING", "isDone": false}}]
        })))
        .mount(&server)
        .await;

    let status = client(&server).status(&JobHandle::new("sid-1")).await.unwrap();
    assert_eq!(status.state, JobState::Running);
    assert!(status.message.is_none());
}

#[tokio::test]
async fn failed_job_reports_messages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/sid-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": [{"content": {
                "dispatchState": "FAILED",
                "isFailed": true,
                "messages": [{"type": "FATAL", "text": "Search quota exceeded"}]
            }}]
        })))
        .mount(&server)
        .await;

    let status = client(&server).status(&JobHandle::new("sid-2")).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.message.as_deref(), Some("Search quota exceeded"));
}

#[tokio::test]
async fn fetch_results_requests_all_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/sid-3/results"))
        .and(query_param("count", "0"))
        .and(query_param("output_mode", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fields": [{"name": "error_rate"}],
            "results": [{"error_rate": "0.5"}, {"error_rate": "0.75"}]
        })))
        .mount(&server)
        .await;

    let rows = client(&server).fetch_results(&JobHandle::new("sid-3")).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(extract_value(&rows, "error_rate").unwrap(), 0.75);
}

#[tokio::test]
async fn fetch_transport_error_is_fetch_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/sid-4/results"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_results(&JobHandle::new("sid-4")).await.unwrap_err();
    assert!(matches!(err, SearchError::Fetch { .. }));
    assert!(err.to_string().contains("service unavailable"));
}

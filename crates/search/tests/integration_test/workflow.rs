//! Full submit → poll → fetch lifecycle through `SplunkBackend`.

use std::time::Duration;

use serde_json::json;
use sli_core::TimeWindow;
use sli_search::*;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> TimeWindow {
    TimeWindow::parse("2024-01-01T00:00:00Z", "2024-01-01T00:05:00Z").unwrap()
}

fn status_body(state: &str) -> serde_json::Value {
    json!({"entry": [{"content": {"dispatchState": state}}]})
}

#[tokio::test]
async fn job_runs_to_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "job-7"})))
        .mount(&server)
        .await;

    // Two running polls, then done.
    Mock::given(method("GET"))
        .and(path("/services/search/jobs/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("RUNNING")))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("DONE")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/job-7/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{"p95": "231.5"}]})))
        .mount(&server)
        .await;

    let backend = SplunkBackend::with_client(reqwest::Client::new());
    let client = backend
        .client_for(&SearchEndpoint::new(server.uri(), "t"))
        .unwrap();

    let handle = client.submit("index=web | stats perc95(ms) as p95", &window()).await.unwrap();
    let state = client
        .await_completion(&handle, Duration::from_millis(10), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(state, JobState::Completed);

    let rows = client.fetch_results(&handle).await.unwrap();
    assert_eq!(extract_value(&rows, "p95").unwrap(), 231.5);
}

#[tokio::test]
async fn stuck_job_is_cancelled_after_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/job-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("QUEUED")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs/job-9/control"))
        .and(body_string_contains("action=cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = SplunkBackend::with_client(reqwest::Client::new());
    let client = backend
        .client_for(&SearchEndpoint::new(server.uri(), "t"))
        .unwrap();

    let err = client
        .await_completion(&JobHandle::new("job-9"), Duration::from_millis(10), Duration::from_millis(50))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("timed out"));
}

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sli_core::{CustomFilter, Verdict, FAILED_REPORT_MESSAGE};
use sli_provider::{
    CredentialError, EvaluatorSettings, GetSliHandler, MemoryCredentials, MemoryResourceStore, Scope,
};
use sli_search::{MemoryBackend, MemorySearchClient, SearchEndpoint};

use crate::{fast_settings, request, request_with, row};

fn default_endpoint() -> SearchEndpoint {
    SearchEndpoint::new("https://splunk.default:8089", "default-token")
}

fn layered_store() -> MemoryResourceStore {
    MemoryResourceStore::new()
        .with_document(
            Scope::project("sockshop"),
            r#"
spec_version: "1.0"
indicators:
  throughput: "index=$PROJECT service=$SERVICE | stats count as throughput"
  error_rate: "index=$PROJECT | stats avg(err) as error_rate"
"#,
        )
        .with_document(
            Scope::stage("sockshop", "staging"),
            r#"
indicators:
  response_time_p95: "index=$PROJECT stage=$STAGE dep=$DEPLOYMENT region=$REGION owner=$LABEL.owner span=$DURATION_SECONDS | stats perc95(rt) as response_time_p95"
"#,
        )
        .with_document(
            Scope::service("sockshop", "staging", "carts"),
            r#"
indicators:
  error_rate: "index=$PROJECT service=$SERVICE | stats avg(err) as error_rate by host"
"#,
        )
}

struct Harness {
    handler: GetSliHandler,
    client: Arc<MemorySearchClient>,
    backend: Arc<MemoryBackend>,
}

fn harness(
    store: MemoryResourceStore,
    credentials: MemoryCredentials,
    client: MemorySearchClient,
    settings: EvaluatorSettings,
) -> Harness {
    let client = Arc::new(client);
    let backend = Arc::new(MemoryBackend::new(client.clone()));
    let handler = GetSliHandler::new(
        Arc::new(store),
        Arc::new(credentials),
        backend.clone(),
        default_endpoint(),
        settings,
    );
    Harness {
        handler,
        client,
        backend,
    }
}

#[tokio::test(start_paused = true)]
async fn layered_config_renders_and_evaluates_every_indicator() {
    let client = MemorySearchClient::new()
        .with_slow_rows("as throughput", row("throughput", json!("1520")), 3)
        .with_rows("by host", row("error_rate", json!("0.02")))
        .with_rows("perc95", row("response_time_p95", json!(212.5)));
    let h = harness(layered_store(), MemoryCredentials::new(), client, fast_settings());

    let mut req = request_with(
        &["throughput", "error_rate", "response_time_p95"],
        json!({
            "labels": { "owner": "team-carts", "deployment": "canary" },
        }),
    );
    req.get_sli.custom_filters = vec![CustomFilter::new("region", "\"eu-west-1\"")];

    let report = h.handler.handle(&req).await.unwrap();

    assert_eq!(report.verdict(), Verdict::Pass);
    assert_eq!(report.status, "succeeded");
    assert!(report.message.is_none());

    let values: Vec<_> = report.results().iter().map(|r| (r.metric.as_str(), r.value)).collect();
    assert_eq!(
        values,
        vec![("throughput", 1520.0), ("error_rate", 0.02), ("response_time_p95", 212.5)]
    );

    let submitted = h.client.submitted();
    assert!(submitted.contains(
        &"index=sockshop stage=staging dep=canary region=eu-west-1 owner=team-carts span=300s | stats perc95(rt) as response_time_p95"
            .to_string()
    ));
    assert!(submitted.contains(&"index=sockshop service=carts | stats avg(err) as error_rate by host".to_string()));

    assert_eq!(h.backend.endpoints(), vec![default_endpoint()]);
}

#[tokio::test]
async fn partial_failure_is_a_warning() {
    let client = MemorySearchClient::new()
        .with_rows("as throughput", row("throughput", json!("10")))
        .rejecting("by host", "Error in 'SearchParser': unknown command");
    let h = harness(layered_store(), MemoryCredentials::new(), client, fast_settings());

    let report = h
        .handler
        .handle(&request(&["throughput", "error_rate", "apdex"]))
        .await
        .unwrap();

    assert_eq!(report.verdict(), Verdict::Warning);
    assert!(report.message.is_none());

    let results = report.results();
    assert!(results[0].success);
    assert!(results[1].message.as_deref().unwrap().starts_with("failed to create search job"));
    assert!(results[2]
        .message
        .as_deref()
        .unwrap()
        .contains("no custom query specified"));
}

#[tokio::test]
async fn all_failures_fail_the_report() {
    let client = MemorySearchClient::new().failing_fetch("index=", "connection reset");
    let h = harness(layered_store(), MemoryCredentials::new(), client, fast_settings());

    let report = h
        .handler
        .handle(&request(&["throughput", "error_rate"]))
        .await
        .unwrap();

    assert_eq!(report.verdict(), Verdict::Fail);
    assert_eq!(report.message.as_deref(), Some(FAILED_REPORT_MESSAGE));
    assert!(report.results().iter().all(|r| !r.success));
}

#[tokio::test]
async fn empty_indicator_list_passes() {
    let h = harness(
        layered_store(),
        MemoryCredentials::new(),
        MemorySearchClient::new(),
        fast_settings(),
    );

    let report = h.handler.handle(&request(&[])).await.unwrap();
    assert_eq!(report.verdict(), Verdict::Pass);
    assert!(report.results().is_empty());
}

#[tokio::test]
async fn missing_project_means_no_queries() {
    let h = harness(
        layered_store(),
        MemoryCredentials::new(),
        MemorySearchClient::new(),
        fast_settings(),
    );

    let report = h
        .handler
        .handle(&request_with(&["throughput"], json!({ "project": "" })))
        .await
        .unwrap();

    assert_eq!(report.verdict(), Verdict::Fail);
    assert!(report.results()[0]
        .message
        .as_deref()
        .unwrap()
        .contains("no custom query specified"));
    assert!(h.client.submitted().is_empty());
}

#[tokio::test]
async fn project_credentials_select_the_endpoint() {
    let project_endpoint = SearchEndpoint::new("https://splunk.sockshop:8089", "sockshop-token");
    let client = MemorySearchClient::new().with_rows("as throughput", row("throughput", json!("1")));
    let h = harness(
        layered_store(),
        MemoryCredentials::new().with_endpoint("sockshop", project_endpoint.clone()),
        client,
        fast_settings(),
    );

    h.handler.handle(&request(&["throughput"])).await.unwrap();
    assert_eq!(h.backend.endpoints(), vec![project_endpoint]);
}

#[tokio::test]
async fn credential_errors_fall_back_to_default() {
    let client = MemorySearchClient::new().with_rows("as throughput", row("throughput", json!("1")));
    let h = harness(
        layered_store(),
        MemoryCredentials::new().with_error(
            "sockshop",
            CredentialError::InvalidFormat {
                secret: "splunk-credentials-sockshop".into(),
                reason: "bad yaml".into(),
            },
        ),
        client,
        fast_settings(),
    );

    let report = h.handler.handle(&request(&["throughput"])).await.unwrap();
    assert_eq!(report.verdict(), Verdict::Pass);
    assert_eq!(h.backend.endpoints(), vec![default_endpoint()]);
}

#[tokio::test(start_paused = true)]
async fn stuck_job_is_bounded_by_the_evaluation_deadline() {
    let client = MemorySearchClient::new()
        .with_rows("as throughput", row("throughput", json!("5")))
        .stuck("by host");
    let settings = EvaluatorSettings {
        job_timeout: Duration::from_secs(3600),
        deadline: Duration::from_secs(20),
        ..fast_settings()
    };
    let h = harness(layered_store(), MemoryCredentials::new(), client, settings);

    let report = h
        .handler
        .handle(&request(&["throughput", "error_rate"]))
        .await
        .unwrap();

    assert_eq!(report.verdict(), Verdict::Warning);
    let stuck = &report.results()[1];
    assert_eq!(stuck.metric, "error_rate");
    assert!(stuck.message.as_deref().unwrap().contains("deadline"));
    assert!(stuck.message.as_deref().unwrap().contains("timed out"));
    assert_eq!(h.client.cancelled().len(), 1);
}

#[tokio::test]
async fn configuration_error_is_fatal() {
    let store = layered_store().with_failure(Scope::stage("sockshop", "staging"), "resource service unreachable");
    let h = harness(store, MemoryCredentials::new(), MemorySearchClient::new(), fast_settings());

    let err = h.handler.handle(&request(&["throughput"])).await.unwrap_err();
    assert!(err.to_string().contains("resource service unreachable"));
    assert!(h.client.submitted().is_empty());
}

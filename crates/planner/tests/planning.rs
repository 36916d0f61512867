use std::time::Duration;

use chrono::{DateTime, Utc};
use github::transport::{GraphqlClient, TransportConfig};
use github::RateCoordinator;
use planner::{RangePlanner, TimeRange};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dt(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

async fn mount_count(server: &MockServer, substring: &str, count: u64) {
    Mock::given(method("POST"))
        .and(body_string_contains(substring.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"search": {"repositoryCount": count}}
        })))
        .mount(server)
        .await;
}

fn client_and_coordinator(server: &MockServer) -> (GraphqlClient, RateCoordinator) {
    let client = GraphqlClient::new(TransportConfig {
        graphql_url: server.uri(),
        token: String::new(),
        user_agent: "github-crawl-test".into(),
        max_retries: 1,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        request_timeout: Duration::from_secs(5),
    })
    .expect("client builds");
    (client, RateCoordinator::new())
}

/// S1: initial range splits into halves then quarters; plans sum to
/// the requested target with every available_results <= search_limit.
#[tokio::test]
async fn s1_splits_until_every_plan_is_within_search_limit() {
    let server = MockServer::start().await;

    mount_count(&server, "created:>=2024-01-01T00:00:00Z created:<2024-01-05T00:00:00Z", 5_000).await;
    mount_count(&server, "created:>=2024-01-01T00:00:00Z created:<2024-01-03T00:00:00Z", 2_000).await;
    mount_count(&server, "created:>=2024-01-03T00:00:00Z created:<2024-01-05T00:00:00Z", 2_000).await;
    mount_count(&server, "created:>=2024-01-01T00:00:00Z created:<2024-01-02T00:00:00Z", 600).await;
    mount_count(&server, "created:>=2024-01-02T00:00:00Z created:<2024-01-03T00:00:00Z", 600).await;
    mount_count(&server, "created:>=2024-01-03T00:00:00Z created:<2024-01-04T00:00:00Z", 600).await;
    mount_count(&server, "created:>=2024-01-04T00:00:00Z created:<2024-01-05T00:00:00Z", 600).await;

    let (client, coordinator) = client_and_coordinator(&server);
    let planner = RangePlanner::new(&client, &coordinator, 1_000);

    let range = TimeRange::new(dt("2024-01-01T00:00:00Z"), dt("2024-01-05T00:00:00Z"));
    let plans = planner.plan(range, 2_000).await.expect("plan succeeds");

    let total: u64 = plans.iter().map(|p| p.requested_results).sum();
    assert_eq!(total, 2_000);
    assert!(plans.iter().all(|p| p.available_results <= 1_000));
}

/// S2: single range under the limit produces exactly one plan.
#[tokio::test]
async fn s2_single_plan_when_count_fits_limit() {
    let server = MockServer::start().await;
    mount_count(&server, "created:>=2024-01-01T00:00:00Z created:<2024-01-02T00:00:00Z", 800).await;

    let (client, coordinator) = client_and_coordinator(&server);
    let planner = RangePlanner::new(&client, &coordinator, 1_000);

    let range = TimeRange::new(dt("2024-01-01T00:00:00Z"), dt("2024-01-02T00:00:00Z"));
    let plans = planner.plan(range, 500).await.expect("plan succeeds");

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].requested_results, 500);
    assert_eq!(plans[0].available_results, 800);
}

/// S3: a sub-second, unsplittable range with a huge count clamps to
/// the search limit instead of splitting forever.
#[tokio::test]
async fn s3_unsplittable_range_clamps_to_search_limit() {
    let server = MockServer::start().await;
    mount_count(&server, "created:>=", 274_650_407).await;

    let (client, coordinator) = client_and_coordinator(&server);
    let planner = RangePlanner::new(&client, &coordinator, 1_000);

    let start = dt("2024-01-01T00:00:00Z");
    let end = start + chrono::Duration::milliseconds(500);
    let range = TimeRange::new(start, end);
    let plans = planner.plan(range, 10).await.expect("plan succeeds");

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].requested_results, 10);
    assert_eq!(plans[0].available_results, 1_000);
}

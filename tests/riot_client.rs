mod common;

use common::{settings, API_KEY};
use futures::future::join_all;
use ladder::client::{Endpoint, FetchOutcome, RiotClient};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const LEAGUE_PATH: &str = "/lol/league/v4/entries/by-puuid/puuid-1";

#[tokio::test]
async fn retries_rate_limit_with_backoff_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LEAGUE_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LEAGUE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = RiotClient::new(&settings(&server, json!({}))).unwrap();
    let started = Instant::now();
    let outcome = client.fetch_endpoint(&Endpoint::LeagueEntries("puuid-1")).await;

    assert_eq!(outcome, FetchOutcome::Success(json!([])));
    // 20 + 40 + 80 ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(140));
}

#[tokio::test]
async fn gives_up_after_retry_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LEAGUE_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let client = RiotClient::new(&settings(&server, json!({ "max_retries": 3 }))).unwrap();
    let outcome = client.fetch_endpoint(&Endpoint::LeagueEntries("puuid-1")).await;

    assert_eq!(outcome, FetchOutcome::RateLimited);
}

#[tokio::test]
async fn not_found_and_server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lol/match/v5/matches/LA2_500"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = RiotClient::new(&settings(&server, json!({}))).unwrap();

    // Unmatched requests answer 404.
    let missing = client.fetch_endpoint(&Endpoint::Match("LA2_404")).await;
    assert_eq!(missing, FetchOutcome::NotFound);

    let broken = client.fetch_endpoint(&Endpoint::Match("LA2_500")).await;
    assert_eq!(broken, FetchOutcome::UpstreamError(500));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LEAGUE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let client = RiotClient::new(&settings(&server, json!({ "request_timeout_sec": 1 }))).unwrap();
    let outcome = client.fetch_endpoint(&Endpoint::LeagueEntries("puuid-1")).await;

    assert_eq!(outcome, FetchOutcome::Timeout);
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_error() {
    let server = MockServer::start().await;
    let mut settings = settings(&server, json!({}));
    // Nothing listens on the discard port.
    settings.platform_base_url = "http://127.0.0.1:9".to_string();

    let client = RiotClient::new(&settings).unwrap();
    let outcome = client.fetch_endpoint(&Endpoint::LeagueEntries("puuid-1")).await;

    assert!(matches!(outcome, FetchOutcome::TransportError(_)));
}

#[tokio::test]
async fn concurrency_gate_bounds_in_flight_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LEAGUE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(4)
        .mount(&server)
        .await;

    let client = RiotClient::new(&settings(&server, json!({ "max_concurrency": 2 }))).unwrap();
    let started = Instant::now();
    let outcomes = join_all((0..4).map(|_| {
        let client = client.clone();
        async move { client.fetch_endpoint(&Endpoint::LeagueEntries("puuid-1")).await }
    }))
    .await;

    // Two waves of two requests.
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(outcomes.iter().all(|o| matches!(o, FetchOutcome::Success(_))));
    assert_eq!(client.available_permits(), 2);
}

#[tokio::test]
async fn credential_header_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/riot/account/v1/accounts/by-riot-id/Tobio/CHL"))
        .and(header("X-Riot-Token", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "puuid": "p" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RiotClient::new(&settings(&server, json!({}))).unwrap();
    let outcome = client
        .fetch_endpoint(&Endpoint::AccountByRiotId("Tobio", "CHL"))
        .await;

    assert_eq!(outcome, FetchOutcome::Success(json!({ "puuid": "p" })));
}

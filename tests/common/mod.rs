#![allow(dead_code)]

use figment::{providers::Serialized, Figment};
use ladder::config::Settings;
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const API_KEY: &str = "RGAPI-test-key";
pub const SEASON_START_MS: i64 = 1_735_689_600_000;

/// Settings pointing both upstream hosts at the mock server, with short
/// backoff so retry tests stay fast. `overrides` wins over the base values.
pub fn settings(server: &MockServer, overrides: Value) -> Settings {
    let figment = Figment::from(Serialized::defaults(json!({
        "riot_api_key": API_KEY,
        "regional_base_url": server.uri(),
        "platform_base_url": server.uri(),
        "retry_base_delay_ms": 20,
        "request_timeout_sec": 2,
        "season_start_ms": SEASON_START_MS,
    })))
    .merge(Serialized::defaults(overrides));
    Settings::from_figment(figment).unwrap()
}

pub async fn mount_account(server: &MockServer, name: &str, tag: &str, puuid: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/riot/account/v1/accounts/by-riot-id/{name}/{tag}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "puuid": puuid,
            "gameName": name,
            "tagLine": tag,
        })))
        .mount(server)
        .await;
}

pub async fn mount_solo_rank(server: &MockServer, puuid: &str, tier: &str, rank: &str, lp: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/lol/league/v4/entries/by-puuid/{puuid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "queueType": "RANKED_SOLO_5x5",
            "tier": tier,
            "rank": rank,
            "leaguePoints": lp,
            "wins": 10,
            "losses": 10,
        }])))
        .mount(server)
        .await;
}

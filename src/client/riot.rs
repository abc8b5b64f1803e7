use crate::config::Settings;
use crate::error::{LadderError, LadderResult};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const TOKEN_HEADER: &str = "X-Riot-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    // Account and match data, served per continent.
    Regional,
    // League and spectator data, served per platform shard.
    Platform,
}

pub enum Endpoint<'a> {
    AccountByRiotId(&'a str, &'a str),
    LeagueEntries(&'a str),
    ActiveGame(&'a str),
    MatchIds { puuid: &'a str, queue: u16, count: u8 },
    Match(&'a str),
}

impl Endpoint<'_> {
    fn route(&self) -> Route {
        match self {
            Endpoint::AccountByRiotId(..) | Endpoint::MatchIds { .. } | Endpoint::Match(_) => {
                Route::Regional
            }
            Endpoint::LeagueEntries(_) | Endpoint::ActiveGame(_) => Route::Platform,
        }
    }

    fn segments(&self) -> Vec<&str> {
        match self {
            Endpoint::AccountByRiotId(name, tag) => vec![
                "riot",
                "account",
                "v1",
                "accounts",
                "by-riot-id",
                *name,
                *tag,
            ],
            Endpoint::LeagueEntries(puuid) => {
                vec!["lol", "league", "v4", "entries", "by-puuid", *puuid]
            }
            Endpoint::ActiveGame(puuid) => vec![
                "lol",
                "spectator",
                "v5",
                "active-games",
                "by-summoner",
                *puuid,
            ],
            Endpoint::MatchIds { puuid, .. } => {
                vec!["lol", "match", "v5", "matches", "by-puuid", *puuid, "ids"]
            }
            Endpoint::Match(id) => vec!["lol", "match", "v5", "matches", *id],
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::MatchIds { queue, count, .. } => vec![
                ("queue", queue.to_string()),
                ("start", "0".to_string()),
                ("count", count.to_string()),
            ],
            _ => vec![],
        }
    }

    /// Full url on the given host. Path segments are percent-encoded, player
    /// names routinely contain spaces and non-ascii characters.
    pub fn url(&self, base: &Url) -> LadderResult<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| LadderError::Config(format!("{base} cannot be used as a base url")))?
            .pop_if_empty()
            .extend(self.segments());
        let query = self.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

/// Terminal result of one upstream call, retries included.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Value),
    NotFound,
    RateLimited,
    Timeout,
    TransportError(String),
    UpstreamError(u16),
}

impl FetchOutcome {
    pub fn into_result(self) -> LadderResult<Value> {
        match self {
            FetchOutcome::Success(value) => Ok(value),
            FetchOutcome::NotFound => Err(LadderError::UpstreamNotFound),
            FetchOutcome::RateLimited => Err(LadderError::UpstreamRateLimited),
            FetchOutcome::Timeout => Err(LadderError::UpstreamTimeout),
            FetchOutcome::TransportError(s) => Err(LadderError::UpstreamTransport(s)),
            FetchOutcome::UpstreamError(code) => Err(LadderError::Upstream(code)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (0-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Upstream client. Every clone shares the same concurrency gate, so the
/// limit holds for the whole process whatever the call site.
#[derive(Clone)]
pub struct RiotClient {
    http_client: Client,
    api_key: Arc<str>,
    regional_base_url: Url,
    platform_base_url: Url,
    gate: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl RiotClient {
    pub fn new(settings: &Settings) -> LadderResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http_client,
            api_key: Arc::from(settings.riot_api_key.as_str()),
            regional_base_url: parse_base_url(&settings.regional_base_url)?,
            platform_base_url: parse_base_url(&settings.platform_base_url)?,
            gate: Arc::new(Semaphore::new(settings.max_concurrency.max(1))),
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                base_delay: settings.retry_base_delay(),
            },
        })
    }

    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    pub async fn fetch_endpoint(&self, endpoint: &Endpoint<'_>) -> FetchOutcome {
        let base = match endpoint.route() {
            Route::Regional => &self.regional_base_url,
            Route::Platform => &self.platform_base_url,
        };
        match endpoint.url(base) {
            Ok(url) => self.fetch(url).await,
            Err(e) => FetchOutcome::TransportError(e.to_string()),
        }
    }

    /// Calls the upstream, retrying on 429 with exponential backoff up to the
    /// configured ceiling. The gate permit is only held while a request is on
    /// the wire, not while backing off.
    pub async fn fetch(&self, url: Url) -> FetchOutcome {
        let mut attempt = 0;
        loop {
            match self.send_once(&url).await {
                FetchOutcome::RateLimited if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        "Rate limited on {}, retry {}/{} in {:?}",
                        url.path(),
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                FetchOutcome::Success(value) => {
                    debug!("fetched {}", url.path());
                    return FetchOutcome::Success(value);
                }
                // Expected answer for unknown players and players not in game.
                FetchOutcome::NotFound => {
                    debug!("not found {}", url.path());
                    return FetchOutcome::NotFound;
                }
                outcome => {
                    let error = outcome.clone().into_result().err();
                    if let Some(error) = error {
                        warn!("Giving up on {}. {error}", url.path());
                    }
                    return outcome;
                }
            }
        }
    }

    async fn send_once(&self, url: &Url) -> FetchOutcome {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => return FetchOutcome::TransportError("concurrency gate closed".to_string()),
        };

        let response = match self
            .http_client
            .get(url.clone())
            .header(TOKEN_HEADER, &*self.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify(&e),
        };

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => FetchOutcome::RateLimited,
            StatusCode::NOT_FOUND => FetchOutcome::NotFound,
            status if status.is_success() => match response.json::<Value>().await {
                Ok(value) => FetchOutcome::Success(value),
                Err(e) => classify(&e),
            },
            status => FetchOutcome::UpstreamError(status.as_u16()),
        }
    }
}

fn parse_base_url(raw: &str) -> LadderResult<Url> {
    Url::parse(raw).map_err(|e| LadderError::Config(format!("Invalid base url '{raw}'. {e}")))
}

// Error messages from the transport may embed the full url; keep only the kind.
fn classify(error: &reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        return FetchOutcome::Timeout;
    }
    let kind = if error.is_connect() {
        "connection refused or unreachable"
    } else if error.is_body() {
        "response body error"
    } else if error.is_decode() {
        "response decode error"
    } else if error.is_redirect() {
        "too many redirects"
    } else if error.is_request() {
        "request failed"
    } else {
        "network error"
    };
    FetchOutcome::TransportError(kind.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_url_encodes_name() {
        let base = Url::parse("https://americas.api.riotgames.com").unwrap();
        let url = Endpoint::AccountByRiotId("Freecss ツ", "HxH").url(&base).unwrap();
        assert_eq!(
            url.as_str(),
            "https://americas.api.riotgames.com/riot/account/v1/accounts/by-riot-id/Freecss%20%E3%83%84/HxH"
        );
    }

    #[test]
    fn match_ids_url_carries_window() {
        let base = Url::parse("http://127.0.0.1:9000/").unwrap();
        let endpoint = Endpoint::MatchIds {
            puuid: "p-1",
            queue: 420,
            count: 20,
        };
        let url = endpoint.url(&base).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/lol/match/v5/matches/by-puuid/p-1/ids?queue=420&start=0&count=20"
        );
    }

    #[test]
    fn routes_split_by_host() {
        assert_eq!(Endpoint::LeagueEntries("p").route(), Route::Platform);
        assert_eq!(Endpoint::ActiveGame("p").route(), Route::Platform);
        assert_eq!(Endpoint::Match("LA2_1").route(), Route::Regional);
        assert_eq!(Endpoint::AccountByRiotId("a", "b").route(), Route::Regional);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        };
        let delays: Vec<_> = (0..3).map(|a| policy.delay_for(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn outcomes_map_to_errors() {
        assert_eq!(
            FetchOutcome::RateLimited.into_result(),
            Err(LadderError::UpstreamRateLimited)
        );
        assert_eq!(
            FetchOutcome::UpstreamError(503).into_result(),
            Err(LadderError::Upstream(503))
        );
        assert_eq!(
            FetchOutcome::Success(Value::Null).into_result(),
            Ok(Value::Null)
        );
    }
}

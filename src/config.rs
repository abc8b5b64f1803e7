use crate::cli::Cli;
use crate::core::identity::PlayerIdentity;
use crate::error::LadderResult;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

const TRACE_LEVELS: [&'static str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

// Settings are loaded once at startup and handed to every component by
// reference. All settings may be configured via environment variables.
// Example: RIOT_API_KEY="xxx" would set riot_api_key to the xxx value.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_trace_level")]
    trace_level: String,
    pub riot_api_key: String,
    #[serde(default = "default_regional_base_url")]
    pub regional_base_url: String,
    #[serde(default = "default_platform_base_url")]
    pub platform_base_url: String,
    // Durable cache tier, disabled when absent
    pub redis_url: Option<String>,
    // File-backed local tier, in-memory when absent
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_connect_timeout_sec")]
    pub connect_timeout_sec: u64,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    #[serde(default = "default_long_ttl_sec")]
    pub identity_ttl_sec: u64,
    #[serde(default = "default_long_ttl_sec")]
    pub match_ttl_sec: u64,
    #[serde(default = "default_ranking_ttl_sec")]
    pub ranking_ttl_sec: u64,
    #[serde(default = "default_stale_ranking_ttl_sec")]
    pub stale_ranking_ttl_sec: u64,
    #[serde(default = "default_rebuild_max_wait_ms")]
    pub rebuild_max_wait_ms: u64,
    // Matches created before this timestamp (epoch millis) belong to a previous season
    #[serde(default = "default_season_start_ms")]
    pub season_start_ms: i64,
    #[serde(default = "default_ranked_queue_id")]
    pub ranked_queue_id: u16,
    #[serde(default = "default_match_window")]
    pub match_window: u8,
    #[serde(default = "default_refresh_schedule")]
    pub refresh_schedule: String,
    #[serde(default)]
    pub roster: Vec<PlayerIdentity>,
}

impl Settings {
    /// Local YAML file (if any), then environment, then command line flags.
    pub fn load(cli: &Cli) -> LadderResult<Self> {
        let mut figment = Figment::new();
        if cli.config.exists() {
            figment = figment.merge(Yaml::file(&cli.config));
        }
        let figment = figment.merge(Env::raw()).merge(Serialized::defaults(cli));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> LadderResult<Self> {
        Ok(figment.extract()?)
    }

    pub fn get_trace_level(&self) -> Level {
        get_trace_level(&self.trace_level)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn identity_ttl(&self) -> Duration {
        Duration::from_secs(self.identity_ttl_sec)
    }

    pub fn match_ttl(&self) -> Duration {
        Duration::from_secs(self.match_ttl_sec)
    }

    pub fn ranking_ttl(&self) -> Duration {
        Duration::from_secs(self.ranking_ttl_sec)
    }

    pub fn stale_ranking_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_ranking_ttl_sec)
    }

    pub fn rebuild_max_wait(&self) -> Duration {
        Duration::from_millis(self.rebuild_max_wait_ms)
    }
}

fn get_trace_level(level_str: &str) -> Level {
    match level_str {
        level if level == TRACE_LEVELS[0] => Level::TRACE,
        level if level == TRACE_LEVELS[1] => Level::DEBUG,
        level if level == TRACE_LEVELS[2] => Level::INFO,
        level if level == TRACE_LEVELS[3] => Level::WARN,
        level if level == TRACE_LEVELS[4] => Level::ERROR,
        // Default trace level
        _ => Level::INFO,
    }
}

fn default_trace_level() -> String {
    "INFO".to_string()
}

fn default_regional_base_url() -> String {
    "https://americas.api.riotgames.com".to_string()
}

fn default_platform_base_url() -> String {
    "https://la2.api.riotgames.com".to_string()
}

fn default_max_concurrency() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_connect_timeout_sec() -> u64 {
    5
}

fn default_request_timeout_sec() -> u64 {
    10
}

// 30 days
fn default_long_ttl_sec() -> u64 {
    2_592_000
}

fn default_ranking_ttl_sec() -> u64 {
    60
}

fn default_stale_ranking_ttl_sec() -> u64 {
    86_400
}

fn default_rebuild_max_wait_ms() -> u64 {
    10_000
}

fn default_season_start_ms() -> i64 {
    1_735_689_600_000
}

fn default_ranked_queue_id() -> u16 {
    420
}

fn default_match_window() -> u8 {
    20
}

fn default_refresh_schedule() -> String {
    "0 * * * * *".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_applied() {
        let figment = Figment::from(Serialized::defaults(json!({ "riot_api_key": "RGAPI-test" })));
        let settings = Settings::from_figment(figment).unwrap();

        assert_eq!(settings.max_concurrency, 5);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.ranking_ttl(), Duration::from_secs(60));
        assert_eq!(settings.identity_ttl(), Duration::from_secs(30 * 24 * 3600));
        assert!(settings.redis_url.is_none());
        assert!(settings.roster.is_empty());
        assert_eq!(settings.get_trace_level(), Level::INFO);
    }

    #[test]
    fn roster_and_overrides_are_read() {
        let figment = Figment::from(Serialized::defaults(json!({
            "riot_api_key": "RGAPI-test",
            "trace_level": "DEBUG",
            "max_concurrency": 2,
            "roster": [{ "name": "Tobio", "tag": "CHL" }, { "name": "Zetter", "tag": "CHILE" }],
        })));
        let settings = Settings::from_figment(figment).unwrap();

        assert_eq!(settings.max_concurrency, 2);
        assert_eq!(settings.roster.len(), 2);
        assert_eq!(settings.roster[1].tag, "CHILE");
        assert_eq!(settings.get_trace_level(), Level::DEBUG);
    }

    #[test]
    fn missing_credential_is_a_config_error() {
        let figment = Figment::from(Serialized::defaults(json!({ "max_retries": 1 })));
        let err = Settings::from_figment(figment).unwrap_err();
        assert!(matches!(err, crate::error::LadderError::Config(_)));
    }
}

use std::error::Error;
use std::fmt;
use tokio_cron_scheduler::JobSchedulerError;

/// Custom Error and Result types to unify errors from all sources.
pub type LadderResult<T> = Result<T, LadderError>;

#[derive(Debug, Clone, PartialEq)]
pub enum LadderError {
    UpstreamRateLimited,
    UpstreamTimeout,
    UpstreamTransport(String),
    UpstreamNotFound,
    Upstream(u16),
    // Never surfaced to callers of the cache, only used for logging degradation.
    CacheUnavailable(String),
    RebuildBusy,
    IdentityUnresolved(String),
    Config(String),
    Scheduler(String),
    Parse(String),
}

impl fmt::Display for LadderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LadderError::UpstreamRateLimited => write!(f, "Upstream Error: rate limit exceeded"),
            LadderError::UpstreamTimeout => write!(f, "Upstream Error: request timed out"),
            LadderError::UpstreamTransport(s) => write!(f, "Upstream Error: {}", s),
            LadderError::UpstreamNotFound => write!(f, "Upstream Error: not found"),
            LadderError::Upstream(code) => write!(f, "Upstream Error: status {}", code),
            LadderError::CacheUnavailable(s) => write!(f, "Cache Error: {}", s),
            LadderError::RebuildBusy => write!(f, "System busy, try again shortly"),
            LadderError::IdentityUnresolved(s) => write!(f, "Player not found: {}", s),
            LadderError::Config(s) => write!(f, "Config Error: {}", s),
            LadderError::Scheduler(s) => write!(f, "Scheduler Error: {}", s),
            LadderError::Parse(s) => write!(f, "Parse Error: {}", s),
        }
    }
}

impl Error for LadderError {}

impl From<reqwest::Error> for LadderError {
    fn from(error: reqwest::Error) -> Self {
        LadderError::UpstreamTransport(error.to_string())
    }
}

impl From<redis::RedisError> for LadderError {
    fn from(error: redis::RedisError) -> Self {
        LadderError::CacheUnavailable(error.to_string())
    }
}

impl From<serde_json::Error> for LadderError {
    fn from(error: serde_json::Error) -> Self {
        LadderError::Parse(error.to_string())
    }
}

impl From<figment::Error> for LadderError {
    fn from(error: figment::Error) -> Self {
        LadderError::Config(error.to_string())
    }
}

impl From<JobSchedulerError> for LadderError {
    fn from(error: JobSchedulerError) -> Self {
        LadderError::Scheduler(error.to_string())
    }
}

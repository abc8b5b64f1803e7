use crate::client::{Endpoint, RiotClient};
use crate::error::{LadderError, LadderResult};
use crate::storage::CacheTiers;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use tracing::warn;

/// Riot id of a player as written in the roster: `name#tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub name: String,
    pub tag: String,
}

/// Roster entry paired with its global, immutable account id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub identity: PlayerIdentity,
    pub puuid: String,
}

impl PlayerIdentity {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    pub fn cache_key(&self) -> String {
        format!("puuid:{}:{}", self.name, self.tag)
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.tag)
    }
}

/// Resolves riot ids to account ids, memoized in the cache tiers.
#[derive(Clone)]
pub struct IdentityResolver {
    client: RiotClient,
    cache: Arc<CacheTiers>,
    ttl: Duration,
}

impl IdentityResolver {
    pub fn new(client: RiotClient, cache: Arc<CacheTiers>, ttl: Duration) -> Self {
        Self { client, cache, ttl }
    }

    pub async fn resolve(&self, identity: &PlayerIdentity) -> LadderResult<ResolvedIdentity> {
        let key = identity.cache_key();
        if let Some(puuid) = self.cache.get::<String>(&key).await {
            return Ok(ResolvedIdentity {
                identity: identity.clone(),
                puuid,
            });
        }

        // Response from the account API. Only the id is of interest.
        #[derive(Debug, Deserialize)]
        struct Account {
            puuid: String,
        }

        let endpoint = Endpoint::AccountByRiotId(&identity.name, &identity.tag);
        let account = self
            .client
            .fetch_endpoint(&endpoint)
            .await
            .into_result()
            .map_err(|e| match e {
                LadderError::UpstreamNotFound => LadderError::IdentityUnresolved(identity.to_string()),
                other => other,
            })?;
        let account: Account = serde_json::from_value(account)?;

        self.cache.set(&key, &account.puuid, self.ttl).await;
        Ok(ResolvedIdentity {
            identity: identity.clone(),
            puuid: account.puuid,
        })
    }

    /// Resolves the whole roster concurrently. Players that cannot be resolved
    /// are logged and left out, they never fail the batch.
    pub async fn resolve_all(&self, roster: &[PlayerIdentity]) -> Vec<ResolvedIdentity> {
        join_all(roster.iter().map(|identity| self.resolve(identity)))
            .await
            .into_iter()
            .zip(roster)
            .filter_map(|(resolved, identity)| match resolved {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    warn!("Could not resolve {identity}, skipping. {e}");
                    None
                }
            })
            .collect()
    }
}

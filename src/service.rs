use crate::client::RiotClient;
use crate::config::Settings;
use crate::core::identity::{IdentityResolver, PlayerIdentity};
use crate::core::insights::{MatchFilter, MatchHistoryAggregator, PlayerInsights};
use crate::core::ranking::{RankingAggregator, RankingSnapshot};
use crate::core::single_flight::{RebuildLock, RebuildPolicy};
use crate::error::LadderResult;
use crate::storage::CacheTiers;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// What callers of the ladder get back: the payload, or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Data(T),
    Error { error: String },
}

impl<T> From<LadderResult<T>> for Reply<T> {
    fn from(result: LadderResult<T>) -> Self {
        match result {
            Ok(data) => Reply::Data(data),
            Err(e) => Reply::Error {
                error: e.to_string(),
            },
        }
    }
}

/// Entry point wiring the client, the cache tiers and both aggregators.
pub struct Ladder {
    resolver: IdentityResolver,
    ranking: RankingAggregator,
    history: MatchHistoryAggregator,
    roster: Vec<PlayerIdentity>,
}

impl Ladder {
    pub async fn from_settings(settings: &Settings) -> LadderResult<Self> {
        let cache = CacheTiers::from_settings(settings).await;
        Self::with_cache(settings, Arc::new(cache))
    }

    pub fn with_cache(settings: &Settings, cache: Arc<CacheTiers>) -> LadderResult<Self> {
        let client = RiotClient::new(settings)?;
        let resolver = IdentityResolver::new(client.clone(), cache.clone(), settings.identity_ttl());

        let policy = RebuildPolicy {
            fresh_ttl: settings.ranking_ttl(),
            stale_ttl: settings.stale_ranking_ttl(),
            max_wait: settings.rebuild_max_wait(),
        };
        let ranking = RankingAggregator::new(
            client.clone(),
            cache.clone(),
            resolver.clone(),
            Arc::new(RebuildLock::new()),
            policy,
            settings.roster.clone(),
        );

        let filter = MatchFilter {
            season_start_ms: settings.season_start_ms,
            queue_id: settings.ranked_queue_id,
        };
        let history = MatchHistoryAggregator::new(
            client,
            cache,
            resolver.clone(),
            filter,
            settings.match_window,
            settings.match_ttl(),
        );

        Ok(Ladder {
            resolver,
            ranking,
            history,
            roster: settings.roster.clone(),
        })
    }

    pub async fn ranking(&self) -> Reply<RankingSnapshot> {
        self.ranking.compute_ranking().await.into()
    }

    pub async fn player_insights(&self, name: &str, tag: &str) -> Reply<PlayerInsights> {
        let identity = PlayerIdentity::new(name, tag);
        self.history.compute_player_insights(&identity).await.into()
    }

    /// Resolves the whole roster so later rankings only hit the cache for ids.
    pub async fn warm_identities(&self) -> usize {
        let resolved = self.resolver.resolve_all(&self.roster).await;
        info!("Resolved {} of {} roster players.", resolved.len(), self.roster.len());
        resolved.len()
    }
}

use crate::client::{Endpoint, FetchOutcome, RiotClient};
use crate::core::identity::{IdentityResolver, PlayerIdentity, ResolvedIdentity};
use crate::core::single_flight::{RebuildLock, RebuildPolicy};
use crate::error::{LadderError, LadderResult};
use crate::storage::CacheTiers;
use crate::utils::win_rate;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{cmp::Reverse, str::FromStr, sync::Arc};
use strum::{Display, EnumIter, EnumString};
use tracing::{info, warn};

pub const RANKING_KEY: &str = "ranking";
pub const RANKED_SOLO_QUEUE: &str = "RANKED_SOLO_5x5";

const TIER_STEP: u32 = 400;
// Offset of division I, also given to tiers without divisions.
const MAX_DIVISION_OFFSET: u32 = 300;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Tier {
    IRON = 0,
    BRONZE,
    SILVER,
    GOLD,
    PLATINUM,
    EMERALD,
    DIAMOND,
    MASTER,
    GRANDMASTER,
    CHALLENGER,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum Division {
    IV,
    III,
    II,
    I,
}

impl Tier {
    pub fn base_score(self) -> u32 {
        self as u32 * TIER_STEP
    }

    /// Master and above are a single bracket.
    pub fn has_divisions(self) -> bool {
        self < Tier::MASTER
    }
}

impl Division {
    pub fn offset(self) -> u32 {
        match self {
            Division::IV => 0,
            Division::III => 100,
            Division::II => 200,
            Division::I => 300,
        }
    }
}

/// Composite sort key: any tier outranks every (division, LP) of the tiers
/// below it, and any division outranks every LP of the divisions below it.
pub fn total_score(tier: Tier, division: Option<Division>, league_points: u32) -> u32 {
    let division_offset = match division {
        Some(division) if tier.has_divisions() => division.offset(),
        _ => MAX_DIVISION_OFFSET,
    };
    tier.base_score() + division_offset + league_points
}

/// Solo queue standing of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub tier: Tier,
    pub division: Option<Division>,
    pub league_points: u32,
    pub wins: u32,
    pub losses: u32,
}

impl RankEntry {
    pub fn total_score(&self) -> u32 {
        total_score(self.tier, self.division, self.league_points)
    }

    pub fn games(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn label(&self) -> String {
        match self.division {
            Some(division) => format!("{} {}", self.tier, division),
            None => self.tier.to_string(),
        }
    }

    /// Picks the solo queue entry out of a league entries response. Other
    /// queues are ignored; no solo queue entry means unranked.
    pub fn from_league_entries(entries: serde_json::Value) -> LadderResult<Option<RankEntry>> {
        // Response from the league API. Defined here as it is only used by this function.
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LeagueEntry {
            queue_type: String,
            tier: String,
            rank: Option<String>,
            league_points: u32,
            wins: u32,
            losses: u32,
        }

        let entries: Vec<LeagueEntry> = serde_json::from_value(entries)?;
        let solo = match entries.into_iter().find(|e| e.queue_type == RANKED_SOLO_QUEUE) {
            Some(solo) => solo,
            None => return Ok(None),
        };

        let tier = Tier::from_str(&solo.tier)
            .map_err(|_| LadderError::Parse(format!("Unknown tier '{}'", solo.tier)))?;
        let division = match (tier.has_divisions(), solo.rank) {
            (true, Some(rank)) => Some(
                Division::from_str(&rank)
                    .map_err(|_| LadderError::Parse(format!("Unknown division '{rank}'")))?,
            ),
            _ => None,
        };

        Ok(Some(RankEntry {
            tier,
            division,
            league_points: solo.league_points,
            wins: solo.wins,
            losses: solo.losses,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPlayer {
    #[serde(flatten)]
    pub identity: PlayerIdentity,
    pub rank: Option<RankEntry>,
    pub label: String,
    pub games: u32,
    pub win_rate: f64,
    pub in_game: bool,
    pub total_score: u32,
}

impl ScoredPlayer {
    pub fn new(identity: PlayerIdentity, rank: Option<RankEntry>, in_game: bool) -> Self {
        let (label, games, rate, score) = match &rank {
            Some(entry) => (
                entry.label(),
                entry.games(),
                win_rate(entry.wins, entry.games()),
                entry.total_score(),
            ),
            None => ("Unranked".to_string(), 0, 0.0, 0),
        };
        Self {
            identity,
            rank,
            label,
            games,
            win_rate: rate,
            in_game,
            total_score: score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Highest total score first.
    pub players: Vec<ScoredPlayer>,
}

impl RankingSnapshot {
    pub fn new(players: Vec<ScoredPlayer>) -> Self {
        Self {
            generated_at: Utc::now(),
            players: players
                .into_iter()
                .sorted_by_key(|p| Reverse(p.total_score))
                .collect(),
        }
    }
}

/// Builds the roster ranking, at most once at a time, and caches it.
#[derive(Clone)]
pub struct RankingAggregator {
    client: RiotClient,
    cache: Arc<CacheTiers>,
    resolver: IdentityResolver,
    lock: Arc<RebuildLock>,
    policy: RebuildPolicy,
    roster: Arc<Vec<PlayerIdentity>>,
}

impl RankingAggregator {
    pub fn new(
        client: RiotClient,
        cache: Arc<CacheTiers>,
        resolver: IdentityResolver,
        lock: Arc<RebuildLock>,
        policy: RebuildPolicy,
        roster: Vec<PlayerIdentity>,
    ) -> Self {
        Self {
            client,
            cache,
            resolver,
            lock,
            policy,
            roster: Arc::new(roster),
        }
    }

    pub async fn compute_ranking(&self) -> LadderResult<RankingSnapshot> {
        self.lock
            .with_exclusive_rebuild(&self.cache, RANKING_KEY, &self.policy, || {
                self.build_snapshot()
            })
            .await
    }

    async fn build_snapshot(&self) -> LadderResult<RankingSnapshot> {
        info!("Building ranking for {} players.", self.roster.len());
        let resolved = self.resolver.resolve_all(&self.roster).await;
        if resolved.is_empty() && !self.roster.is_empty() {
            return Err(LadderError::IdentityUnresolved(
                "no player of the roster could be resolved".to_string(),
            ));
        }

        let scored = join_all(resolved.iter().map(|player| self.score_player(player))).await;
        // Nobody's rank could be read: the upstream is down, not the roster unranked.
        if !scored.is_empty() && scored.iter().all(|(_, failure)| failure.is_some()) {
            let error = scored
                .into_iter()
                .find_map(|(_, failure)| failure)
                .unwrap_or(LadderError::UpstreamTimeout);
            return Err(error);
        }

        let players = scored.into_iter().map(|(player, _)| player).collect();
        Ok(RankingSnapshot::new(players))
    }

    /// Scores one player. The error is set when the rank could not be fetched
    /// at all, in which case the player is listed as unranked.
    async fn score_player(&self, player: &ResolvedIdentity) -> (ScoredPlayer, Option<LadderError>) {
        let entries_endpoint = Endpoint::LeagueEntries(&player.puuid);
        let game_endpoint = Endpoint::ActiveGame(&player.puuid);
        let (entries, active_game) = tokio::join!(
            self.client.fetch_endpoint(&entries_endpoint),
            self.client.fetch_endpoint(&game_endpoint),
        );

        let (rank, failure) = match entries {
            // No league record at all.
            FetchOutcome::NotFound => (None, None),
            outcome => match outcome.into_result() {
                Ok(entries) => match RankEntry::from_league_entries(entries) {
                    Ok(rank) => (rank, None),
                    Err(e) => {
                        warn!("Unreadable rank for {}, listing as unranked. {e}", player.identity);
                        (None, None)
                    }
                },
                Err(e) => {
                    warn!("No rank for {}, listing as unranked. {e}", player.identity);
                    (None, Some(e))
                }
            },
        };
        // The spectator API answers 404 for players not in a game.
        let in_game = matches!(active_game, FetchOutcome::Success(_));

        (ScoredPlayer::new(player.identity.clone(), rank, in_game), failure)
    }
}

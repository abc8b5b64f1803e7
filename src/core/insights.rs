use crate::client::{Endpoint, RiotClient};
use crate::core::identity::{IdentityResolver, PlayerIdentity};
use crate::error::LadderResult;
use crate::storage::CacheTiers;
use crate::utils::{kda, win_rate};
use futures::future::join_all;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// One finished (or running) match, reduced to what the insights need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: String,
    // epoch millis
    pub game_creation: i64,
    pub queue_id: u16,
    pub completed: bool,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub puuid: String,
    pub game_name: Option<String>,
    pub tag_line: Option<String>,
    pub champion: String,
    pub team_id: u16,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub win: bool,
}

impl Participant {
    pub fn display_name(&self) -> String {
        format!(
            "{}#{}",
            self.game_name.as_deref().unwrap_or("?"),
            self.tag_line.as_deref().unwrap_or("?")
        )
    }
}

impl MatchSummary {
    pub fn from_match_detail(match_id: &str, detail: serde_json::Value) -> LadderResult<Self> {
        // Response from the match API. Structs defined here as they are only used by this function.
        #[derive(Debug, Deserialize)]
        struct MatchResponse {
            info: MatchInfo,
        }

        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct MatchInfo {
            game_creation: i64,
            // only present once the game is over
            game_end_timestamp: Option<i64>,
            queue_id: u16,
            participants: Vec<MatchParticipant>,
        }

        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct MatchParticipant {
            puuid: String,
            riot_id_game_name: Option<String>,
            riot_id_tagline: Option<String>,
            champion_name: String,
            team_id: u16,
            kills: u32,
            deaths: u32,
            assists: u32,
            win: bool,
        }

        let parsed: MatchResponse = serde_json::from_value(detail)?;
        Ok(MatchSummary {
            match_id: match_id.to_string(),
            game_creation: parsed.info.game_creation,
            queue_id: parsed.info.queue_id,
            completed: parsed.info.game_end_timestamp.is_some(),
            participants: parsed
                .info
                .participants
                .into_iter()
                .map(|p| Participant {
                    puuid: p.puuid,
                    game_name: p.riot_id_game_name,
                    tag_line: p.riot_id_tagline,
                    champion: p.champion_name,
                    team_id: p.team_id,
                    kills: p.kills,
                    deaths: p.deaths,
                    assists: p.assists,
                    win: p.win,
                })
                .collect(),
        })
    }
}

/// Running totals over a set of games.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub games: u32,
    pub wins: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

impl Counters {
    fn record(&mut self, player: &Participant) {
        self.games += 1;
        self.wins += player.win as u32;
        self.kills += player.kills;
        self.deaths += player.deaths;
        self.assists += player.assists;
    }

    pub fn win_rate(&self) -> f64 {
        win_rate(self.wins, self.games)
    }

    pub fn kda(&self) -> f64 {
        kda(self.kills, self.deaths, self.assists)
    }
}

/// Games shared with one teammate. Only games and wins are tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct DuoAggregate {
    pub name: String,
    pub games: u32,
    pub wins: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionInsight {
    pub name: String,
    pub games: u32,
    pub win_rate: f64,
    pub kda: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuoInsight {
    pub name: String,
    pub games: u32,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInsights {
    pub top_champion: Option<ChampionInsight>,
    pub top_duo: Option<DuoInsight>,
    pub overall_kda: f64,
    pub games_counted: u32,
}

/// Which matches count toward the insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchFilter {
    pub season_start_ms: i64,
    pub queue_id: u16,
}

impl MatchFilter {
    fn accepts(&self, summary: &MatchSummary) -> bool {
        summary.game_creation >= self.season_start_ms && summary.queue_id == self.queue_id
    }
}

/// Folds the matches of one player into champion and duo statistics.
/// Matches outside the filter, or without the player, are skipped.
pub fn summarize(puuid: &str, matches: &[MatchSummary], filter: &MatchFilter) -> PlayerInsights {
    let mut overall = Counters::default();
    let mut champions: HashMap<&str, Counters> = HashMap::new();
    let mut duos: HashMap<&str, DuoAggregate> = HashMap::new();

    for summary in matches.iter().filter(|m| filter.accepts(m)) {
        let player = match summary.participants.iter().find(|p| p.puuid == puuid) {
            Some(player) => player,
            None => {
                debug!("{} not found in {}, skipping", puuid, summary.match_id);
                continue;
            }
        };

        overall.record(player);
        champions
            .entry(player.champion.as_str())
            .or_default()
            .record(player);

        for mate in summary
            .participants
            .iter()
            .filter(|p| p.team_id == player.team_id && p.puuid != puuid)
        {
            let duo = duos.entry(mate.puuid.as_str()).or_insert_with(|| DuoAggregate {
                name: mate.display_name(),
                games: 0,
                wins: 0,
            });
            duo.games += 1;
            duo.wins += player.win as u32;
        }
    }

    let top_champion = champions
        .into_iter()
        .max_by_key(|(_, counters)| counters.games)
        .map(|(name, counters)| ChampionInsight {
            name: name.to_string(),
            games: counters.games,
            win_rate: counters.win_rate(),
            kda: counters.kda(),
        });

    // A single shared game is most likely a random teammate.
    let top_duo = duos
        .into_values()
        .max_by_key(|duo| duo.games)
        .filter(|duo| duo.games > 1)
        .map(|duo| DuoInsight {
            win_rate: win_rate(duo.wins, duo.games),
            name: duo.name,
            games: duo.games,
        });

    PlayerInsights {
        top_champion,
        top_duo,
        overall_kda: overall.kda(),
        games_counted: overall.games,
    }
}

/// Recent match history of one player, with finished matches cached by id.
#[derive(Clone)]
pub struct MatchHistoryAggregator {
    client: RiotClient,
    cache: Arc<CacheTiers>,
    resolver: IdentityResolver,
    filter: MatchFilter,
    window: u8,
    match_ttl: Duration,
}

impl MatchHistoryAggregator {
    pub fn new(
        client: RiotClient,
        cache: Arc<CacheTiers>,
        resolver: IdentityResolver,
        filter: MatchFilter,
        window: u8,
        match_ttl: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            resolver,
            filter,
            window,
            match_ttl,
        }
    }

    pub async fn compute_player_insights(
        &self,
        identity: &PlayerIdentity,
    ) -> LadderResult<PlayerInsights> {
        let player = self.resolver.resolve(identity).await?;

        let endpoint = Endpoint::MatchIds {
            puuid: &player.puuid,
            queue: self.filter.queue_id,
            count: self.window,
        };
        let ids = self.client.fetch_endpoint(&endpoint).await.into_result()?;
        let ids: Vec<String> = serde_json::from_value(ids)?;

        let matches = join_all(ids.iter().unique().map(|id| self.match_summary(id)))
            .await
            .into_iter()
            .flatten()
            .collect::<Vec<MatchSummary>>();
        debug!("{} of {} matches fetched for {identity}", matches.len(), ids.len());

        Ok(summarize(&player.puuid, &matches, &self.filter))
    }

    async fn match_summary(&self, match_id: &str) -> Option<MatchSummary> {
        let key = format!("match:{match_id}");
        if let Some(cached) = self.cache.get::<MatchSummary>(&key).await {
            return Some(cached);
        }

        let detail = match self
            .client
            .fetch_endpoint(&Endpoint::Match(match_id))
            .await
            .into_result()
        {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Could not fetch match {match_id}, skipping. {e}");
                return None;
            }
        };

        match MatchSummary::from_match_detail(match_id, detail) {
            Ok(summary) => {
                // Finished matches never change.
                if summary.completed {
                    self.cache.set(&key, &summary, self.match_ttl).await;
                }
                Some(summary)
            }
            Err(e) => {
                warn!("Could not read match {match_id}, skipping. {e}");
                None
            }
        }
    }
}

//! Cache keys for API queries.

use sha2::{Digest, Sha256};

use crate::api::filters::GameFilters;
use crate::cache::QueryKey;
use crate::services::market::MarketFilters;
use crate::services::pools::{LeaderboardFilters, PoolFilters};

/// Query key types for pool API calls.
#[derive(Clone, Debug)]
pub enum ApiQueryKey {
  /// Page of games matching filters
  Games(GameFilters),
  /// One game by id
  Game { id: String },
  /// Active odds for a game
  ActiveOdds { game_id: String },
  /// Games joined with odds from the market endpoint
  MarketGames(MarketFilters),
  /// All leagues
  Leagues,
  /// Page of pools matching filters
  Pools(PoolFilters),
  /// Leaderboard page
  Leaderboard(LeaderboardFilters),
  /// A user's membership in one pool
  PoolMembership { pool_id: String, user_id: String },
  /// A user's recent bets
  UserBets { user_id: String },
}

impl ApiQueryKey {
  /// Resource tag, the first half of the key.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Games(_) => "games",
      Self::Game { .. } => "game",
      Self::ActiveOdds { .. } => "game_odds",
      Self::MarketGames(_) => "market_games",
      Self::Leagues => "leagues",
      Self::Pools(_) => "pools",
      Self::Leaderboard(_) => "leaderboard",
      Self::PoolMembership { .. } => "pool_membership",
      Self::UserBets { .. } => "user_bets",
    }
  }

  /// Serialized filter or identifier, the second half of the key.
  fn params(&self) -> String {
    match self {
      Self::Games(filters) => serde_json::to_string(filters).unwrap_or_default(),
      Self::MarketGames(filters) => serde_json::to_string(filters).unwrap_or_default(),
      Self::Pools(filters) => serde_json::to_string(filters).unwrap_or_default(),
      Self::Leaderboard(filters) => serde_json::to_string(filters).unwrap_or_default(),
      Self::Game { id } => id.clone(),
      Self::ActiveOdds { game_id } => game_id.clone(),
      Self::PoolMembership { pool_id, user_id } => {
        serde_json::to_string(&(pool_id, user_id)).unwrap_or_default()
      }
      Self::UserBets { user_id } => user_id.clone(),
      Self::Leagues => String::new(),
    }
  }
}

impl QueryKey for ApiQueryKey {
  fn cache_hash(&self) -> String {
    let input = format!("{}:{}", self.kind(), self.params());

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
  }

  fn description(&self) -> String {
    match self {
      Self::Leagues => "leagues".to_string(),
      Self::Games(_) | Self::MarketGames(_) | Self::Pools(_) | Self::Leaderboard(_) => {
        format!("{} {}", self.kind(), self.params())
      }
      Self::Game { id } => format!("game {}", id),
      Self::ActiveOdds { game_id } => format!("odds for game {}", game_id),
      Self::PoolMembership { pool_id, user_id } => {
        format!("membership of {} in pool {}", user_id, pool_id)
      }
      Self::UserBets { user_id } => format!("bets for {}", user_id),
    }
  }
}

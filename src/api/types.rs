//! Serde types matching the betting pool API's documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Envelopes and relations
// ============================================================================

/// Page of documents plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
  #[serde(default = "Vec::new")]
  pub docs: Vec<T>,
  #[serde(default)]
  pub page: u32,
  #[serde(default)]
  pub limit: u32,
  #[serde(default)]
  pub total_docs: u64,
  #[serde(default)]
  pub total_pages: u32,
  #[serde(default)]
  pub has_next_page: bool,
  #[serde(default)]
  pub has_prev_page: bool,
  #[serde(default)]
  pub next_page: Option<u32>,
  #[serde(default)]
  pub prev_page: Option<u32>,
}

/// A relational field: a bare id at depth 0, the expanded document otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relation<T> {
  Id(String),
  Doc(Box<T>),
}

/// Anything with a document id.
pub trait HasId {
  fn id(&self) -> &str;
}

impl<T: HasId> Relation<T> {
  pub fn id(&self) -> &str {
    match self {
      Relation::Id(id) => id,
      Relation::Doc(doc) => doc.id(),
    }
  }

  pub fn doc(&self) -> Option<&T> {
    match self {
      Relation::Id(_) => None,
      Relation::Doc(doc) => Some(doc),
    }
  }
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub abbreviation: Option<String>,
  #[serde(default)]
  pub sport: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
  Scheduled,
  InProgress,
  Final,
  Postponed,
  Cancelled,
}

impl GameStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      GameStatus::Scheduled => "scheduled",
      GameStatus::InProgress => "in_progress",
      GameStatus::Final => "final",
      GameStatus::Postponed => "postponed",
      GameStatus::Cancelled => "cancelled",
    }
  }
}

impl std::str::FromStr for GameStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "scheduled" => Ok(GameStatus::Scheduled),
      "in_progress" | "live" => Ok(GameStatus::InProgress),
      "final" => Ok(GameStatus::Final),
      "postponed" => Ok(GameStatus::Postponed),
      "cancelled" | "canceled" => Ok(GameStatus::Cancelled),
      other => Err(format!("unknown game status: {}", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
  pub id: String,
  pub league: Relation<League>,
  pub home_team: String,
  pub away_team: String,
  pub start_time: DateTime<Utc>,
  pub status: GameStatus,
  #[serde(default)]
  pub home_score: Option<u32>,
  #[serde(default)]
  pub away_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOdds {
  pub id: String,
  pub game: Relation<Game>,
  #[serde(default)]
  pub home_moneyline: Option<i32>,
  #[serde(default)]
  pub away_moneyline: Option<i32>,
  #[serde(default)]
  pub spread: Option<f64>,
  #[serde(default)]
  pub total: Option<f64>,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

/// Game with its active odds joined server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketGame {
  #[serde(flatten)]
  pub game: Game,
  #[serde(default)]
  pub odds: Option<GameOdds>,
}

/// Response of the market endpoint.
#[derive(Debug, Deserialize)]
pub struct MarketGamesResponse {
  #[serde(default)]
  pub games: Vec<MarketGame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub league: Option<Relation<League>>,
  #[serde(default)]
  pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
}

/// A user's membership in a pool; leaderboard rows are memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMember {
  pub id: String,
  pub pool: Relation<Pool>,
  pub user: Relation<User>,
  #[serde(default)]
  pub score: f64,
  #[serde(default)]
  pub rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
  pub id: String,
  pub user_id: String,
  pub game: Relation<Game>,
  #[serde(default)]
  pub pool: Option<Relation<Pool>>,
  pub pick: String,
  #[serde(default)]
  pub amount: f64,
  #[serde(default)]
  pub odds: Option<i32>,
  #[serde(default)]
  pub status: Option<String>,
  pub created_at: DateTime<Utc>,
}

macro_rules! impl_has_id {
  ($($ty:ty),*) => {
    $(impl HasId for $ty {
      fn id(&self) -> &str {
        &self.id
      }
    })*
  };
}

impl_has_id!(League, Game, GameOdds, Pool, User, PoolMember, Bet);

impl HasId for MarketGame {
  fn id(&self) -> &str {
    &self.game.id
  }
}

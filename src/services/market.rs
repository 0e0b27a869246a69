//! Games pre-joined with their active odds, in one call.
//!
//! The market endpoint takes flat parameters (`leagueID`, `status`,
//! `oddsAvailable`, `limit`) instead of the nested `where` dialect.

use color_eyre::Result;
use serde::Serialize;

use crate::api::filters::join_pairs;
use crate::api::types::{GameStatus, MarketGame, MarketGamesResponse};
use crate::api::ApiClient;

pub const MARKET_GAMES_PATH: &str = "/api/market/games";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub league_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<GameStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub odds_available: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
}

impl MarketFilters {
  /// Flat query string; absent filters are left out.
  pub fn encode(&self) -> String {
    let mut pairs = Vec::new();
    if let Some(league_id) = &self.league_id {
      pairs.push(("leagueID".to_string(), league_id.clone()));
    }
    if let Some(status) = self.status {
      pairs.push(("status".to_string(), status.as_str().to_string()));
    }
    if let Some(odds_available) = self.odds_available {
      pairs.push(("oddsAvailable".to_string(), odds_available.to_string()));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit".to_string(), limit.to_string()));
    }
    join_pairs(&pairs)
  }
}

pub async fn get_market_games(api: &ApiClient, filters: &MarketFilters) -> Result<Vec<MarketGame>> {
  let response: MarketGamesResponse = api.get(MARKET_GAMES_PATH, &filters.encode()).await?;
  Ok(response.games)
}

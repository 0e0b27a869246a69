use color_eyre::Result;

use crate::api::filters::DocumentQuery;
use crate::api::types::{GameOdds, Paginated};
use crate::api::ApiClient;

pub const ODDS_PATH: &str = "/api/game-odds";

/// Upper bound on odds rows fetched for one game.
const ODDS_LIMIT: u32 = 100;

pub fn odds_query(game_id: &str) -> DocumentQuery {
  DocumentQuery::new()
    .equals("game", game_id)
    .limit(Some(ODDS_LIMIT))
    .depth(0)
}

/// Every odds row recorded for a game.
pub async fn get_game_odds(api: &ApiClient, game_id: &str) -> Result<Vec<GameOdds>> {
  let page: Paginated<GameOdds> = api
    .get(ODDS_PATH, &odds_query(game_id).to_query_string())
    .await?;
  Ok(page.docs)
}

/// The active odds for a game, `None` when no row is flagged active.
pub async fn get_active_odds(api: &ApiClient, game_id: &str) -> Result<Option<GameOdds>> {
  Ok(pick_active(get_game_odds(api, game_id).await?))
}

/// First active entry in response order.
pub fn pick_active(odds: Vec<GameOdds>) -> Option<GameOdds> {
  odds.into_iter().find(|o| o.is_active)
}

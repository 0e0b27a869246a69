use tracing::warn;

use crate::api::filters::DocumentQuery;
use crate::api::types::{Bet, Paginated};
use crate::api::ApiClient;

pub const BETS_PATH: &str = "/api/bets";

const USER_BETS_LIMIT: u32 = 100;

pub fn user_bets_query(user_id: &str) -> DocumentQuery {
  DocumentQuery::new()
    .equals("userId", user_id)
    .limit(Some(USER_BETS_LIMIT))
    .sort("-createdAt")
    .depth(1)
}

/// A user's most recent bets.
///
/// Best effort: any failure is logged and yields an empty list, so a
/// flaky bets endpoint never blocks the screens that show them.
pub async fn get_user_bets(api: &ApiClient, user_id: &str) -> Vec<Bet> {
  let query = user_bets_query(user_id).to_query_string();

  match api.get::<Paginated<Bet>>(BETS_PATH, &query).await {
    Ok(page) => page.docs,
    Err(e) => {
      warn!(user_id, error = %e, "Failed to fetch bets, showing none");
      Vec::new()
    }
  }
}

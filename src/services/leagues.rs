use color_eyre::Result;

use crate::api::filters::DocumentQuery;
use crate::api::types::{League, Paginated};
use crate::api::ApiClient;

pub const LEAGUES_PATH: &str = "/api/leagues";

pub fn leagues_query() -> DocumentQuery {
  DocumentQuery::new().limit(Some(100)).sort("name").depth(0)
}

/// All leagues, alphabetical.
pub async fn get_leagues(api: &ApiClient) -> Result<Vec<League>> {
  let page: Paginated<League> = api
    .get(LEAGUES_PATH, &leagues_query().to_query_string())
    .await?;
  Ok(page.docs)
}

//! Pools, memberships and leaderboards.
//!
//! Leaderboard rows are pool memberships ordered by score.

use color_eyre::Result;
use serde::Serialize;

use crate::api::filters::DocumentQuery;
use crate::api::types::{Paginated, Pool, PoolMember};
use crate::api::ApiClient;

pub const POOLS_PATH: &str = "/api/pools";
pub const POOL_MEMBERS_PATH: &str = "/api/pool-members";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub league: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
}

impl PoolFilters {
  pub fn to_query(&self) -> DocumentQuery {
    DocumentQuery::new()
      .equals_opt("league", self.league.as_deref())
      .equals_opt("is_active", self.active)
      .page(self.page)
      .limit(self.limit)
      .sort("name")
      .depth(1)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardFilters {
  /// Restrict to one pool; without it, rank across all active pools
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pool_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
}

impl LeaderboardFilters {
  /// Highest score first, always.
  pub fn to_query(&self) -> DocumentQuery {
    let query = match &self.pool_id {
      Some(pool_id) => DocumentQuery::new().equals("pool", pool_id),
      None => DocumentQuery::new().equals("pool.is_active", true),
    };

    query
      .page(self.page)
      .limit(self.limit)
      .sort("-score")
      .depth(1)
  }
}

pub fn membership_query(pool_id: &str, user_id: &str) -> DocumentQuery {
  DocumentQuery::new()
    .equals("pool", pool_id)
    .equals("user", user_id)
    .limit(Some(1))
    .depth(1)
}

pub async fn get_pools(api: &ApiClient, filters: &PoolFilters) -> Result<Paginated<Pool>> {
  api
    .get(POOLS_PATH, &filters.to_query().to_query_string())
    .await
}

/// The user's membership in a pool, `None` when they have not joined.
pub async fn get_pool_membership(
  api: &ApiClient,
  pool_id: &str,
  user_id: &str,
) -> Result<Option<PoolMember>> {
  let page: Paginated<PoolMember> = api
    .get(
      POOL_MEMBERS_PATH,
      &membership_query(pool_id, user_id).to_query_string(),
    )
    .await?;
  Ok(page.docs.into_iter().next())
}

pub async fn get_leaderboard(
  api: &ApiClient,
  filters: &LeaderboardFilters,
) -> Result<Paginated<PoolMember>> {
  api
    .get(POOL_MEMBERS_PATH, &filters.to_query().to_query_string())
    .await
}

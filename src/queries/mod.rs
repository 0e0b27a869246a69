//! Query hooks: one cached, conditionally enabled query per service call.
//!
//! Staleness windows follow how often the data changes:
//! - user-specific bets and memberships: 30 seconds
//! - games, odds, market data and leaderboards: 2 minutes
//! - leagues and pools: 10 minutes

pub mod keys;

use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::api::filters::GameFilters;
use crate::api::types::{Bet, Game, GameOdds, League, MarketGame, Paginated, Pool, PoolMember};
use crate::api::ApiClient;
use crate::cache::QueryCache;
use crate::query::{Query, Request};
use crate::services::market::MarketFilters;
use crate::services::pools::{LeaderboardFilters, PoolFilters};
use crate::services::{bets, games, leagues, market, odds, pools};
use crate::session::SessionSource;

pub use keys::ApiQueryKey;

pub const USER_DATA_STALE: Duration = Duration::from_secs(30);
pub const LIVE_DATA_STALE: Duration = Duration::from_secs(2 * 60);
pub const REFERENCE_DATA_STALE: Duration = Duration::from_secs(10 * 60);

/// Builds queries that share one API client, cache and session.
#[derive(Clone)]
pub struct QueryClient {
  api: ApiClient,
  cache: QueryCache,
  session: Arc<dyn SessionSource>,
}

impl QueryClient {
  pub fn new(api: ApiClient, cache: QueryCache, session: Arc<dyn SessionSource>) -> Self {
    Self {
      api,
      cache,
      session,
    }
  }

  /// Pair a key with a fetch against this client's API.
  fn request<T, F, Fut>(&self, key: ApiQueryKey, fetch: F) -> Request<T>
  where
    T: 'static,
    F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let api = self.api.clone();
    Request::new(key, move || fetch(api.clone()))
  }

  pub fn games(&self, filters: GameFilters) -> Query<Paginated<Game>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      let filters = filters.clone();
      Some(client.request(ApiQueryKey::Games(filters.clone()), move |api| {
        let filters = filters.clone();
        async move { games::get_games(&api, &filters).await }
      }))
    })
    .with_stale_time(LIVE_DATA_STALE)
  }

  /// Disabled until a game id is given.
  pub fn game(&self, id: Option<String>) -> Query<Game> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      let id = id.clone()?;
      Some(client.request(ApiQueryKey::Game { id: id.clone() }, move |api| {
        let id = id.clone();
        async move { games::get_game(&api, &id).await }
      }))
    })
    .with_stale_time(LIVE_DATA_STALE)
  }

  /// Disabled until a game id is given.
  pub fn active_odds(&self, game_id: Option<String>) -> Query<Option<GameOdds>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      let game_id = game_id.clone()?;
      let key = ApiQueryKey::ActiveOdds {
        game_id: game_id.clone(),
      };
      Some(client.request(key, move |api| {
        let game_id = game_id.clone();
        async move { odds::get_active_odds(&api, &game_id).await }
      }))
    })
    .with_stale_time(LIVE_DATA_STALE)
  }

  /// Disabled until a league is selected.
  pub fn market_games(&self, filters: MarketFilters) -> Query<Vec<MarketGame>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      filters.league_id.as_ref()?;
      let filters = filters.clone();
      Some(client.request(ApiQueryKey::MarketGames(filters.clone()), move |api| {
        let filters = filters.clone();
        async move { market::get_market_games(&api, &filters).await }
      }))
    })
    .with_stale_time(LIVE_DATA_STALE)
  }

  pub fn leagues(&self) -> Query<Vec<League>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      Some(client.request(ApiQueryKey::Leagues, |api| async move {
        leagues::get_leagues(&api).await
      }))
    })
    .with_stale_time(REFERENCE_DATA_STALE)
  }

  pub fn pools(&self, filters: PoolFilters) -> Query<Paginated<Pool>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      let filters = filters.clone();
      Some(client.request(ApiQueryKey::Pools(filters.clone()), move |api| {
        let filters = filters.clone();
        async move { pools::get_pools(&api, &filters).await }
      }))
    })
    .with_stale_time(REFERENCE_DATA_STALE)
  }

  pub fn leaderboard(&self, filters: LeaderboardFilters) -> Query<Paginated<PoolMember>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      let filters = filters.clone();
      Some(client.request(ApiQueryKey::Leaderboard(filters.clone()), move |api| {
        let filters = filters.clone();
        async move { pools::get_leaderboard(&api, &filters).await }
      }))
    })
    .with_stale_time(LIVE_DATA_STALE)
  }

  /// The signed-in user's membership in a pool.
  ///
  /// Disabled while the session is pending or signed out, or without a pool.
  pub fn pool_membership(&self, pool_id: Option<String>) -> Query<Option<PoolMember>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      let user_id = client.session.user_id()?;
      let pool_id = pool_id.clone()?;
      let key = ApiQueryKey::PoolMembership {
        pool_id: pool_id.clone(),
        user_id: user_id.clone(),
      };
      Some(client.request(key, move |api| {
        let pool_id = pool_id.clone();
        let user_id = user_id.clone();
        async move { pools::get_pool_membership(&api, &pool_id, &user_id).await }
      }))
    })
    .with_stale_time(USER_DATA_STALE)
  }

  /// The signed-in user's recent bets; never errors, see [`bets::get_user_bets`].
  pub fn user_bets(&self) -> Query<Vec<Bet>> {
    let client = self.clone();
    Query::new(self.cache.clone(), move || {
      let user_id = client.session.user_id()?;
      let key = ApiQueryKey::UserBets {
        user_id: user_id.clone(),
      };
      Some(client.request(key, move |api| {
        let user_id = user_id.clone();
        async move { Ok(bets::get_user_bets(&api, &user_id).await) }
      }))
    })
    .with_stale_time(USER_DATA_STALE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::QueryState;
  use crate::services::testing::{envelope, game};
  use crate::session::{Session, SessionHandle, SessionState};
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const TICK: Duration = Duration::from_millis(5);

  fn client(server: &MockServer, session: SessionHandle, retries: u32) -> QueryClient {
    QueryClient::new(
      ApiClient::with_base_url(&server.uri()),
      QueryCache::new(retries),
      Arc::new(session),
    )
  }

  async fn settle<T: Clone + Send + Sync + 'static>(query: &mut Query<T>) {
    tokio::time::timeout(Duration::from_secs(5), query.wait(TICK))
      .await
      .expect("query did not settle");
  }

  #[tokio::test]
  async fn test_user_bets_waits_for_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path(bets::BETS_PATH))
      .and(query_param("where[userId][equals]", "u1"))
      .and(query_param("limit", "100"))
      .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![])))
      .expect(1)
      .mount(&server)
      .await;

    let session = SessionHandle::pending();
    let queries = client(&server, session.clone(), 1);
    let mut query = queries.user_bets();

    query.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    query.poll();
    assert!(query.is_idle());
    assert!(query.error().is_none());
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);

    session.set(SessionState::Ready(Some(Session {
      user_id: "u1".to_string(),
      email: None,
    })));
    query.fetch();
    settle(&mut query).await;

    assert_eq!(query.data(), Some(&Vec::new()));
  }

  #[tokio::test]
  async fn test_user_bets_failure_resolves_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path(bets::BETS_PATH))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let queries = client(&server, SessionHandle::ready(Some("u1".to_string())), 1);
    let mut query = queries.user_bets();

    query.fetch();
    settle(&mut query).await;

    assert!(matches!(query.state(), QueryState::Success(placed) if placed.is_empty()));
  }

  #[tokio::test]
  async fn test_market_games_disabled_without_league() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "games": [] })))
      .expect(0)
      .mount(&server)
      .await;

    let queries = client(&server, SessionHandle::pending(), 1);
    let mut query = queries.market_games(MarketFilters {
      odds_available: Some(true),
      ..Default::default()
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!query.poll());
    assert!(query.is_idle());
  }

  #[tokio::test]
  async fn test_identical_queries_share_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path(games::GAMES_PATH))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(envelope(vec![game("g1", "nfl")]))
          .set_delay(Duration::from_millis(30)),
      )
      .expect(1)
      .mount(&server)
      .await;

    let queries = client(&server, SessionHandle::pending(), 1);
    let filters = GameFilters {
      league: Some("nfl".to_string()),
      ..Default::default()
    };
    let mut first = queries.games(filters.clone());
    let mut second = queries.games(filters);

    first.fetch();
    second.fetch();
    settle(&mut first).await;
    settle(&mut second).await;

    assert_eq!(first.data().map(|p| p.docs.len()), Some(1));
    assert_eq!(second.data(), first.data());
  }

  #[tokio::test]
  async fn test_failed_fetch_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/games/g1"))
      .respond_with(ResponseTemplate::new(502))
      .up_to_n_times(1)
      .with_priority(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/games/g1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(game("g1", "nfl")))
      .mount(&server)
      .await;

    let queries = client(&server, SessionHandle::pending(), 1);
    let mut query = queries.game(Some("g1".to_string()));

    query.fetch();
    settle(&mut query).await;

    assert_eq!(query.data().map(|g| g.id.as_str()), Some("g1"));
  }

  #[tokio::test]
  async fn test_persistent_failure_is_error_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path(leagues::LEAGUES_PATH))
      .respond_with(ResponseTemplate::new(503))
      .expect(2)
      .mount(&server)
      .await;

    let queries = client(&server, SessionHandle::pending(), 1);
    let mut query = queries.leagues();

    query.fetch();
    settle(&mut query).await;

    assert!(query.is_error());
    assert!(query.error().unwrap_or_default().contains("503"));
  }

  #[tokio::test]
  async fn test_membership_needs_user_and_pool() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![])))
      .expect(1)
      .mount(&server)
      .await;

    let signed_out = client(&server, SessionHandle::ready(None), 1);
    let mut query = signed_out.pool_membership(Some("p1".to_string()));
    query.fetch();
    assert!(query.is_idle());

    let signed_in = client(&server, SessionHandle::ready(Some("u1".to_string())), 1);
    let mut query = signed_in.pool_membership(None);
    query.fetch();
    assert!(query.is_idle());

    let mut query = signed_in.pool_membership(Some("p1".to_string()));
    query.fetch();
    settle(&mut query).await;
    assert!(matches!(query.state(), QueryState::Success(None)));
  }

  #[test]
  fn test_hook_staleness_windows() {
    let queries = QueryClient::new(
      ApiClient::with_base_url("http://localhost:3000"),
      QueryCache::new(1),
      Arc::new(SessionHandle::pending()),
    );

    assert_eq!(queries.user_bets().stale_time(), USER_DATA_STALE);
    assert_eq!(queries.pool_membership(None).stale_time(), USER_DATA_STALE);
    assert_eq!(queries.games(GameFilters::default()).stale_time(), LIVE_DATA_STALE);
    assert_eq!(queries.active_odds(None).stale_time(), LIVE_DATA_STALE);
    assert_eq!(
      queries.leaderboard(LeaderboardFilters::default()).stale_time(),
      LIVE_DATA_STALE
    );
    assert_eq!(queries.leagues().stale_time(), REFERENCE_DATA_STALE);
    assert_eq!(queries.pools(PoolFilters::default()).stale_time(), REFERENCE_DATA_STALE);
  }
}

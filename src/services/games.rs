use color_eyre::Result;

use crate::api::filters::GameFilters;
use crate::api::types::{Game, Paginated};
use crate::api::ApiClient;

pub const GAMES_PATH: &str = "/api/games";

/// Page of games matching `filters`, envelope included.
pub async fn get_games(api: &ApiClient, filters: &GameFilters) -> Result<Paginated<Game>> {
  api.get(GAMES_PATH, &filters.encode()).await
}

/// Single game with its relations expanded.
pub async fn get_game(api: &ApiClient, id: &str) -> Result<Game> {
  api.get(&format!("{}/{}", GAMES_PATH, id), "depth=2").await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::services::testing::{envelope, game};
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, Request, ResponseTemplate};

  #[tokio::test]
  async fn test_get_games_returns_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path(GAMES_PATH))
      .and(query_param("where[league][equals]", "nfl"))
      .and(query_param("page", "1"))
      .and(query_param("limit", "10"))
      .and(query_param("sort", "-startTime"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(envelope(vec![game("g1", "nfl"), game("g2", "nfl")])),
      )
      .expect(1)
      .mount(&server)
      .await;

    let api = ApiClient::with_base_url(&server.uri());
    let filters = GameFilters {
      league: Some("nfl".to_string()),
      ..Default::default()
    };
    let page = get_games(&api, &filters).await.unwrap();

    assert_eq!(page.docs.len(), 2);
    assert_eq!(page.total_docs, 2);
    assert_eq!(page.docs[1].id, "g2");
  }

  #[tokio::test]
  async fn test_get_games_without_filters_sends_no_where() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path(GAMES_PATH))
      .and(|req: &Request| !req.url.query().unwrap_or_default().contains("where"))
      .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![])))
      .expect(1)
      .mount(&server)
      .await;

    let api = ApiClient::with_base_url(&server.uri());
    let page = get_games(&api, &GameFilters::default()).await.unwrap();
    assert!(page.docs.is_empty());
  }

  #[tokio::test]
  async fn test_get_game_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/games/g7"))
      .and(query_param("depth", "2"))
      .respond_with(ResponseTemplate::new(200).set_body_json(game("g7", "nba")))
      .mount(&server)
      .await;

    let api = ApiClient::with_base_url(&server.uri());
    let game = get_game(&api, "g7").await.unwrap();
    assert_eq!(game.id, "g7");
    assert_eq!(game.league.id(), "nba");
  }

  #[tokio::test]
  async fn test_get_game_propagates_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let api = ApiClient::with_base_url(&server.uri());
    assert!(get_game(&api, "missing").await.is_err());
  }
}

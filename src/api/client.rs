use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// HTTP client for the betting pool REST API.
///
/// Query strings are appended verbatim: the API expects literal bracket
/// notation, so callers hand over an already-built string.
#[derive(Debug, Clone)]
pub struct ApiClient {
  http: Client,
  base_url: String,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.api.url.trim_end_matches('/').to_string(),
      token: Config::get_api_token(),
    })
  }

  /// Client against an explicit base URL, without credentials.
  #[cfg(test)]
  pub fn with_base_url(base_url: &str) -> Self {
    Self {
      http: Client::new(),
      base_url: base_url.trim_end_matches('/').to_string(),
      token: None,
    }
  }

  /// GET `path?query` and decode the JSON body.
  ///
  /// Fails on transport errors, non-2xx statuses and malformed JSON.
  pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
    let url = if query.is_empty() {
      format!("{}{}", self.base_url, path)
    } else {
      format!("{}{}?{}", self.base_url, path, query)
    };
    debug!(%url, "GET");

    let mut request = self.http.get(&url);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", path, e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!("GET {} returned {}: {}", path, status, body));
    }

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }
}

//! Encoding of typed filters into the remote document-query dialect.
//!
//! The API accepts nested constraints in bracket notation and expects the
//! brackets literally, so nothing here percent-encodes:
//!
//! ```text
//! where[league][equals]=nfl&where[startTime][greater_than_equal]=2024-09-01T00:00:00.000Z&page=1&limit=10
//! ```
//!
//! Nested field paths use dot notation inside a single bracket segment
//! (`where[pool.is_active][equals]=true`).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::GameStatus;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Field that carries a game's kickoff time.
const START_TIME_FIELD: &str = "startTime";

/// Constraint on a single field. Unset operators are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Condition {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub equals: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub greater_than_equal: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub less_than_equal: Option<String>,
}

/// Field path -> condition.
pub type Where = BTreeMap<String, Condition>;

/// Query in the remote document dialect.
///
/// `where` is left out of the serialized form when no constraint has been
/// added; the API treats `where={}` differently from a missing `where`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentQuery {
  #[serde(rename = "where", skip_serializing_if = "BTreeMap::is_empty")]
  pub where_: Where,
  pub page: u32,
  pub limit: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub depth: Option<u8>,
}

impl Default for DocumentQuery {
  fn default() -> Self {
    Self {
      where_: Where::new(),
      page: DEFAULT_PAGE,
      limit: DEFAULT_LIMIT,
      sort: None,
      depth: None,
    }
  }
}

impl DocumentQuery {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add `where.<field>.equals = value`.
  pub fn equals(mut self, field: &str, value: impl std::fmt::Display) -> Self {
    self.condition(field).equals = Some(value.to_string());
    self
  }

  /// Add an equality constraint only when a value is present.
  pub fn equals_opt<V: std::fmt::Display>(self, field: &str, value: Option<V>) -> Self {
    match value {
      Some(v) => self.equals(field, v),
      None => self,
    }
  }

  /// Lower bound, merged into any existing condition on `field`.
  pub fn at_least(mut self, field: &str, value: impl std::fmt::Display) -> Self {
    self.condition(field).greater_than_equal = Some(value.to_string());
    self
  }

  /// Upper bound, merged into any existing condition on `field`.
  pub fn at_most(mut self, field: &str, value: impl std::fmt::Display) -> Self {
    self.condition(field).less_than_equal = Some(value.to_string());
    self
  }

  /// Keep the default page unless one is given.
  pub fn page(mut self, page: Option<u32>) -> Self {
    if let Some(p) = page {
      self.page = p;
    }
    self
  }

  /// Keep the default limit unless one is given.
  pub fn limit(mut self, limit: Option<u32>) -> Self {
    if let Some(l) = limit {
      self.limit = l;
    }
    self
  }

  /// Sort field; a leading `-` sorts descending.
  pub fn sort(mut self, sort: &str) -> Self {
    self.sort = Some(sort.to_string());
    self
  }

  /// Relational-expansion depth.
  pub fn depth(mut self, depth: u8) -> Self {
    self.depth = Some(depth);
    self
  }

  fn condition(&mut self, field: &str) -> &mut Condition {
    self.where_.entry(field.to_string()).or_default()
  }

  /// The `where` mapping as JSON, `Value::Null` when there are no constraints.
  pub fn where_value(&self) -> Value {
    if self.where_.is_empty() {
      return Value::Null;
    }
    serde_json::to_value(&self.where_).unwrap_or(Value::Null)
  }

  /// Serialize to a query string without percent-encoding.
  ///
  /// Order is fixed: `where` clauses by field name, then `page`, `limit`,
  /// `sort` and `depth`.
  pub fn to_query_string(&self) -> String {
    let mut pairs = Vec::new();

    for (field, condition) in &self.where_ {
      for (operator, value) in condition.operators() {
        pairs.push((format!("where[{}][{}]", field, operator), value.to_string()));
      }
    }

    pairs.push(("page".to_string(), self.page.to_string()));
    pairs.push(("limit".to_string(), self.limit.to_string()));
    if let Some(sort) = &self.sort {
      pairs.push(("sort".to_string(), sort.clone()));
    }
    if let Some(depth) = self.depth {
      pairs.push(("depth".to_string(), depth.to_string()));
    }

    join_pairs(&pairs)
  }
}

impl Condition {
  /// Set operators in wire order.
  fn operators(&self) -> impl Iterator<Item = (&'static str, &str)> {
    [
      ("equals", self.equals.as_deref()),
      ("greater_than_equal", self.greater_than_equal.as_deref()),
      ("less_than_equal", self.less_than_equal.as_deref()),
    ]
    .into_iter()
    .filter_map(|(op, value)| value.map(|v| (op, v)))
  }
}

/// Filters accepted by the games listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub league: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<GameStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start_time_after: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start_time_before: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
}

impl GameFilters {
  /// Build the games query: most recent kickoff first, leagues expanded.
  pub fn to_query(&self) -> DocumentQuery {
    let mut query = DocumentQuery::new()
      .equals_opt("league", self.league.as_deref())
      .equals_opt("status", self.status.map(|s| s.as_str()))
      .page(self.page)
      .limit(self.limit)
      .sort("-startTime")
      .depth(1);

    if let Some(after) = self.start_time_after {
      query = query.at_least(START_TIME_FIELD, format_timestamp(&after));
    }
    if let Some(before) = self.start_time_before {
      query = query.at_most(START_TIME_FIELD, format_timestamp(&before));
    }

    query
  }

  pub fn encode(&self) -> String {
    self.to_query().to_query_string()
  }
}

/// RFC 3339 in UTC with a `Z` suffix, so no `+` ends up in the query string.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Join `key=value` pairs with `&`, leaving both sides as they are.
pub fn join_pairs(pairs: &[(String, String)]) -> String {
  pairs
    .iter()
    .map(|(k, v)| format!("{}={}", k, v))
    .collect::<Vec<_>>()
    .join("&")
}

/// Parse a bracket-notation query string back into a nested JSON object.
///
/// All leaves come back as strings, since that is all the wire carries.
pub fn parse_query(query: &str) -> Value {
  let mut root = Map::new();

  for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
    let segments = split_key(&key);
    insert_path(&mut root, &segments, value.into_owned());
  }

  Value::Object(root)
}

/// `where[pool.is_active][equals]` -> `["where", "pool.is_active", "equals"]`
fn split_key(key: &str) -> Vec<String> {
  let (head, mut rest) = match key.find('[') {
    Some(idx) => (&key[..idx], &key[idx..]),
    None => return vec![key.to_string()],
  };

  let mut segments = vec![head.to_string()];
  while let Some(stripped) = rest.strip_prefix('[') {
    match stripped.find(']') {
      Some(end) => {
        segments.push(stripped[..end].to_string());
        rest = &stripped[end + 1..];
      }
      None => {
        segments.push(stripped.to_string());
        break;
      }
    }
  }

  segments
}

fn insert_path(map: &mut Map<String, Value>, segments: &[String], value: String) {
  let Some((first, rest)) = segments.split_first() else {
    return;
  };

  if rest.is_empty() {
    map.insert(first.clone(), Value::String(value));
    return;
  }

  let child = map
    .entry(first.clone())
    .or_insert_with(|| Value::Object(Map::new()));
  if !child.is_object() {
    *child = Value::Object(Map::new());
  }
  if let Value::Object(child_map) = child {
    insert_path(child_map, rest, value);
  }
}

//! REST API access: HTTP client, wire types and the query dialect encoder.

pub mod client;
pub mod filters;
pub mod types;

pub use client::ApiClient;

//! Data layer for a sports betting pool API.
//!
//! - [`api`]: HTTP client, document types and the filter encoder
//! - [`services`]: one function per remote read
//! - [`cache`] and [`query`]: request cache and query state machine
//! - [`queries`]: cached, conditionally enabled queries per service
//! - [`session`] and [`db`]: session state and the local onboarding flag

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod queries;
pub mod query;
pub mod services;
pub mod session;

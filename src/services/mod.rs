//! Service functions: one remote read each.
//!
//! Every function encodes its filters, issues a single GET through
//! [`ApiClient`](crate::api::ApiClient) and reshapes the response. Failures
//! propagate to the caller; the only exception is
//! [`bets::get_user_bets`], which falls back to an empty list.

pub mod bets;
pub mod games;
pub mod leagues;
pub mod market;
pub mod odds;
pub mod pools;

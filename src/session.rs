//! Session state consumed by user-scoped queries.
//!
//! Authentication itself happens elsewhere; this only tracks whether a
//! session has been resolved and which user it belongs to.

use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub user_id: String,
  pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  /// Session lookup still in progress
  Pending,
  /// Lookup finished; `None` when nobody is signed in
  Ready(Option<Session>),
}

/// Source of the current session.
pub trait SessionSource: Send + Sync {
  fn state(&self) -> SessionState;

  /// User id of a ready session, `None` while pending or signed out.
  fn user_id(&self) -> Option<String> {
    match self.state() {
      SessionState::Ready(Some(session)) => Some(session.user_id),
      _ => None,
    }
  }
}

/// Shared, mutable session state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
  state: Arc<RwLock<SessionState>>,
}

impl SessionHandle {
  pub fn pending() -> Self {
    Self {
      state: Arc::new(RwLock::new(SessionState::Pending)),
    }
  }

  /// A resolved session for `user_id`, or a signed-out one.
  pub fn ready(user_id: Option<String>) -> Self {
    let handle = Self::pending();
    handle.set(SessionState::Ready(user_id.map(|user_id| Session {
      user_id,
      email: None,
    })));
    handle
  }

  pub fn set(&self, state: SessionState) {
    if let Ok(mut guard) = self.state.write() {
      *guard = state;
    }
  }
}

impl SessionSource for SessionHandle {
  fn state(&self) -> SessionState {
    self
      .state
      .read()
      .map(|s| s.clone())
      .unwrap_or(SessionState::Pending)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_user_id_only_when_ready() {
    let session = SessionHandle::pending();
    assert_eq!(session.user_id(), None);

    session.set(SessionState::Ready(None));
    assert_eq!(session.user_id(), None);

    session.set(SessionState::Ready(Some(Session {
      user_id: "u1".to_string(),
      email: Some("u1@example.com".to_string()),
    })));
    assert_eq!(session.user_id().as_deref(), Some("u1"));
  }

  #[test]
  fn test_clones_share_state() {
    let session = SessionHandle::pending();
    let observer = session.clone();

    session.set(SessionState::Ready(Some(Session {
      user_id: "u2".to_string(),
      email: None,
    })));
    assert_eq!(observer.user_id().as_deref(), Some("u2"));
  }
}

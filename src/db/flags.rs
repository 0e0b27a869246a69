//! Onboarding flag, stored as `"true"`/`"false"` under a fixed key.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::Database;

pub const ONBOARDING_KEY: &str = "hasCompletedOnboarding";

pub struct OnboardingFlag {
  db: Database,
}

impl OnboardingFlag {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  /// Whether onboarding has been completed. Unset reads as `false`.
  pub fn get(&self) -> Result<bool> {
    let value: Option<String> = self
      .db
      .conn()
      .query_row(
        "SELECT value FROM flags WHERE key = ?",
        params![ONBOARDING_KEY],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read flag {}: {}", ONBOARDING_KEY, e))?;

    Ok(value.as_deref() == Some("true"))
  }

  pub fn set(&self, completed: bool) -> Result<()> {
    debug!(completed, "Storing onboarding flag");
    self
      .db
      .conn()
      .execute(
        "INSERT OR REPLACE INTO flags (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![ONBOARDING_KEY, completed.to_string()],
      )
      .map_err(|e| eyre!("Failed to store flag {}: {}", ONBOARDING_KEY, e))?;
    Ok(())
  }

  pub fn clear(&self) -> Result<()> {
    self
      .db
      .conn()
      .execute("DELETE FROM flags WHERE key = ?", params![ONBOARDING_KEY])
      .map_err(|e| eyre!("Failed to clear flag {}: {}", ONBOARDING_KEY, e))?;
    Ok(())
  }
}

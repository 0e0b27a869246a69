pub mod flags;
pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;

/// Local SQLite database holding client-side flags
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open `flags.db` in the data dir, creating it on first use
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create {}: {}", parent.display(), e))?;
    }
    debug!(path = %path.display(), "Opening flag store");

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Private in-memory database
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let db = Self { conn };
    db.run_migrations()?;
    Ok(db)
  }

  fn default_path() -> Result<PathBuf> {
    Ok(Config::data_dir()?.join("flags.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    self
      .conn
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to create flags table: {}", e))?;
    Ok(())
  }

  pub fn conn(&self) -> &Connection {
    &self.conn
  }
}

use crate::execution::fyers_auth::Session;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Today's broker session on disk, so repeated runs skip the login flow.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The cached session if it was issued on `today`. An unreadable cache
    /// is treated as absent.
    pub fn load_current(&self, today: NaiveDate) -> Option<Session> {
        let json = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<Session>(&json) {
            Ok(session) if session.is_current(today) => {
                info!(client_id = %session.client_id, "Reusing today's broker session");
                Some(session)
            }
            Ok(session) => {
                debug!(created_on = %session.created_on, "Cached session is stale");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring corrupt session cache: {e}");
                None
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(session).context("Failed to serialise session")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session to {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete {}", self.path.display()))?;
        }
        Ok(())
    }
}

//! Session state between invocations
//!
//! Stored in `~/.sqlpane/session.json`: the active named connection and the
//! last query run. Conversion to and from JSON is kept separate from the
//! file I/O so it can be tested without touching the home directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cli::config::sqlpane_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_query: Option<String>,
}

pub fn session_path() -> PathBuf {
    sqlpane_home().join("session.json")
}

impl Session {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(content)?)
    }

    /// Load from `path`; a missing or unreadable session starts fresh.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match Self::from_json(&content) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable session file: {}", err);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write session file {}", path.display()))
    }

    pub fn load() -> Self {
        Self::load_from(&session_path())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&session_path())
    }
}

//! Configuration for sqlpane
//!
//! Named connections and asset options live in `~/.sqlpane/config.toml`
//! (`$SQLPANE_HOME/config.toml` when set):
//!
//! ```toml
//! default_connection = "local"
//!
//! [[connections]]
//! name = "local"
//! url = "sqlite:./game.db"
//!
//! [assets]
//! auto_register = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use sqlpane_logging::sqlpane_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_connection: Option<String>,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Register unknown asset paths on first sight instead of decoding them
    /// as missing
    #[serde(default = "default_auto_register")]
    pub auto_register: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            auto_register: default_auto_register(),
        }
    }
}

fn default_auto_register() -> bool {
    true
}

pub fn config_path() -> PathBuf {
    sqlpane_home().join("config.toml")
}

impl Config {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file is an empty config.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionEntry> {
        self.connections.iter().find(|c| c.name == name)
    }

    pub fn connection_names(&self) -> Vec<String> {
        self.connections.iter().map(|c| c.name.clone()).collect()
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (i, entry) in self.connections.iter().enumerate() {
            if self.connections[..i].iter().any(|c| c.name == entry.name) {
                anyhow::bail!("connection '{}' is defined twice", entry.name);
            }
        }
        if let Some(default) = &self.default_connection {
            if self.connection(default).is_none() {
                anyhow::bail!("default_connection '{}' is not defined", default);
            }
        }
        Ok(())
    }
}

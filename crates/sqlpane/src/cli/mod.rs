//! CLI module for sqlpane
//!
//! Each command module exposes plain functions over an open [`Database`];
//! `main.rs` owns argument parsing and dispatch.

pub mod config;
pub mod connections;
pub mod error;
pub mod output;
pub mod query;
pub mod rows;
pub mod schema;
pub mod session;

use std::sync::Arc;

use sqlpane_db::{AssetRegistry, ConnectionConfig, Database};
use tracing::debug;

use crate::cli::config::Config;
use crate::cli::error::HelpfulError;
use crate::cli::session::Session;

/// Where the connection url came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSource {
    Flag,
    Named(String),
}

/// Pick the url: `--url`, then `--connection`, then the session's active
/// connection, then the configured default.
pub fn resolve_url(
    url: Option<&str>,
    connection: Option<&str>,
    config: &Config,
    session: &Session,
) -> anyhow::Result<(String, UrlSource)> {
    if let Some(url) = url {
        return Ok((url.to_string(), UrlSource::Flag));
    }

    let name = connection
        .or(session.active_connection.as_deref())
        .or(config.default_connection.as_deref())
        .ok_or_else(HelpfulError::no_connection)?;

    let entry = config
        .connection(name)
        .ok_or_else(|| HelpfulError::unknown_connection(name, &config.connection_names()))?;
    Ok((entry.url.clone(), UrlSource::Named(entry.name.clone())))
}

/// Open the database selected by the global flags.
pub fn connect(
    url: Option<&str>,
    connection: Option<&str>,
    config: &Config,
    session: &Session,
) -> anyhow::Result<Database> {
    let (url, source) = resolve_url(url, connection, config, session)?;
    let connection_config = ConnectionConfig::from_url(&url)?;
    debug!(url = %connection_config.redacted_url(), ?source, "Connecting");

    let registry = AssetRegistry::with_auto_register(config.assets.auto_register);
    Ok(Database::open(connection_config, Arc::new(registry))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::parse(
            r#"
default_connection = "local"
[[connections]]
name = "local"
url = "sqlite:./game.db"
[[connections]]
name = "ci"
url = "sqlite:./ci.db"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_url_flag_wins() {
        let session = Session {
            active_connection: Some("ci".to_string()),
            last_query: None,
        };
        let (url, source) =
            resolve_url(Some("sqlite:other.db"), Some("local"), &config(), &session).unwrap();
        assert_eq!(url, "sqlite:other.db");
        assert_eq!(source, UrlSource::Flag);
    }

    #[test]
    fn test_named_connection_precedence() {
        let config = config();
        let session = Session {
            active_connection: Some("ci".to_string()),
            last_query: None,
        };

        let (url, _) = resolve_url(None, Some("local"), &config, &session).unwrap();
        assert_eq!(url, "sqlite:./game.db");

        let (url, source) = resolve_url(None, None, &config, &session).unwrap();
        assert_eq!(url, "sqlite:./ci.db");
        assert_eq!(source, UrlSource::Named("ci".to_string()));

        let (url, _) = resolve_url(None, None, &config, &Session::default()).unwrap();
        assert_eq!(url, "sqlite:./game.db");
    }

    #[test]
    fn test_missing_connections() {
        let err = resolve_url(None, None, &Config::default(), &Session::default()).unwrap_err();
        assert!(err.to_string().contains("No database connection selected"));

        let err = resolve_url(None, Some("prod"), &config(), &Session::default()).unwrap_err();
        assert!(err.to_string().contains("local, ci"));
    }
}

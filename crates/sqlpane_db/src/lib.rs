//! Database provider layer for sqlpane
//!
//! Browses, edits and queries SQLite and MySQL/MariaDB databases through one
//! provider contract, mapping engine-native values (vectors, object
//! references, dates) onto storable SQL columns.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sqlpane_db::{AssetRegistry, ConnectionConfig, Database, Result};
//!
//! let config = ConnectionConfig::from_url("sqlite:./game.db")?;
//! let mut db = Database::open(config, Arc::new(AssetRegistry::new()))?;
//! db.load_content()?;
//!
//! for table in db.tables() {
//!     println!("{}: {} rows", table.name, table.rows.len());
//! }
//!
//! db.writer()?.make_primary_key("enemies", "id")?;
//! ```

mod assets;
mod backend;
mod codec;
mod database;
mod error;
pub mod metadata;
mod provider;
pub mod rebuild;
pub mod sql;
pub mod statement;
mod types;

pub use assets::{AssetRegistry, AssetResolver};
pub use backend::{
    build_runtime, BackendError, ConnectionConfig, DbConnection, DbRow, DbTransaction, DbValue, FromDbValue,
    SqlExecutor,
};
pub use codec::{
    decode_untyped, sniff_text_type, DecodeFallback, DecodeWarning, Decoded, ValueCodec,
};
pub use database::{Database, QueryOutput, TableCache};
pub use error::{DbError, Result};
pub use provider::{
    open_provider, DatabaseProvider, DeleteOutcome, DeleteStrategy, MySqlProvider, SqliteProvider,
};
pub use types::*;

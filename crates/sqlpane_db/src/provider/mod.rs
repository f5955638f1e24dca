//! Engine providers.
//!
//! [`DatabaseProvider`] is the uniform operation contract; [`SqliteProvider`]
//! and [`MySqlProvider`] implement it. Both are composed from the same free
//! functions (row operations in `rows`, the rebuild primitive, the column type
//! side table) rather than sharing a base type.
//!
//! Every operation opens a connection, runs its statements and closes the
//! connection before returning.

mod mysql;
mod rows;
mod sqlite;

use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{debug, info};

pub use mysql::MySqlProvider;
pub use rows::{DeleteOutcome, DeleteStrategy};
pub use sqlite::SqliteProvider;

use crate::assets::AssetResolver;
use crate::backend::{build_runtime, ConnectionConfig, DbConnection, DbRow};
use crate::codec::ValueCodec;
use crate::error::{DbError, Result};
use crate::metadata::COLUMN_TYPES_TABLE;
use crate::types::{Affinity, ColumnSpec, DeclaredType, Engine, Row, TableSchema, Value};

/// Uniform database operation contract.
///
/// Implementations are `Send + Sync` but do not serialize overlapping calls;
/// callers that share a provider across threads must serialize externally.
pub trait DatabaseProvider: Send + Sync {
    fn engine(&self) -> Engine;

    fn codec(&self) -> &ValueCodec;

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// User tables, in engine order.
    fn list_tables(&self) -> Result<Vec<String>>;

    fn get_columns(&self, table: &str) -> Result<TableSchema>;

    fn get_primary_key_column(&self, table: &str) -> Result<Option<String>> {
        let schema = self.get_columns(table)?;
        Ok(schema.primary_key().map(|c| c.name.clone()))
    }

    /// Declared type of a column (logical name for annotated columns).
    fn get_column_type(&self, table: &str, column: &str) -> Result<String> {
        let schema = self.get_columns(table)?;
        schema
            .column(column)
            .map(|c| c.declared_type.to_string())
            .ok_or_else(|| DbError::column_not_found(table, column))
    }

    fn is_auto_increment(&self, table: &str, column: &str) -> Result<bool>;

    // ------------------------------------------------------------------
    // DDL
    // ------------------------------------------------------------------

    fn create_table(
        &self,
        name: &str,
        columns: &[ColumnSpec],
        primary_key_index: Option<usize>,
    ) -> Result<()>;

    fn delete_table(&self, name: &str) -> Result<()>;

    fn clear_table(&self, name: &str) -> Result<()>;

    fn add_column(&self, table: &str, name: &str, declared: &DeclaredType) -> Result<()>;

    /// Rename and/or retype a column, optionally making it the sole primary
    /// key. Atomic: on failure the table is left as it was.
    fn modify_column(
        &self,
        table: &str,
        old_name: &str,
        new_name: &str,
        new_type: &DeclaredType,
        is_primary_key: bool,
    ) -> Result<()>;

    fn delete_column(&self, table: &str, name: &str) -> Result<()>;

    /// Promote a column to sole primary key.
    fn make_primary_key(&self, table: &str, column: &str) -> Result<()> {
        let schema = self.get_columns(table)?;
        let target = schema
            .column(column)
            .ok_or_else(|| DbError::column_not_found(table, column))?
            .clone();

        let key_count = schema.columns.iter().filter(|c| c.is_primary_key).count();
        if target.is_primary_key && key_count == 1 {
            debug!(table, column = %target.name, "Column is already the primary key");
            return Ok(());
        }

        if self.has_duplicate_values(table, &target.name)? {
            return Err(DbError::DuplicateValueViolation {
                table: table.to_string(),
                column: target.name,
            });
        }

        info!(table, column = %target.name, "Making primary key");
        self.modify_column(table, &target.name, &target.name, &target.declared_type, true)
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    fn insert_row(&self, table: &str, row: &Row) -> Result<()>;

    /// Update one cell, addressed by the row's primary-key value.
    fn update_cell_value(&self, table: &str, row: &Row, column: &str, value: &Value) -> Result<()>;

    fn delete_row(&self, table: &str, row: &Row) -> Result<DeleteOutcome>;

    fn check_primary_key_exists(&self, table: &str, pk_column: &str, value: &Value) -> Result<bool>;

    /// `SELECT *` in storage order, undecoded.
    fn fetch_rows(&self, table: &str, limit: Option<usize>) -> Result<Vec<DbRow>>;

    /// True if the column holds a non-null value more than once.
    fn has_duplicate_values(&self, table: &str, column: &str) -> Result<bool>;

    /// Record (or clear) the logical type of an existing column.
    fn record_column_type(&self, table: &str, column: &str, declared: &DeclaredType) -> Result<()>;

    // ------------------------------------------------------------------
    // Ad-hoc statements
    // ------------------------------------------------------------------

    fn query_raw(&self, sql: &str) -> Result<Vec<DbRow>>;

    fn execute_raw(&self, sql: &str) -> Result<u64>;
}

/// Open the provider for `config`.
pub fn open_provider(
    config: ConnectionConfig,
    resolver: Arc<dyn AssetResolver>,
) -> Result<Box<dyn DatabaseProvider>> {
    let codec = ValueCodec::new(resolver);
    let provider: Box<dyn DatabaseProvider> = match config.engine() {
        Engine::Sqlite => Box::new(SqliteProvider::new(config, codec)?),
        Engine::MySql => Box::new(MySqlProvider::new(config, codec)?),
    };
    Ok(provider)
}

/// Opens one short-lived connection per operation.
pub(crate) struct Connector {
    config: ConnectionConfig,
    runtime: Arc<Runtime>,
}

impl Connector {
    pub(crate) fn new(config: ConnectionConfig) -> Result<Self> {
        let runtime = build_runtime().map_err(|source| DbError::ConnectionFailure {
            url: config.redacted_url(),
            source,
        })?;
        Ok(Self { config, runtime })
    }

    pub(crate) fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn connect(&self) -> Result<DbConnection> {
        DbConnection::open(&self.config, Arc::clone(&self.runtime)).map_err(|source| {
            DbError::ConnectionFailure {
                url: self.config.redacted_url(),
                source,
            }
        })
    }

    /// Run `op` on a fresh connection, closing it afterwards.
    pub(crate) fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut DbConnection) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.connect()?;
        let result = op(&mut conn);
        if let Err(err) = conn.close() {
            debug!("Failed to close connection: {}", err);
        }
        result
    }
}

/// Shared `create_table` argument checks.
pub(crate) fn validate_create(
    engine: Engine,
    name: &str,
    columns: &[ColumnSpec],
    primary_key_index: Option<usize>,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DbError::invalid_input("table name is empty"));
    }
    if engine.names_match(name, COLUMN_TYPES_TABLE) {
        return Err(DbError::invalid_input(format!("'{}' is reserved", name)));
    }
    if columns.is_empty() {
        return Err(DbError::invalid_input(format!(
            "table '{}' needs at least one column",
            name
        )));
    }
    for (i, column) in columns.iter().enumerate() {
        if column.name.trim().is_empty() {
            return Err(DbError::invalid_input(format!("column {} has no name", i)));
        }
        if columns[..i]
            .iter()
            .any(|other| engine.names_match(&other.name, &column.name))
        {
            return Err(DbError::invalid_input(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
    }
    if let Some(index) = primary_key_index {
        if index >= columns.len() {
            return Err(DbError::invalid_input(format!(
                "primary key index {} out of range for {} columns",
                index,
                columns.len()
            )));
        }
    }
    for (i, column) in columns.iter().enumerate() {
        if !column.is_auto_increment {
            continue;
        }
        if primary_key_index != Some(i) {
            return Err(DbError::invalid_input(format!(
                "auto-increment column '{}' must be the primary key",
                column.name
            )));
        }
        let integer = match engine {
            Engine::Sqlite => column.declared_type == DeclaredType::Integer,
            Engine::MySql => column.declared_type.affinity() == Affinity::Integer,
        };
        if !integer {
            return Err(DbError::invalid_input(format!(
                "auto-increment column '{}' must be INTEGER",
                column.name
            )));
        }
    }
    Ok(())
}

/// Index of `column` in `schema`, or `ColumnNotFound`.
pub(crate) fn column_index(schema: &TableSchema, column: &str) -> Result<usize> {
    schema
        .position(column)
        .ok_or_else(|| DbError::column_not_found(&schema.table, column))
}

/// `InvalidInput` if renaming column `index` to `new_name` collides.
pub(crate) fn check_rename(schema: &TableSchema, index: usize, new_name: &str) -> Result<()> {
    if new_name.trim().is_empty() {
        return Err(DbError::invalid_input("column name is empty"));
    }
    let clash = schema
        .columns
        .iter()
        .enumerate()
        .any(|(i, c)| i != index && schema.engine.names_match(&c.name, new_name));
    if clash {
        return Err(DbError::invalid_input(format!(
            "column '{}' already exists in '{}'",
            new_name, schema.table
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("id", DeclaredType::Integer).auto_increment(),
            ColumnSpec::new("pos", DeclaredType::Vector2),
        ]
    }

    #[test]
    fn create_validation() {
        assert!(validate_create(Engine::Sqlite, "t", &specs(), Some(0)).is_ok());
        assert!(validate_create(Engine::Sqlite, "t", &[], None).is_err());
        assert!(validate_create(Engine::Sqlite, "t", &specs(), Some(2)).is_err());
        assert!(validate_create(Engine::Sqlite, "t", &specs(), Some(1)).is_err());
        assert!(validate_create(Engine::Sqlite, "t", &specs(), None).is_err());
        assert!(validate_create(Engine::Sqlite, "__column_types", &specs(), Some(0)).is_err());

        let dup = vec![
            ColumnSpec::new("a", DeclaredType::Text),
            ColumnSpec::new("A", DeclaredType::Text),
        ];
        assert!(validate_create(Engine::Sqlite, "t", &dup, None).is_ok());
        assert!(validate_create(Engine::MySql, "t", &dup, None).is_err());

        let bigint = vec![ColumnSpec::new("id", DeclaredType::from_sql("BIGINT")).auto_increment()];
        assert!(validate_create(Engine::MySql, "t", &bigint, Some(0)).is_ok());
        assert!(validate_create(Engine::Sqlite, "t", &bigint, Some(0)).is_err());
    }
}

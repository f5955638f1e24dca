//! SQLite provider.
//!
//! SQLite has no general `ALTER COLUMN`, so column modification and deletion
//! go through the rebuild primitive inside one transaction, with foreign key
//! enforcement suspended around it.

use tracing::{debug, info};

use super::{check_rename, column_index, rows, validate_create, Connector, DatabaseProvider, DeleteOutcome};
use crate::backend::{BackendError, ConnectionConfig, DbConnection, DbRow, DbTransaction, DbValue, SqlExecutor};
use crate::codec::ValueCodec;
use crate::error::{DbError, Result};
use crate::metadata::{self, COLUMN_TYPES_TABLE};
use crate::rebuild::{rebuild_table, RebuildPlan};
use crate::sql::{column_definition, create_table_sql, quote_ident};
use crate::types::{Column, ColumnSpec, DeclaredType, Engine, Row, TableSchema, Value};

const SEQUENCE_TABLE: &str = "sqlite_sequence";

/// Provider over a SQLite database file.
pub struct SqliteProvider {
    connector: Connector,
    codec: ValueCodec,
}

/// Introspected table plus whether its DDL used `AUTOINCREMENT`.
struct SqliteTable {
    schema: TableSchema,
    autoincrement_keyword: bool,
}

impl SqliteProvider {
    pub fn new(config: ConnectionConfig, codec: ValueCodec) -> Result<Self> {
        if config.engine() != Engine::Sqlite {
            return Err(DbError::InvalidUrl(config.redacted_url()));
        }
        Ok(Self {
            connector: Connector::new(config)?,
            codec,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.connector.config()
    }

    fn schema_of(&self, conn: &mut DbConnection, table: &str) -> Result<TableSchema> {
        introspect(conn, table).map(|t| t.schema)
    }

    /// Run a rebuild plus side-table updates in one transaction.
    fn run_rebuild<F>(&self, conn: &mut DbConnection, plan: &RebuildPlan, annotate: F) -> Result<()>
    where
        F: FnOnce(&mut DbTransaction<'_>) -> std::result::Result<(), BackendError>,
    {
        let table = plan.table.clone();
        let foreign_keys: i64 = conn.query_scalar("PRAGMA foreign_keys", &[])?;
        if foreign_keys != 0 {
            conn.execute_batch("PRAGMA foreign_keys = OFF")?;
        }

        let result = conn.transaction(|tx| {
            rebuild_table(tx, plan)?;
            annotate(tx)
        });

        if foreign_keys != 0 {
            if let Err(err) = conn.execute_batch("PRAGMA foreign_keys = ON") {
                debug!("Failed to re-enable foreign keys: {}", err);
            }
        }

        result.map_err(|source| DbError::schema_modification(table, source))
    }
}

impl DatabaseProvider for SqliteProvider {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        self.connector.with_connection(|conn| {
            let rows = conn.query_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' AND name <> ?",
                &[DbValue::from(COLUMN_TYPES_TABLE)],
            )?;
            rows.iter()
                .map(|row| row.get::<String>(0).map_err(DbError::from))
                .collect()
        })
    }

    fn get_columns(&self, table: &str) -> Result<TableSchema> {
        self.connector
            .with_connection(|conn| self.schema_of(conn, table))
    }

    fn is_auto_increment(&self, table: &str, column: &str) -> Result<bool> {
        let schema = self.get_columns(table)?;
        schema
            .column(column)
            .map(|c| c.is_auto_increment)
            .ok_or_else(|| DbError::column_not_found(table, column))
    }

    fn create_table(
        &self,
        name: &str,
        columns: &[ColumnSpec],
        primary_key_index: Option<usize>,
    ) -> Result<()> {
        validate_create(Engine::Sqlite, name, columns, primary_key_index)?;
        let columns: Vec<Column> = columns
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.to_column(Engine::Sqlite, primary_key_index == Some(i)))
            .collect();
        let sql = create_table_sql(Engine::Sqlite, name, &columns, true);

        self.connector.with_connection(|conn| {
            conn.transaction(|tx| -> std::result::Result<(), BackendError> {
                tx.execute(&sql, &[])?;
                for column in columns.iter().filter(|c| c.declared_type.needs_annotation()) {
                    metadata::record(tx, name, &column.name, &column.declared_type)?;
                }
                Ok(())
            })
            .map_err(|source| DbError::schema_modification(name, source))
        })?;
        info!(table = name, columns = columns.len(), "Created table");
        Ok(())
    }

    fn delete_table(&self, name: &str) -> Result<()> {
        self.connector.with_connection(|conn| {
            require_table(conn, name)?;
            let sql = format!("DROP TABLE {}", quote_ident(Engine::Sqlite, name));
            conn.transaction(|tx| {
                tx.execute(&sql, &[])?;
                metadata::remove_table(tx, name)
            })
            .map_err(|source| DbError::schema_modification(name, source))
        })?;
        info!(table = name, "Dropped table");
        Ok(())
    }

    fn clear_table(&self, name: &str) -> Result<()> {
        let deleted = self.connector.with_connection(|conn| {
            require_table(conn, name)?;
            let sql = format!("DELETE FROM {}", quote_ident(Engine::Sqlite, name));
            Ok(conn.execute(&sql, &[])?)
        })?;
        info!(table = name, deleted, "Cleared table");
        Ok(())
    }

    fn add_column(&self, table: &str, name: &str, declared: &DeclaredType) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = self.schema_of(conn, table)?;
            check_rename(&schema, usize::MAX, name)?;
            let column = ColumnSpec::new(name, declared.clone()).to_column(Engine::Sqlite, false);
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(Engine::Sqlite, table),
                column_definition(Engine::Sqlite, &column, false)
            );
            conn.transaction(|tx| {
                tx.execute(&sql, &[])?;
                metadata::record(tx, table, name, declared)
            })
            .map_err(|source| DbError::schema_modification(table, source))
        })?;
        info!(table, column = name, declared_type = %declared, "Added column");
        Ok(())
    }

    fn modify_column(
        &self,
        table: &str,
        old_name: &str,
        new_name: &str,
        new_type: &DeclaredType,
        is_primary_key: bool,
    ) -> Result<()> {
        self.connector.with_connection(|conn| {
            let current = introspect(conn, table)?;
            let index = column_index(&current.schema, old_name)?;
            check_rename(&current.schema, index, new_name)?;
            let old_name = current.schema.columns[index].name.clone();

            let plan = RebuildPlan::modify_column(
                &current.schema,
                index,
                new_name,
                new_type,
                is_primary_key,
                current.autoincrement_keyword,
            );
            self.run_rebuild(conn, &plan, |tx| {
                if old_name != new_name {
                    metadata::rename_column(tx, table, &old_name, new_name)?;
                }
                metadata::record(tx, table, new_name, new_type)
            })
        })?;
        info!(
            table,
            old = old_name,
            new = new_name,
            declared_type = %new_type,
            is_primary_key,
            "Modified column"
        );
        Ok(())
    }

    fn delete_column(&self, table: &str, name: &str) -> Result<()> {
        self.connector.with_connection(|conn| {
            let current = introspect(conn, table)?;
            let index = column_index(&current.schema, name)?;
            let column = current.schema.columns[index].name.clone();
            if current.schema.len() == 1 {
                return Err(DbError::CannotDeleteLastColumn {
                    table: table.to_string(),
                    column,
                });
            }

            let plan = RebuildPlan::drop_column(&current.schema, index, current.autoincrement_keyword);
            self.run_rebuild(conn, &plan, |tx| metadata::remove_column(tx, table, &column))
        })?;
        info!(table, column = name, "Deleted column");
        Ok(())
    }

    fn insert_row(&self, table: &str, row: &Row) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = self.schema_of(conn, table)?;
            rows::insert_row(conn, &schema, &self.codec, row)
        })
    }

    fn update_cell_value(&self, table: &str, row: &Row, column: &str, value: &Value) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = self.schema_of(conn, table)?;
            rows::update_cell_value(conn, &schema, &self.codec, row, column, value)
        })
    }

    fn delete_row(&self, table: &str, row: &Row) -> Result<DeleteOutcome> {
        self.connector.with_connection(|conn| {
            let schema = self.schema_of(conn, table)?;
            rows::delete_row(conn, &schema, &self.codec, row)
        })
    }

    fn check_primary_key_exists(&self, table: &str, pk_column: &str, value: &Value) -> Result<bool> {
        self.connector.with_connection(|conn| {
            let schema = self.schema_of(conn, table)?;
            rows::check_primary_key_exists(conn, &schema, &self.codec, pk_column, value)
        })
    }

    fn fetch_rows(&self, table: &str, limit: Option<usize>) -> Result<Vec<DbRow>> {
        self.connector.with_connection(|conn| {
            require_table(conn, table)?;
            rows::fetch_rows(conn, table, limit)
        })
    }

    fn has_duplicate_values(&self, table: &str, column: &str) -> Result<bool> {
        self.connector.with_connection(|conn| {
            let schema = self.schema_of(conn, table)?;
            let index = column_index(&schema, column)?;
            rows::has_duplicate_values(conn, table, &schema.columns[index].name)
        })
    }

    fn record_column_type(&self, table: &str, column: &str, declared: &DeclaredType) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = self.schema_of(conn, table)?;
            let index = column_index(&schema, column)?;
            metadata::record(conn, table, &schema.columns[index].name, declared)?;
            Ok(())
        })
    }

    fn query_raw(&self, sql: &str) -> Result<Vec<DbRow>> {
        self.connector
            .with_connection(|conn| Ok(conn.query_all(sql, &[])?))
    }

    fn execute_raw(&self, sql: &str) -> Result<u64> {
        self.connector.with_connection(|conn| Ok(conn.execute(sql, &[])?))
    }
}

fn require_table<E: SqlExecutor + ?Sized>(exec: &mut E, table: &str) -> Result<String> {
    let row = exec
        .query_optional(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[DbValue::from(table)],
        )
        .map_err(|e| DbError::introspection(table, e.to_string()))?
        .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
    row.get::<Option<String>>(0)
        .map(Option::unwrap_or_default)
        .map_err(|e| DbError::introspection(table, e.to_string()))
}

/// `PRAGMA table_info` plus single-column unique indexes plus annotations.
fn introspect<E: SqlExecutor + ?Sized>(exec: &mut E, table: &str) -> Result<SqliteTable> {
    let create_sql = require_table(exec, table)?;
    let autoincrement_keyword = create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");
    let failed = |e: BackendError| DbError::introspection(table, e.to_string());

    let info = exec
        .query_all(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?)",
            &[DbValue::from(table)],
        )
        .map_err(failed)?;
    if info.is_empty() {
        return Err(DbError::introspection(table, "PRAGMA table_info returned no columns"));
    }

    let unique = unique_columns(exec, table).map_err(failed)?;
    let annotations = metadata::load(exec, table).map_err(failed)?;
    let key_count = info
        .iter()
        .filter(|row| row.get::<i64>(4).map(|pk| pk > 0).unwrap_or(false))
        .count();

    let mut columns = Vec::with_capacity(info.len());
    for row in &info {
        let name: String = row.get(0).map_err(failed)?;
        let sql_type: String = row.get::<Option<String>>(1).map_err(failed)?.unwrap_or_default();
        let not_null: i64 = row.get(2).map_err(failed)?;
        let default_value: Option<String> = row.get(3).map_err(failed)?;
        let pk: i64 = row.get(4).map_err(failed)?;

        let is_primary_key = pk > 0;
        let is_auto_increment = is_primary_key
            && key_count == 1
            && sql_type.eq_ignore_ascii_case("INTEGER")
            && table != SEQUENCE_TABLE;
        let declared_type = annotations
            .get(Engine::Sqlite, &name)
            .cloned()
            .unwrap_or_else(|| DeclaredType::from_sql(&sql_type));

        columns.push(Column {
            is_unique: unique.iter().any(|u| *u == name),
            name,
            sql_type,
            declared_type,
            is_primary_key,
            is_auto_increment,
            is_not_null: not_null != 0,
            default_value,
        });
    }

    Ok(SqliteTable {
        schema: TableSchema {
            table: table.to_string(),
            columns,
            engine: Engine::Sqlite,
        },
        autoincrement_keyword,
    })
}

/// Columns covered alone by a unique index other than the primary key.
fn unique_columns<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    table: &str,
) -> std::result::Result<Vec<String>, BackendError> {
    let indexes = exec.query_all(
        "SELECT name, \"unique\", origin FROM pragma_index_list(?)",
        &[DbValue::from(table)],
    )?;

    let mut columns = Vec::new();
    for index in indexes {
        let name: String = index.get(0)?;
        let unique: i64 = index.get(1)?;
        let origin: String = index.get(2)?;
        if unique == 0 || origin == "pk" {
            continue;
        }
        let members = exec.query_all(
            "SELECT name FROM pragma_index_info(?)",
            &[DbValue::from(name.as_str())],
        )?;
        if let [only] = members.as_slice() {
            if let Some(column) = only.get::<Option<String>>(0)? {
                columns.push(column);
            }
        }
    }
    Ok(columns)
}

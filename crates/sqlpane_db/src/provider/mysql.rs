//! MySQL / MariaDB provider.
//!
//! Every DDL operation is a single native statement. MySQL commits DDL
//! implicitly, so `modify_column` folds the primary-key drop and the column
//! change into one `ALTER TABLE`, which the server applies atomically.

use tracing::info;

use super::{check_rename, column_index, rows, validate_create, Connector, DatabaseProvider, DeleteOutcome};
use crate::backend::{BackendError, ConnectionConfig, DbConnection, DbRow, DbValue};
use crate::codec::ValueCodec;
use crate::error::{DbError, Result};
use crate::metadata::{self, COLUMN_TYPES_TABLE};
use crate::sql::{column_definition, create_table_sql, quote_ident, quote_literal};
use crate::types::{Affinity, Column, ColumnSpec, DeclaredType, Engine, Row, TableSchema, Value};

/// Provider over a MySQL or MariaDB schema.
pub struct MySqlProvider {
    connector: Connector,
    codec: ValueCodec,
}

impl MySqlProvider {
    pub fn new(config: ConnectionConfig, codec: ValueCodec) -> Result<Self> {
        if config.engine() != Engine::MySql {
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
}

impl DatabaseProvider for MySqlProvider {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        self.connector.with_connection(|conn| {
            let rows = conn.query_all("SHOW TABLES", &[])?;
            let mut tables = Vec::with_capacity(rows.len());
            for row in rows {
                let name: String = row.get(0)?;
                if !name.eq_ignore_ascii_case(COLUMN_TYPES_TABLE) {
                    tables.push(name);
                }
            }
            Ok(tables)
        })
    }

    fn get_columns(&self, table: &str) -> Result<TableSchema> {
        self.connector.with_connection(|conn| introspect(conn, table))
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
        validate_create(Engine::MySql, name, columns, primary_key_index)?;
        let columns: Vec<Column> = columns
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.to_column(Engine::MySql, primary_key_index == Some(i)))
            .collect();
        let sql = create_table_sql(Engine::MySql, name, &columns, true);

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
            introspect(conn, name)?;
            let sql = format!("DROP TABLE {}", quote_ident(Engine::MySql, name));
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
        self.connector.with_connection(|conn| {
            introspect(conn, name)?;
            let sql = format!("TRUNCATE TABLE {}", quote_ident(Engine::MySql, name));
            conn.execute(&sql, &[])
                .map_err(|source| DbError::schema_modification(name, source))
        })?;
        info!(table = name, "Truncated table");
        Ok(())
    }

    fn add_column(&self, table: &str, name: &str, declared: &DeclaredType) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = introspect(conn, table)?;
            check_rename(&schema, usize::MAX, name)?;
            let column = ColumnSpec::new(name, declared.clone()).to_column(Engine::MySql, false);
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(Engine::MySql, table),
                column_definition(Engine::MySql, &column, false)
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
            let schema = introspect(conn, table)?;
            let index = column_index(&schema, old_name)?;
            check_rename(&schema, index, new_name)?;
            let old_name = schema.columns[index].name.clone();
            let sql = modify_column_sql(&schema, index, new_name, new_type, is_primary_key);

            conn.transaction(|tx| {
                tx.execute(&sql, &[])?;
                if old_name != new_name {
                    metadata::rename_column(tx, table, &old_name, new_name)?;
                }
                metadata::record(tx, table, new_name, new_type)
            })
            .map_err(|source| DbError::schema_modification(table, source))
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
            let schema = introspect(conn, table)?;
            let index = column_index(&schema, name)?;
            let column = schema.columns[index].name.clone();
            if schema.len() == 1 {
                return Err(DbError::CannotDeleteLastColumn {
                    table: table.to_string(),
                    column,
                });
            }
            let sql = format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_ident(Engine::MySql, table),
                quote_ident(Engine::MySql, &column)
            );
            conn.transaction(|tx| {
                tx.execute(&sql, &[])?;
                metadata::remove_column(tx, table, &column)
            })
            .map_err(|source| DbError::schema_modification(table, source))
        })?;
        info!(table, column = name, "Deleted column");
        Ok(())
    }

    fn insert_row(&self, table: &str, row: &Row) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = introspect(conn, table)?;
            rows::insert_row(conn, &schema, &self.codec, row)
        })
    }

    fn update_cell_value(&self, table: &str, row: &Row, column: &str, value: &Value) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = introspect(conn, table)?;
            rows::update_cell_value(conn, &schema, &self.codec, row, column, value)
        })
    }

    fn delete_row(&self, table: &str, row: &Row) -> Result<DeleteOutcome> {
        self.connector.with_connection(|conn| {
            let schema = introspect(conn, table)?;
            rows::delete_row(conn, &schema, &self.codec, row)
        })
    }

    fn check_primary_key_exists(&self, table: &str, pk_column: &str, value: &Value) -> Result<bool> {
        self.connector.with_connection(|conn| {
            let schema = introspect(conn, table)?;
            rows::check_primary_key_exists(conn, &schema, &self.codec, pk_column, value)
        })
    }

    fn fetch_rows(&self, table: &str, limit: Option<usize>) -> Result<Vec<DbRow>> {
        self.connector.with_connection(|conn| {
            introspect(conn, table)?;
            rows::fetch_rows(conn, table, limit)
        })
    }

    fn has_duplicate_values(&self, table: &str, column: &str) -> Result<bool> {
        self.connector.with_connection(|conn| {
            let schema = introspect(conn, table)?;
            let index = column_index(&schema, column)?;
            rows::has_duplicate_values(conn, table, &schema.columns[index].name)
        })
    }

    fn record_column_type(&self, table: &str, column: &str, declared: &DeclaredType) -> Result<()> {
        self.connector.with_connection(|conn| {
            let schema = introspect(conn, table)?;
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

/// `ALTER TABLE t [DROP PRIMARY KEY,] [MODIFY COLUMN ...,] CHANGE COLUMN old def`.
///
/// A requested key replaces any existing key. The previous key column loses
/// `AUTO_INCREMENT`, which MySQL only allows on a key. Clearing the flag on
/// the current key drops it. `DEFAULT` is kept only while the type is
/// unchanged. An existing unique index survives `CHANGE COLUMN`, so `UNIQUE`
/// is never repeated. A new key on TEXT or BLOB storage is narrowed to a
/// bounded type, since MySQL cannot index those without a prefix length.
fn modify_column_sql(
    schema: &TableSchema,
    index: usize,
    new_name: &str,
    new_type: &DeclaredType,
    is_primary_key: bool,
) -> String {
    let old = &schema.columns[index];
    let key_count = schema.columns.iter().filter(|c| c.is_primary_key).count();
    let already_sole_key = old.is_primary_key && key_count == 1;
    let add_key = is_primary_key && !already_sole_key;
    let drop_key = key_count > 0 && (add_key || (!is_primary_key && old.is_primary_key));

    let type_changed = *new_type != old.declared_type;
    let mut sql_type = if type_changed {
        new_type.storage_type(Engine::MySql, is_primary_key || old.is_unique)
    } else {
        old.sql_type.clone()
    };
    if add_key {
        if let Some(bounded) = bounded_key_type(&sql_type) {
            sql_type = bounded;
        }
    }
    let integer_key = is_primary_key
        && DeclaredType::from_sql(&sql_type).affinity() == Affinity::Integer;
    let column = Column {
        name: new_name.to_string(),
        sql_type,
        declared_type: new_type.clone(),
        is_primary_key: add_key,
        is_auto_increment: old.is_auto_increment && integer_key,
        is_not_null: old.is_not_null || is_primary_key,
        is_unique: false,
        default_value: if type_changed || old.is_auto_increment {
            None
        } else {
            old.default_value.clone()
        },
    };

    let mut clauses = Vec::new();
    if drop_key {
        clauses.push("DROP PRIMARY KEY".to_string());
        for (i, other) in schema.columns.iter().enumerate() {
            if i != index && other.is_auto_increment {
                let mut plain = other.clone();
                plain.is_primary_key = false;
                plain.is_auto_increment = false;
                plain.is_unique = false;
                clauses.push(format!(
                    "MODIFY COLUMN {}",
                    column_definition(Engine::MySql, &plain, false)
                ));
            }
        }
    }
    clauses.push(format!(
        "CHANGE COLUMN {} {}",
        quote_ident(Engine::MySql, &old.name),
        column_definition(Engine::MySql, &column, false)
    ));

    format!(
        "ALTER TABLE {} {}",
        quote_ident(Engine::MySql, &schema.table),
        clauses.join(", ")
    )
}

/// Bounded replacement for unindexable TEXT/BLOB storage.
fn bounded_key_type(sql_type: &str) -> Option<String> {
    let upper = sql_type.to_ascii_uppercase();
    if upper.contains("BLOB") {
        Some("VARBINARY(255)".to_string())
    } else if upper.contains("TEXT") {
        Some("VARCHAR(255)".to_string())
    } else {
        None
    }
}

/// `INFORMATION_SCHEMA.COLUMNS` in ordinal order plus annotations.
fn introspect(conn: &mut DbConnection, table: &str) -> Result<TableSchema> {
    let failed = |e: BackendError| DbError::introspection(table, e.to_string());
    let rows = conn
        .query_all(
            "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, COLUMN_KEY, EXTRA \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
            &[DbValue::from(table)],
        )
        .map_err(failed)?;
    if rows.is_empty() {
        return Err(DbError::TableNotFound(table.to_string()));
    }
    let annotations = metadata::load(conn, table).map_err(failed)?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let name: String = row.get_by_name("COLUMN_NAME").map_err(failed)?;
        let sql_type: String = row.get_by_name("COLUMN_TYPE").map_err(failed)?;
        let nullable: String = row.get_by_name("IS_NULLABLE").map_err(failed)?;
        let default: Option<String> = row.get_by_name("COLUMN_DEFAULT").map_err(failed)?;
        let key: String = row.get_by_name("COLUMN_KEY").map_err(failed)?;
        let extra: String = row.get_by_name("EXTRA").map_err(failed)?;

        let declared_type = annotations
            .get(Engine::MySql, &name)
            .cloned()
            .unwrap_or_else(|| DeclaredType::from_sql(&sql_type));
        columns.push(Column {
            name,
            default_value: default.and_then(|d| normalize_default(&d, &extra)),
            sql_type,
            declared_type,
            is_primary_key: key.eq_ignore_ascii_case("PRI"),
            is_auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
            is_not_null: nullable.eq_ignore_ascii_case("NO"),
            is_unique: key.eq_ignore_ascii_case("UNI"),
        });
    }

    Ok(TableSchema {
        table: table.to_string(),
        columns,
        engine: Engine::MySql,
    })
}

/// Turn an `INFORMATION_SCHEMA` default into SQL text for `DEFAULT ...`.
///
/// MySQL reports literals unquoted and flags expressions with
/// `DEFAULT_GENERATED`; MariaDB reports literals already quoted and `NULL`
/// as text.
fn normalize_default(default: &str, extra: &str) -> Option<String> {
    let trimmed = default.trim();
    if trimmed.eq_ignore_ascii_case("NULL") {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    let verbatim = extra.to_ascii_uppercase().contains("DEFAULT_GENERATED")
        || trimmed.starts_with('\'')
        || trimmed.parse::<f64>().is_ok()
        || upper.starts_with("CURRENT_")
        || trimmed.ends_with(')');
    if verbatim {
        Some(trimmed.to_string())
    } else {
        Some(quote_literal(default))
    }
}

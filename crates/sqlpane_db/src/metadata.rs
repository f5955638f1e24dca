//! Column type side table.
//!
//! SQL cannot express `Vector2`, `Vector3` or object-reference columns, so
//! their logical type is recorded in a reserved table:
//!
//! ```text
//! __column_types(table_name, column_name, logical_type)
//! ```
//!
//! Only annotated types get rows; a column without a row is typed by its SQL
//! type. The side table is created lazily on the first annotation, and every
//! reader treats a missing side table as "no annotations".

use crate::backend::{BackendError, DbValue, SqlExecutor};
use crate::sql::quote_ident;
use crate::types::{DeclaredType, Engine};

/// Reserved table name; hidden from `list_tables`.
pub const COLUMN_TYPES_TABLE: &str = "__column_types";

/// Logical type annotations of one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnTypes {
    entries: Vec<(String, DeclaredType)>,
}

impl ColumnTypes {
    pub fn get(&self, engine: Engine, column: &str) -> Option<&DeclaredType> {
        self.entries
            .iter()
            .find(|(name, _)| engine.names_match(name, column))
            .map(|(_, ty)| ty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Create the side table if needed.
pub fn ensure<E: SqlExecutor + ?Sized>(exec: &mut E) -> Result<(), BackendError> {
    let engine = exec.engine();
    let key_type = match engine {
        Engine::Sqlite => "TEXT",
        Engine::MySql => "VARCHAR(191)",
    };
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (table_name {key} NOT NULL, column_name {key} NOT NULL, \
         logical_type VARCHAR(32) NOT NULL, PRIMARY KEY (table_name, column_name))",
        quote_ident(engine, COLUMN_TYPES_TABLE),
        key = key_type
    );
    exec.execute(&sql, &[])?;
    Ok(())
}

/// True when the side table exists.
pub fn exists<E: SqlExecutor + ?Sized>(exec: &mut E) -> Result<bool, BackendError> {
    let sql = match exec.engine() {
        Engine::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        Engine::MySql => {
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
        }
    };
    let rows = exec.query_all(sql, &[DbValue::from(COLUMN_TYPES_TABLE)])?;
    Ok(!rows.is_empty())
}

/// Record the logical type of a column, or clear it for plain SQL types.
pub fn record<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    table: &str,
    column: &str,
    declared: &DeclaredType,
) -> Result<(), BackendError> {
    let Some(logical) = declared.logical_name() else {
        return remove_column(exec, table, column);
    };
    ensure(exec)?;
    let sql = format!(
        "REPLACE INTO {} (table_name, column_name, logical_type) VALUES (?, ?, ?)",
        quote_ident(exec.engine(), COLUMN_TYPES_TABLE)
    );
    exec.execute(
        &sql,
        &[
            DbValue::from(table),
            DbValue::from(column),
            DbValue::from(logical),
        ],
    )?;
    Ok(())
}

/// Annotations of `table`; empty when the side table does not exist.
pub fn load<E: SqlExecutor + ?Sized>(exec: &mut E, table: &str) -> Result<ColumnTypes, BackendError> {
    if !exists(exec)? {
        return Ok(ColumnTypes::default());
    }
    let sql = format!(
        "SELECT column_name, logical_type FROM {} WHERE table_name = ?",
        quote_ident(exec.engine(), COLUMN_TYPES_TABLE)
    );
    let rows = exec.query_all(&sql, &[DbValue::from(table)])?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let column: String = row.get(0)?;
        let logical: String = row.get(1)?;
        // Unknown names come from a newer writer; the SQL type still applies.
        if let Some(declared) = DeclaredType::from_logical_name(&logical) {
            entries.push((column, declared));
        }
    }
    Ok(ColumnTypes { entries })
}

pub fn rename_column<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    table: &str,
    old: &str,
    new: &str,
) -> Result<(), BackendError> {
    if !exists(exec)? {
        return Ok(());
    }
    let sql = format!(
        "UPDATE {} SET column_name = ? WHERE table_name = ? AND column_name = ?",
        quote_ident(exec.engine(), COLUMN_TYPES_TABLE)
    );
    exec.execute(
        &sql,
        &[DbValue::from(new), DbValue::from(table), DbValue::from(old)],
    )?;
    Ok(())
}

pub fn remove_column<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    table: &str,
    column: &str,
) -> Result<(), BackendError> {
    if !exists(exec)? {
        return Ok(());
    }
    let sql = format!(
        "DELETE FROM {} WHERE table_name = ? AND column_name = ?",
        quote_ident(exec.engine(), COLUMN_TYPES_TABLE)
    );
    exec.execute(&sql, &[DbValue::from(table), DbValue::from(column)])?;
    Ok(())
}

pub fn remove_table<E: SqlExecutor + ?Sized>(exec: &mut E, table: &str) -> Result<(), BackendError> {
    if !exists(exec)? {
        return Ok(());
    }
    let sql = format!(
        "DELETE FROM {} WHERE table_name = ?",
        quote_ident(exec.engine(), COLUMN_TYPES_TABLE)
    );
    exec.execute(&sql, &[DbValue::from(table)])?;
    Ok(())
}

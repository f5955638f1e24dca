//! Table rebuild primitive.
//!
//! Engines without a general `ALTER COLUMN` change a table by copying it:
//!
//! 1. `CREATE TABLE <name>_temp (...)` with the new definitions
//! 2. `INSERT INTO <name>_temp (new...) SELECT old... FROM <name>`
//! 3. `DROP TABLE <name>`
//! 4. `ALTER TABLE <name>_temp RENAME TO <name>`
//!
//! The caller owns the transaction; [`rebuild_table`] stops at the first
//! failing statement and returns its error so the caller can roll back.

use tracing::debug;

use crate::backend::{BackendError, DbValue, SqlExecutor};
use crate::sql::{create_table_sql, ident_list, quote_ident};
use crate::types::{Column, DeclaredType, Engine, TableSchema};

/// New shape of a table plus how existing data maps onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildPlan {
    pub table: String,
    /// New column definitions in physical order
    pub columns: Vec<Column>,
    /// `(old name, new name)` for every column whose data is copied
    pub column_map: Vec<(String, String)>,
    /// Emit `AUTOINCREMENT` for an `INTEGER PRIMARY KEY` (SQLite)
    pub autoincrement_keyword: bool,
}

impl RebuildPlan {
    /// Replace the column at `index`.
    ///
    /// A requested primary key becomes the sole key of the table. Clearing
    /// the flag on the current key leaves the table without one. Other
    /// columns keep their definitions verbatim.
    pub fn modify_column(
        schema: &TableSchema,
        index: usize,
        new_name: &str,
        new_type: &DeclaredType,
        is_primary_key: bool,
        autoincrement_keyword: bool,
    ) -> Self {
        let mut columns = Vec::with_capacity(schema.columns.len());
        let mut column_map = Vec::with_capacity(schema.columns.len());

        for (i, old) in schema.columns.iter().enumerate() {
            if i == index {
                let sql_type = if *new_type == old.declared_type {
                    old.sql_type.clone()
                } else {
                    new_type.storage_type(schema.engine, is_primary_key || old.is_unique)
                };
                let integer_key =
                    is_primary_key && DeclaredType::from_sql(&sql_type) == DeclaredType::Integer;
                columns.push(Column {
                    name: new_name.to_string(),
                    sql_type,
                    declared_type: new_type.clone(),
                    is_primary_key,
                    is_auto_increment: old.is_auto_increment && integer_key,
                    is_not_null: old.is_not_null,
                    is_unique: old.is_unique,
                    default_value: old.default_value.clone(),
                });
                column_map.push((old.name.clone(), new_name.to_string()));
            } else {
                let mut kept = old.clone();
                if is_primary_key {
                    kept.is_primary_key = false;
                    kept.is_auto_increment = false;
                }
                columns.push(kept);
                column_map.push((old.name.clone(), old.name.clone()));
            }
        }

        Self {
            table: schema.table.clone(),
            columns,
            column_map,
            autoincrement_keyword,
        }
    }

    /// Omit the column at `index` from both the definition and the copy.
    pub fn drop_column(schema: &TableSchema, index: usize, autoincrement_keyword: bool) -> Self {
        let (columns, column_map) = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, c)| (c.clone(), (c.name.clone(), c.name.clone())))
            .unzip();

        Self {
            table: schema.table.clone(),
            columns,
            column_map,
            autoincrement_keyword,
        }
    }

    pub fn temp_table(&self) -> String {
        format!("{}_temp", self.table)
    }

    /// The four rebuild statements, in execution order.
    pub fn statements(&self, engine: Engine) -> Vec<String> {
        let temp = self.temp_table();
        let table_ident = quote_ident(engine, &self.table);
        let temp_ident = quote_ident(engine, &temp);

        let new_columns = ident_list(engine, self.column_map.iter().map(|(_, new)| new.as_str()));
        let old_columns = ident_list(engine, self.column_map.iter().map(|(old, _)| old.as_str()));

        let mut statements = vec![create_table_sql(
            engine,
            &temp,
            &self.columns,
            self.autoincrement_keyword,
        )];
        if !self.column_map.is_empty() {
            statements.push(format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                temp_ident, new_columns, old_columns, table_ident
            ));
        }
        statements.push(format!("DROP TABLE {}", table_ident));
        statements.push(format!("ALTER TABLE {} RENAME TO {}", temp_ident, table_ident));
        statements
    }

    fn validate(&self, engine: Engine) -> Result<(), BackendError> {
        if self.columns.is_empty() {
            return Err(BackendError::InvalidInput(format!(
                "rebuild of '{}' needs at least one column",
                self.table
            )));
        }
        for (_, new) in &self.column_map {
            if !self.columns.iter().any(|c| engine.names_match(&c.name, new)) {
                return Err(BackendError::InvalidInput(format!(
                    "rebuild of '{}' copies into unknown column '{}'",
                    self.table, new
                )));
            }
        }
        Ok(())
    }
}

/// Run a rebuild on `exec`, which should be inside a transaction.
///
/// Fails without touching anything if `<name>_temp` already exists.
pub fn rebuild_table<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    plan: &RebuildPlan,
) -> Result<(), BackendError> {
    let engine = exec.engine();
    plan.validate(engine)?;

    let temp = plan.temp_table();
    if table_exists(exec, &temp)? {
        return Err(BackendError::InvalidInput(format!(
            "temporary table '{}' already exists",
            temp
        )));
    }

    for sql in plan.statements(engine) {
        debug!(table = %plan.table, "Rebuild step: {}", sql);
        exec.execute(&sql, &[])?;
    }
    Ok(())
}

fn table_exists<E: SqlExecutor + ?Sized>(exec: &mut E, table: &str) -> Result<bool, BackendError> {
    let sql = match exec.engine() {
        Engine::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        Engine::MySql => {
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
        }
    };
    Ok(!exec.query_all(sql, &[DbValue::from(table)])?.is_empty())
}

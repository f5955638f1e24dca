//! Row operations shared by every provider.

use tracing::{debug, warn};

use crate::backend::{BackendError, DbRow, DbValue, SqlExecutor};
use crate::codec::ValueCodec;
use crate::error::{DbError, Result};
use crate::sql::{ident_list, placeholders, quote_ident};
use crate::types::{Engine, Row, TableSchema, Value};

/// How `delete_row` matched its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    /// `WHERE pk = ?`: at most one row
    PrimaryKey,
    /// Every supplied cell compared; duplicates all go
    AllColumns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub strategy: DeleteStrategy,
    pub deleted: u64,
}

impl DeleteOutcome {
    /// More than one row matched the fallback predicate.
    pub fn is_ambiguous(&self) -> bool {
        self.strategy == DeleteStrategy::AllColumns && self.deleted > 1
    }
}

pub(crate) fn insert_row<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    schema: &TableSchema,
    codec: &ValueCodec,
    row: &Row,
) -> Result<()> {
    let engine = schema.engine;
    let mut names = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());

    for (name, value) in row.iter() {
        let column = schema
            .column(name)
            .ok_or_else(|| DbError::column_not_found(&schema.table, name))?;
        if column.is_auto_increment && value.is_null() {
            continue;
        }
        names.push(column.name.as_str());
        params.push(codec.encode(value, &column.declared_type)?);
    }

    let table = quote_ident(engine, &schema.table);
    let sql = if names.is_empty() {
        match engine {
            Engine::Sqlite => format!("INSERT INTO {} DEFAULT VALUES", table),
            Engine::MySql => format!("INSERT INTO {} () VALUES ()", table),
        }
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            ident_list(engine, names.iter().copied()),
            placeholders(params.len())
        )
    };

    exec.execute(&sql, &params)?;
    debug!(table = %schema.table, columns = params.len(), "Inserted row");
    Ok(())
}

pub(crate) fn update_cell_value<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    schema: &TableSchema,
    codec: &ValueCodec,
    row: &Row,
    column: &str,
    value: &Value,
) -> Result<()> {
    let engine = schema.engine;
    let pk = schema
        .primary_key()
        .ok_or_else(|| DbError::NoPrimaryKey(schema.table.clone()))?;
    let pk_value = row
        .get_in(engine, &pk.name)
        .filter(|v| !v.is_null())
        .ok_or_else(|| DbError::NoPrimaryKey(schema.table.clone()))?;
    let target = schema
        .column(column)
        .ok_or_else(|| DbError::column_not_found(&schema.table, column))?;

    let params = [
        codec.encode(value, &target.declared_type)?,
        codec.encode(pk_value, &pk.declared_type)?,
    ];
    let sql = format!(
        "UPDATE {} SET {} = ? WHERE {} = ?",
        quote_ident(engine, &schema.table),
        quote_ident(engine, &target.name),
        quote_ident(engine, &pk.name)
    );
    let affected = exec.execute(&sql, &params)?;
    debug!(table = %schema.table, column = %target.name, affected, "Updated cell");
    Ok(())
}

pub(crate) fn delete_row<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    schema: &TableSchema,
    codec: &ValueCodec,
    row: &Row,
) -> Result<DeleteOutcome> {
    if row.is_empty() {
        return Err(DbError::invalid_input("cannot delete a row with no cells"));
    }
    let engine = schema.engine;
    let table = quote_ident(engine, &schema.table);

    let by_key = schema.primary_key().and_then(|pk| {
        row.get_in(engine, &pk.name)
            .filter(|v| !v.is_null())
            .map(|v| (pk, v))
    });

    if let Some((pk, value)) = by_key {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            table,
            quote_ident(engine, &pk.name)
        );
        let deleted = exec.execute(&sql, &[codec.encode(value, &pk.declared_type)?])?;
        debug!(table = %schema.table, deleted, "Deleted row by primary key");
        return Ok(DeleteOutcome {
            strategy: DeleteStrategy::PrimaryKey,
            deleted,
        });
    }

    let mut predicates = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for (name, value) in row.iter() {
        let column = schema
            .column(name)
            .ok_or_else(|| DbError::column_not_found(&schema.table, name))?;
        let ident = quote_ident(engine, &column.name);
        match codec.encode(value, &column.declared_type)? {
            DbValue::Null => predicates.push(format!("{} IS NULL", ident)),
            encoded => {
                predicates.push(format!("{} = ?", ident));
                params.push(encoded);
            }
        }
    }

    let sql = format!("DELETE FROM {} WHERE {}", table, predicates.join(" AND "));
    let deleted = exec.execute(&sql, &params)?;
    let outcome = DeleteOutcome {
        strategy: DeleteStrategy::AllColumns,
        deleted,
    };
    if outcome.is_ambiguous() {
        warn!(
            table = %schema.table,
            deleted,
            "Row without primary key matched several rows; all were deleted"
        );
    } else {
        debug!(table = %schema.table, deleted, "Deleted row by column match");
    }
    Ok(outcome)
}

pub(crate) fn check_primary_key_exists<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    schema: &TableSchema,
    codec: &ValueCodec,
    pk_column: &str,
    value: &Value,
) -> Result<bool> {
    let engine = schema.engine;
    let column = schema
        .column(pk_column)
        .ok_or_else(|| DbError::column_not_found(&schema.table, pk_column))?;
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?",
        quote_ident(engine, &schema.table),
        quote_ident(engine, &column.name)
    );
    let count = count(exec, &sql, &[codec.encode(value, &column.declared_type)?])?;
    Ok(count > 0)
}

pub(crate) fn has_duplicate_values<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    table: &str,
    column: &str,
) -> Result<bool> {
    let engine = exec.engine();
    let ident = quote_ident(engine, column);
    let sql = format!(
        "SELECT COUNT(*) FROM (SELECT {col} FROM {table} WHERE {col} IS NOT NULL \
         GROUP BY {col} HAVING COUNT(*) > 1) AS dup",
        col = ident,
        table = quote_ident(engine, table)
    );
    Ok(count(exec, &sql, &[])? > 0)
}

pub(crate) fn fetch_rows<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    table: &str,
    limit: Option<usize>,
) -> Result<Vec<DbRow>> {
    let mut sql = format!("SELECT * FROM {}", quote_ident(exec.engine(), table));
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Ok(exec.query_all(&sql, &[])?)
}

fn count<E: SqlExecutor + ?Sized>(
    exec: &mut E,
    sql: &str,
    params: &[DbValue],
) -> std::result::Result<i64, BackendError> {
    let row = exec
        .query_optional(sql, params)?
        .ok_or_else(|| BackendError::Query("COUNT(*) returned no row".to_string()))?;
    row.get(0)
}

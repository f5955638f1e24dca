//! Row commands: `rows`, `insert`, `update`, `delete-row`
//!
//! Cell values arrive as `column=value` text and are parsed with the
//! column's declared type, so `pos=1,2` becomes a Vector2 and `sprite=NULL`
//! clears a reference.

use sqlpane_db::{Database, DbError, DecodeWarning, Row, TableCache, TableSchema, ValueCodec};
use tracing::warn;

use crate::cli::error::HelpfulError;
use crate::cli::output::{print_table, print_warnings, row_cells, rows_to_json};

/// Split `column=value` at the first `=`.
pub fn parse_assignment(arg: &str) -> anyhow::Result<(String, String)> {
    match arg.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), value.to_string()))
        }
        _ => Err(HelpfulError::invalid_assignment(arg).into()),
    }
}

/// Build a typed row from `column=value` arguments.
///
/// Column names are matched with the engine's rules and normalized to the
/// table's spelling.
pub fn typed_row(codec: &ValueCodec, schema: &TableSchema, args: &[String]) -> anyhow::Result<Row> {
    let mut row = Row::new();
    for arg in args {
        let (name, text) = parse_assignment(arg)?;
        let column = schema
            .column(&name)
            .ok_or_else(|| DbError::column_not_found(&schema.table, &name))?;
        let value = codec.parse_input(&text, &column.declared_type)?;
        row.set(column.name.clone(), value);
    }
    Ok(row)
}

/// The first `limit` rows of a cached table and the warnings raised by them.
pub fn visible_rows(cache: &TableCache, limit: Option<usize>) -> (&[Row], Vec<DecodeWarning>) {
    let shown = limit.map_or(cache.rows.len(), |n| n.min(cache.rows.len()));
    let warnings = cache
        .warnings
        .iter()
        .filter(|w| w.row < shown)
        .cloned()
        .collect();
    (&cache.rows[..shown], warnings)
}

pub fn show_rows(db: &mut Database, table: &str, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let name = db.refresh_table(table)?.name.clone();
    let cache = db
        .table(&name)
        .ok_or_else(|| DbError::TableNotFound(name.clone()))?;
    let (rows, warnings) = visible_rows(cache, limit);
    print_warnings(&cache.name, &warnings);

    let columns = cache.schema.column_names();
    let resolver = db.provider().codec().resolver().as_ref();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows_to_json(&columns, rows, resolver))?);
        return Ok(());
    }

    let headers: Vec<&str> = columns.iter().map(String::as_str).collect();
    let cells = rows.iter().map(|row| row_cells(&columns, row, resolver)).collect();
    print_table(&headers, cells);
    println!("{} row(s)", rows.len());
    Ok(())
}

pub fn insert(db: &Database, table: &str, assignments: &[String]) -> anyhow::Result<()> {
    let writer = db.writer()?;
    let schema = writer.get_columns(table)?;
    let row = typed_row(writer.codec(), &schema, assignments)?;
    writer.insert_row(table, &row)?;
    println!("Inserted 1 row into '{}'.", table);
    Ok(())
}

/// Update one cell of the row whose key matches `key` (`pk=value`).
pub fn update(db: &Database, table: &str, key: &str, assignment: &str) -> anyhow::Result<()> {
    let writer = db.writer()?;
    let schema = writer.get_columns(table)?;
    let primary_key = schema
        .primary_key()
        .ok_or_else(|| DbError::NoPrimaryKey(table.to_string()))?;

    let key_row = typed_row(writer.codec(), &schema, &[key.to_string()])?;
    let Some(key_value) = key_row.get(&primary_key.name) else {
        return Err(HelpfulError::new(format!(
            "'{}' does not address the primary key of '{}'",
            key, table
        ))
        .with_suggestion(format!("TRY: {}=<value>", primary_key.name))
        .into());
    };

    let target = typed_row(writer.codec(), &schema, &[assignment.to_string()])?;
    let Some((column, value)) = target.iter().next() else {
        return Err(HelpfulError::invalid_assignment(assignment).into());
    };

    if !writer.check_primary_key_exists(table, &primary_key.name, key_value)? {
        warn!(table, key, "No row with this key");
        println!("No row in '{}' where {}.", table, key);
        return Ok(());
    }

    writer.update_cell_value(table, &key_row, column, value)?;
    println!("Updated '{}.{}' where {}.", table, column, key);
    Ok(())
}

pub fn delete_row(db: &Database, table: &str, assignments: &[String]) -> anyhow::Result<()> {
    let writer = db.writer()?;
    let schema = writer.get_columns(table)?;
    let row = typed_row(writer.codec(), &schema, assignments)?;
    let outcome = writer.delete_row(table, &row)?;

    if outcome.is_ambiguous() {
        eprintln!(
            "WARNING: '{}' has no primary key; {} identical rows were deleted.",
            table, outcome.deleted
        );
    }
    println!("Deleted {} row(s) from '{}'.", outcome.deleted, table);
    Ok(())
}

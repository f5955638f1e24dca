//! Table and column commands
//!
//! `tables`, `schema`, `create-table`, `drop-table`, `clear-table`,
//! `add-column`, `modify-column`, `delete-column`, `make-pk` and
//! `migrate-vectors`.

use sqlpane_db::{Column, ColumnSpec, Database, DbError, DeclaredType};
use tracing::info;

use crate::cli::error::HelpfulError;
use crate::cli::output::{column_flags, column_json, print_table};

/// Parse `name:type[:pk][:auto][:notnull][:unique][:default=LITERAL]`.
///
/// Returns the column and whether it was marked as the primary key.
pub fn parse_column_spec(spec: &str) -> anyhow::Result<(ColumnSpec, bool)> {
    let mut parts = spec.split(':');
    let name = parts.next().map(str::trim).unwrap_or_default();
    let type_name = parts.next().map(str::trim).unwrap_or_default();
    if name.is_empty() || type_name.is_empty() {
        return Err(HelpfulError::invalid_column_spec(spec).into());
    }

    let mut column = ColumnSpec::new(name, DeclaredType::from_sql(type_name));
    let mut is_pk = false;
    for flag in parts {
        let flag = flag.trim();
        if let Some(literal) = flag.strip_prefix("default=") {
            column = column.default_value(literal);
            continue;
        }
        match flag.to_ascii_lowercase().as_str() {
            "pk" => is_pk = true,
            "auto" => column = column.auto_increment(),
            "notnull" => column = column.not_null(),
            "unique" => column = column.unique(),
            _ => {
                return Err(HelpfulError::invalid_column_spec(spec)
                    .with_context(format!("Unknown flag '{}'", flag))
                    .into())
            }
        }
    }
    Ok((column, is_pk))
}

/// Columns plus the index of the single `:pk` column.
pub fn parse_column_specs(specs: &[String]) -> anyhow::Result<(Vec<ColumnSpec>, Option<usize>)> {
    let mut columns = Vec::with_capacity(specs.len());
    let mut primary_key = None;
    for (index, spec) in specs.iter().enumerate() {
        let (column, is_pk) = parse_column_spec(spec)?;
        if is_pk {
            if primary_key.is_some() {
                return Err(HelpfulError::new("More than one column marked :pk")
                    .with_context("A table has at most one primary key column")
                    .into());
            }
            primary_key = Some(index);
        }
        columns.push(column);
    }
    Ok((columns, primary_key))
}

pub fn list_tables(db: &Database, json: bool) -> anyhow::Result<()> {
    let names = db.provider().list_tables()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }
    if names.is_empty() {
        println!("No tables.");
        return Ok(());
    }
    print_table(&["TABLE"], names.into_iter().map(|n| vec![n]).collect());
    Ok(())
}

pub fn show_schema(db: &Database, table: &str, json: bool) -> anyhow::Result<()> {
    let schema = db.provider().get_columns(table)?;
    if json {
        let columns: Vec<_> = schema.columns.iter().map(column_json).collect();
        let payload = serde_json::json!({
            "table": schema.table,
            "engine": schema.engine.as_str(),
            "columns": columns,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{} ({})", schema.table, schema.engine.display_name());
    let rows = schema
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.declared_type.to_string(),
                c.sql_type.clone(),
                column_flags(c),
                c.default_value.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["COLUMN", "TYPE", "SQL TYPE", "FLAGS", "DEFAULT"], rows);
    Ok(())
}

pub fn create_table(db: &Database, name: &str, specs: &[String]) -> anyhow::Result<()> {
    let (columns, primary_key) = parse_column_specs(specs)?;
    db.writer()?.create_table(name, &columns, primary_key)?;
    info!(table = name, columns = columns.len(), "Created table");
    println!("Created table '{}' with {} column(s).", name, columns.len());
    Ok(())
}

pub fn drop_table(db: &Database, name: &str) -> anyhow::Result<()> {
    db.writer()?.delete_table(name)?;
    println!("Dropped table '{}'.", name);
    Ok(())
}

pub fn clear_table(db: &Database, name: &str) -> anyhow::Result<()> {
    db.writer()?.clear_table(name)?;
    println!("Cleared table '{}'.", name);
    Ok(())
}

pub fn add_column(db: &Database, table: &str, name: &str, type_name: &str) -> anyhow::Result<()> {
    let declared = DeclaredType::from_sql(type_name);
    db.writer()?.add_column(table, name, &declared)?;
    println!("Added column '{}' ({}) to '{}'.", name, declared, table);
    Ok(())
}

/// Options for `modify-column`; unset fields keep the current definition.
#[derive(Debug, Default)]
pub struct ModifyColumnArgs {
    pub rename: Option<String>,
    pub type_name: Option<String>,
    /// `Some(true)` keys the column, `Some(false)` drops its key
    pub primary_key: Option<bool>,
}

/// Resolve the new name, type and key flag; unset arguments keep the
/// column's current definition.
pub fn plan_modify(
    current: &Column,
    args: ModifyColumnArgs,
) -> anyhow::Result<(String, DeclaredType, bool)> {
    if args.rename.is_none() && args.type_name.is_none() && args.primary_key.is_none() {
        return Err(HelpfulError::new("Nothing to change")
            .with_suggestions([
                "TRY: --rename <new_name>",
                "TRY: --type <type>",
                "TRY: --pk or --no-pk",
            ])
            .into());
    }

    let new_name = args.rename.unwrap_or_else(|| current.name.clone());
    let new_type = args
        .type_name
        .as_deref()
        .map(DeclaredType::from_sql)
        .unwrap_or_else(|| current.declared_type.clone());
    let is_pk = args.primary_key.unwrap_or(current.is_primary_key);
    Ok((new_name, new_type, is_pk))
}

pub fn modify_column(
    db: &Database,
    table: &str,
    column: &str,
    args: ModifyColumnArgs,
) -> anyhow::Result<()> {
    let writer = db.writer()?;
    let schema = writer.get_columns(table)?;
    let current = schema
        .column(column)
        .ok_or_else(|| DbError::column_not_found(table, column))?;

    let (new_name, new_type, is_pk) = plan_modify(current, args)?;
    writer.modify_column(table, &current.name, &new_name, &new_type, is_pk)?;
    println!("Modified column '{}.{}' -> {} {}.", table, current.name, new_name, new_type);
    Ok(())
}

pub fn delete_column(db: &Database, table: &str, name: &str) -> anyhow::Result<()> {
    db.writer()?.delete_column(table, name)?;
    println!("Deleted column '{}' from '{}'.", name, table);
    Ok(())
}

pub fn make_primary_key(db: &Database, table: &str, column: &str) -> anyhow::Result<()> {
    db.writer()?.make_primary_key(table, column)?;
    println!("'{}' is now the primary key of '{}'.", column, table);
    Ok(())
}

pub fn migrate_vectors(db: &mut Database, table: &str) -> anyhow::Result<()> {
    let adopted = db.adopt_legacy_vector_columns(table)?;
    if adopted.is_empty() {
        println!("No legacy vector columns found in '{}'.", table);
        return Ok(());
    }
    let rows = adopted
        .into_iter()
        .map(|(column, declared)| vec![column, declared.to_string()])
        .collect();
    print_table(&["COLUMN", "ADOPTED TYPE"], rows);
    Ok(())
}

//! Output formatting utilities for CLI commands
//!
//! Tables go to stdout through comfy-table; `--json` output is built with
//! serde_json so it can be piped into other tools.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde_json::{Map, Value as JsonValue};
use sqlpane_db::{AssetResolver, Column, DecodeWarning, Row, Value};

/// Print a table with a cyan header row
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Render a cell for display.
///
/// References show their asset path when the resolver still knows the
/// handle.
pub fn format_value(value: &Value, resolver: &dyn AssetResolver) -> String {
    match value {
        Value::ObjectRef(r) => match resolver.logical_path(r.kind, r.handle) {
            Some(path) => path,
            None => format!("<missing {}#{}>", r.kind, r.handle.0),
        },
        Value::Text(text) => truncate(text, 80),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}

/// Cells of `row` in `columns` order; absent cells render empty.
pub fn row_cells(columns: &[String], row: &Row, resolver: &dyn AssetResolver) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            row.get(column)
                .map(|value| format_value(value, resolver))
                .unwrap_or_default()
        })
        .collect()
}

fn value_json(value: &Value, resolver: &dyn AssetResolver) -> JsonValue {
    match value {
        Value::ObjectRef(r) => {
            let mut json = value.to_json();
            if let (Some(path), JsonValue::Object(map)) =
                (resolver.logical_path(r.kind, r.handle), &mut json)
            {
                map.insert("path".to_string(), JsonValue::String(path));
            }
            json
        }
        other => other.to_json(),
    }
}

/// Rows as an array of objects keyed by column name.
pub fn rows_to_json(columns: &[String], rows: &[Row], resolver: &dyn AssetResolver) -> JsonValue {
    let objects = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for column in columns {
                let value = row
                    .get(column)
                    .map(|v| value_json(v, resolver))
                    .unwrap_or(JsonValue::Null);
                object.insert(column.clone(), value);
            }
            JsonValue::Object(object)
        })
        .collect();
    JsonValue::Array(objects)
}

/// Key/flag summary used by `schema` output.
pub fn column_flags(column: &Column) -> String {
    let mut flags = Vec::new();
    if column.is_primary_key {
        flags.push("PK");
    }
    if column.is_auto_increment {
        flags.push("AUTO");
    }
    if column.is_not_null {
        flags.push("NOT NULL");
    }
    if column.is_unique {
        flags.push("UNIQUE");
    }
    flags.join(", ")
}

pub fn column_json(column: &Column) -> JsonValue {
    serde_json::json!({
        "name": column.name,
        "sql_type": column.sql_type,
        "declared_type": column.declared_type.to_string(),
        "primary_key": column.is_primary_key,
        "auto_increment": column.is_auto_increment,
        "not_null": column.is_not_null,
        "unique": column.is_unique,
        "default": column.default_value,
    })
}

/// Decode fallbacks go to stderr so table output stays clean.
pub fn print_warnings(table: &str, warnings: &[DecodeWarning]) {
    for warning in warnings {
        eprintln!("WARNING: {}: {}", table, warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlpane_db::{AssetRegistry, DeclaredType, Engine, ObjectKind, ObjectRef, Vec2};

    #[test]
    fn test_format_value_resolves_references() {
        let registry = AssetRegistry::new();
        let handle = registry.register(ObjectKind::Sprite, "Sprites/hero.png");
        let value = Value::ObjectRef(ObjectRef {
            kind: ObjectKind::Sprite,
            handle,
        });
        assert_eq!(format_value(&value, &registry), "Sprites/hero.png");

        registry.unregister(handle);
        assert!(format_value(&value, &registry).starts_with("<missing"));
        assert_eq!(format_value(&Value::Null, &registry), "NULL");
        assert_eq!(format_value(&Value::Vector2(Vec2::new(1.0, 2.5)), &registry), "(1, 2.5)");
    }

    #[test]
    fn test_long_text_is_truncated() {
        let registry = AssetRegistry::new();
        let long = "x".repeat(200);
        let shown = format_value(&Value::Text(long), &registry);
        assert_eq!(shown.chars().count(), 80);
        assert!(shown.ends_with('…'));
    }

    #[test]
    fn test_rows_to_json() {
        let registry = AssetRegistry::new();
        let columns = vec!["id".to_string(), "pos".to_string(), "note".to_string()];
        let rows = vec![Row::new()
            .with("id", 1_i64)
            .with("pos", Vec2::new(0.5, 1.0))];

        let json = rows_to_json(&columns, &rows, &registry);
        assert_eq!(
            json,
            serde_json::json!([{ "id": 1, "pos": { "x": 0.5, "y": 1.0 }, "note": null }])
        );
    }

    #[test]
    fn test_row_cells_follow_column_order() {
        let registry = AssetRegistry::new();
        let columns = vec!["b".to_string(), "a".to_string(), "c".to_string()];
        let row = Row::new().with("a", "first").with("b", 2_i64);
        assert_eq!(row_cells(&columns, &row, &registry), vec!["2", "first", ""]);
    }

    #[test]
    fn test_column_flags() {
        let column = sqlpane_db::ColumnSpec::new("id", DeclaredType::Integer)
            .auto_increment()
            .to_column(Engine::Sqlite, true);
        assert_eq!(column_flags(&column), "PK, AUTO");
        assert_eq!(column_json(&column)["declared_type"], "INTEGER");
    }
}

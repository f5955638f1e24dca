//! SQL text builders shared by both providers.

use crate::types::{Column, DeclaredType, Engine};

/// Quote an identifier for `engine`, doubling embedded quote characters.
pub fn quote_ident(engine: Engine, name: &str) -> String {
    let quote = match engine {
        Engine::Sqlite => '"',
        Engine::MySql => '`',
    };
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push(quote);
    for ch in name.chars() {
        if ch == quote {
            escaped.push(quote);
        }
        escaped.push(ch);
    }
    escaped.push(quote);
    escaped
}

/// Quote a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Comma-separated quoted identifiers.
pub fn ident_list<'a>(engine: Engine, names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(|name| quote_ident(engine, name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `?, ?, ?` for `count` parameters.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// One column definition as it appears in `CREATE TABLE` or `CHANGE COLUMN`.
///
/// The primary key is always emitted inline. On SQLite, `AUTOINCREMENT` is
/// added only when `autoincrement_keyword` is set and the column is an
/// `INTEGER PRIMARY KEY`; SQLite rejects it anywhere else.
pub fn column_definition(engine: Engine, column: &Column, autoincrement_keyword: bool) -> String {
    let mut def = quote_ident(engine, &column.name);
    if !column.sql_type.trim().is_empty() {
        def.push(' ');
        def.push_str(column.sql_type.trim());
    }

    match engine {
        Engine::Sqlite => {
            if column.is_primary_key {
                def.push_str(" PRIMARY KEY");
                if autoincrement_keyword
                    && column.is_auto_increment
                    && DeclaredType::from_sql(&column.sql_type) == DeclaredType::Integer
                {
                    def.push_str(" AUTOINCREMENT");
                }
            }
            push_constraints(engine, &mut def, column);
        }
        Engine::MySql => {
            push_constraints(engine, &mut def, column);
            if column.is_auto_increment {
                def.push_str(" AUTO_INCREMENT");
            }
            if column.is_primary_key {
                def.push_str(" PRIMARY KEY");
            }
        }
    }
    def
}

fn push_constraints(engine: Engine, def: &mut String, column: &Column) {
    if column.is_not_null {
        def.push_str(" NOT NULL");
    }
    if column.is_unique && !column.is_primary_key {
        def.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default_value {
        def.push_str(" DEFAULT ");
        match engine {
            // table_info reports expression defaults without their parentheses
            Engine::Sqlite => {
                def.push('(');
                def.push_str(default.trim());
                def.push(')');
            }
            Engine::MySql => def.push_str(default),
        }
    }
}

/// `CREATE TABLE name (defs...)`.
///
/// A composite key (several columns flagged) becomes a table constraint.
pub fn create_table_sql(
    engine: Engine,
    table: &str,
    columns: &[Column],
    autoincrement_keyword: bool,
) -> String {
    let key_columns: Vec<&str> = columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.as_str())
        .collect();

    let mut defs: Vec<String> = if key_columns.len() > 1 {
        columns
            .iter()
            .map(|column| {
                let mut plain = column.clone();
                plain.is_primary_key = false;
                plain.is_auto_increment = false;
                column_definition(engine, &plain, false)
            })
            .collect()
    } else {
        columns
            .iter()
            .map(|column| column_definition(engine, column, autoincrement_keyword))
            .collect()
    };
    if key_columns.len() > 1 {
        defs.push(format!("PRIMARY KEY ({})", ident_list(engine, key_columns)));
    }

    format!(
        "CREATE TABLE {} ({})",
        quote_ident(engine, table),
        defs.join(", ")
    )
}

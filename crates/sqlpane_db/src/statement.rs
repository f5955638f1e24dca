//! Ad-hoc statement classification.
//!
//! Decides whether a free-form statement returns rows and whether it is safe
//! to run in read-only mode. String literals, quoted identifiers and comments
//! are blanked out before keywords are inspected.

use thiserror::Error;

const ROW_PREFIXES: &[&str] = &[
    "SELECT", "WITH", "EXPLAIN", "PRAGMA", "SHOW", "DESCRIBE", "DESC", "VALUES",
];
const READ_ONLY_PREFIXES: &[&str] = &[
    "SELECT", "WITH", "EXPLAIN", "PRAGMA", "SHOW", "DESCRIBE", "DESC", "VALUES",
];
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "DROP", "CREATE", "ALTER", "TRUNCATE", "RENAME",
    "ATTACH", "DETACH", "VACUUM", "REINDEX", "GRANT", "REVOKE", "LOCK", "CALL", "LOAD",
];

/// What executing a statement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Produces a result set
    Query,
    /// Produces an affected-row count
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    #[error("Query is empty")]
    Empty,
    #[error("Multiple statements are not allowed")]
    MultipleStatements,
    #[error("Read-only queries must start with SELECT, WITH, EXPLAIN, PRAGMA, SHOW or DESCRIBE")]
    NotReadOnly,
    #[error("Query contains forbidden keyword: {0}")]
    ForbiddenKeyword(String),
    #[error("PRAGMA assignments are not read-only")]
    PragmaAssignment,
}

/// Classify a single statement by its leading keyword.
pub fn classify(sql: &str) -> StatementKind {
    match first_keyword(&sanitize_sql(sql)) {
        Some(keyword) if ROW_PREFIXES.contains(&keyword.as_str()) => StatementKind::Query,
        _ => StatementKind::Command,
    }
}

/// Validate that a statement is a single read-only statement.
pub fn validate_read_only(sql: &str) -> Result<(), StatementError> {
    let sanitized = sanitize_sql(sql);
    if sanitized.trim().is_empty() {
        return Err(StatementError::Empty);
    }

    validate_single_statement(&sanitized)?;

    let first = first_keyword(&sanitized).ok_or(StatementError::NotReadOnly)?;
    if !READ_ONLY_PREFIXES.contains(&first.as_str()) {
        return Err(StatementError::NotReadOnly);
    }
    if first == "PRAGMA" && sanitized.contains('=') {
        return Err(StatementError::PragmaAssignment);
    }

    for (token, next) in tokens_upper(&sanitized) {
        // REPLACE(...) is also a string function
        if token == "REPLACE" && next == Some('(') {
            continue;
        }
        if FORBIDDEN_KEYWORDS.contains(&token.as_str()) {
            return Err(StatementError::ForbiddenKeyword(token));
        }
    }

    Ok(())
}

fn validate_single_statement(sql: &str) -> Result<(), StatementError> {
    let mut semicolons = sql.match_indices(';').map(|(idx, _)| idx);
    let first = semicolons.next();
    if semicolons.next().is_some() {
        return Err(StatementError::MultipleStatements);
    }
    if let Some(idx) = first {
        if sql[idx + 1..].chars().any(|c| !c.is_whitespace()) {
            return Err(StatementError::MultipleStatements);
        }
    }
    Ok(())
}

fn first_keyword(sql: &str) -> Option<String> {
    let mut current = String::new();
    for ch in sql.chars() {
        if ch.is_ascii_alphabetic() {
            current.push(ch);
        } else if !current.is_empty() || !(ch.is_whitespace() || ch == '(') {
            break;
        }
    }
    if current.is_empty() {
        None
    } else {
        Some(current.to_ascii_uppercase())
    }
}

/// Upper-cased word tokens, each with the next non-space character after it.
fn tokens_upper(sql: &str) -> Vec<(String, Option<char>)> {
    let is_word = |ch: char| ch.is_ascii_alphanumeric() || ch == '_';
    let mut tokens = Vec::new();
    let mut rest = sql;
    while let Some(start) = rest.find(is_word) {
        let tail = &rest[start..];
        let end = tail.find(|ch: char| !is_word(ch)).unwrap_or(tail.len());
        let after = &tail[end..];
        tokens.push((
            tail[..end].to_ascii_uppercase(),
            after.chars().find(|ch| !ch.is_whitespace()),
        ));
        rest = after;
    }
    tokens
}

/// Blank out literals, quoted identifiers and comments, keeping offsets.
fn sanitize_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(ch) = chars.next() {
        if in_line_comment {
            in_line_comment = ch != '\n';
            out.push(' ');
            continue;
        }
        if in_block_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
                out.push(' ');
            }
            out.push(' ');
            continue;
        }
        if let Some(q) = quote {
            if ch == q {
                if chars.peek() == Some(&q) {
                    chars.next();
                    out.push(' ');
                } else {
                    quote = None;
                }
            }
            out.push(' ');
            continue;
        }

        match ch {
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                in_line_comment = true;
                out.push_str("  ");
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block_comment = true;
                out.push_str("  ");
            }
            '\'' | '"' | '`' => {
                quote = Some(ch);
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_row_returning_statements() {
        assert_eq!(classify("select * from t"), StatementKind::Query);
        assert_eq!(classify("  (SELECT 1)"), StatementKind::Query);
        assert_eq!(classify("PRAGMA table_info(t)"), StatementKind::Query);
        assert_eq!(classify("SHOW TABLES"), StatementKind::Query);
        assert_eq!(classify("-- comment\nSELECT 1"), StatementKind::Query);
        assert_eq!(classify("INSERT INTO t VALUES (1)"), StatementKind::Command);
        assert_eq!(classify("UPDATE t SET a = 'SELECT'"), StatementKind::Command);
        assert_eq!(classify(""), StatementKind::Command);
    }

    #[test]
    fn read_only_accepts_queries() {
        assert!(validate_read_only("SELECT * FROM events").is_ok());
        assert!(validate_read_only("WITH cte AS (SELECT 1) SELECT * FROM cte").is_ok());
        assert!(validate_read_only("DESCRIBE events").is_ok());
        assert!(validate_read_only("PRAGMA table_info(events)").is_ok());
        assert!(validate_read_only("SELECT 1; ").is_ok());
    }

    #[test]
    fn read_only_rejects_writes() {
        assert_eq!(
            validate_read_only("DELETE FROM events"),
            Err(StatementError::NotReadOnly)
        );
        assert_eq!(
            validate_read_only("PRAGMA foreign_keys = OFF"),
            Err(StatementError::PragmaAssignment)
        );
        assert_eq!(
            validate_read_only("SELECT 1; DROP TABLE events"),
            Err(StatementError::MultipleStatements)
        );
        assert_eq!(
            validate_read_only("WITH x AS (DELETE FROM t RETURNING *) SELECT * FROM x"),
            Err(StatementError::ForbiddenKeyword("DELETE".to_string()))
        );
        assert_eq!(validate_read_only("  "), Err(StatementError::Empty));
    }

    #[test]
    fn replace_function_is_read_only() {
        assert!(validate_read_only("SELECT REPLACE(name, 'a', 'b') FROM units").is_ok());
        assert!(validate_read_only("SELECT replace (name, 'a', 'b') FROM units").is_ok());
        assert_eq!(
            validate_read_only("WITH x AS (SELECT 1) REPLACE INTO units SELECT * FROM x"),
            Err(StatementError::ForbiddenKeyword("REPLACE".to_string()))
        );
    }

    #[test]
    fn literals_and_comments_are_ignored() {
        assert!(validate_read_only("SELECT 1 -- INSERT INTO events").is_ok());
        assert!(validate_read_only("SELECT 1 /* INSERT */ FROM events").is_ok());
        assert!(validate_read_only("SELECT 'DROP TABLE x' FROM events").is_ok());
        assert!(validate_read_only("SELECT 'it''s; fine' FROM events").is_ok());
        // Backslash is not an escape everywhere; a trailing quote ends the literal.
        assert!(validate_read_only(r"SELECT 'a\'; DROP TABLE t; --'").is_err());
        assert!(validate_read_only("SELECT `delete` FROM events").is_ok());
    }
}

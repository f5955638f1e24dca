//! Query command - run free-form SQL
//!
//! Row-returning statements print a table; anything else prints the number
//! of affected rows. The last query is kept in the session so `--last` can
//! run it again.

use sqlpane_db::{Database, QueryOutput};

use crate::cli::error::HelpfulError;
use crate::cli::output::{print_table, row_cells, rows_to_json};
use crate::cli::session::Session;

#[derive(Debug)]
pub struct QueryArgs {
    pub sql: Option<String>,
    pub last: bool,
    pub read_only: bool,
    pub json: bool,
}

/// Pick the SQL to run: the argument, or the session's last query.
pub fn resolve_sql(args: &QueryArgs, session: &Session) -> anyhow::Result<String> {
    match (&args.sql, args.last) {
        (Some(_), true) => Err(HelpfulError::new("Pass either SQL or --last, not both").into()),
        (Some(sql), false) => Ok(sql.clone()),
        (None, true) => session.last_query.clone().ok_or_else(|| {
            HelpfulError::new("No previous query in this session")
                .with_suggestion("TRY: sqlpane query \"SELECT * FROM <table>\"")
                .into()
        }),
        (None, false) => Err(HelpfulError::new("No SQL given")
            .with_suggestion("TRY: sqlpane query \"SELECT * FROM <table>\"")
            .into()),
    }
}

pub fn run(db: &mut Database, args: QueryArgs, session: &mut Session) -> anyhow::Result<()> {
    let sql = resolve_sql(&args, session)?;
    db.set_read_only(args.read_only);
    db.set_query(sql.clone());
    let output = db.execute_query()?;

    session.last_query = Some(sql);
    if let Err(err) = session.save() {
        tracing::warn!("Failed to save session: {:#}", err);
    }

    let resolver = db.provider().codec().resolver().as_ref();
    match output {
        QueryOutput::Rows { columns, rows } => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&rows_to_json(&columns, &rows, resolver))?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("0 rows");
                return Ok(());
            }
            let headers: Vec<&str> = columns.iter().map(String::as_str).collect();
            let count = rows.len();
            let cells = rows.iter().map(|row| row_cells(&columns, row, resolver)).collect();
            print_table(&headers, cells);
            println!("{} row(s)", count);
        }
        QueryOutput::Affected(count) => {
            if args.json {
                println!("{}", serde_json::json!({ "affected": count }));
            } else {
                println!("{} row(s) affected", count);
            }
        }
    }
    Ok(())
}

//! Database backend abstraction layer.
//!
//! Synchronous connection over the sqlx SQLite and MySQL drivers.
//! - One short-lived connection per provider operation
//! - Blocking API; each call runs to completion on the owner's runtime
//! - Raw values only (`DbValue`); typing happens in the codec

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection, MySql, Row, Sqlite, TypeInfo, ValueRef};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::{debug, debug_span};

use crate::error::DbError;
use crate::types::Engine;

/// Errors from database backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    engine: Engine,
    url: String,
}

impl ConnectionConfig {
    /// Parse a connection url.
    ///
    /// Supported schemes: `sqlite:`, `mysql://`, `mariadb://` (treated as MySQL).
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        let url = url.trim();
        if url.starts_with("sqlite:") {
            if url.len() == "sqlite:".len() {
                return Err(DbError::InvalidUrl(url.to_string()));
            }
            return Ok(Self {
                engine: Engine::Sqlite,
                url: url.to_string(),
            });
        }
        if url.starts_with("mysql://") {
            return Ok(Self {
                engine: Engine::MySql,
                url: url.to_string(),
            });
        }
        if let Some(rest) = url.strip_prefix("mariadb://") {
            return Ok(Self {
                engine: Engine::MySql,
                url: format!("mysql://{}", rest),
            });
        }
        Err(DbError::InvalidUrl(url.to_string()))
    }

    /// SQLite database file, created on first connect.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            engine: Engine::Sqlite,
            url: format!("sqlite:{}", path.as_ref().display()),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The url with any password replaced, for logs and error messages.
    pub fn redacted_url(&self) -> String {
        redact_password(&self.url)
    }
}

/// Build the runtime a provider drives its connections on.
pub fn build_runtime() -> Result<Arc<Runtime>, BackendError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map(Arc::new)
        .map_err(|e| BackendError::Runtime(e.to_string()))
}

/// Value type for query parameters and results.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Text content, also accepting UTF-8 blobs (MySQL reports some
    /// metadata columns with a binary collation).
    pub fn as_text(&self) -> Option<String> {
        match self {
            DbValue::Text(v) => Some(v.clone()),
            DbValue::Blob(v) => String::from_utf8(v.clone()).ok(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DbValue::Null => "null",
            DbValue::Integer(_) => "integer",
            DbValue::Real(_) => "real",
            DbValue::Text(_) => "text",
            DbValue::Blob(_) => "blob",
        }
    }
}

impl std::fmt::Display for DbValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbValue::Null => write!(f, "NULL"),
            DbValue::Integer(v) => write!(f, "{}", v),
            DbValue::Real(v) => write!(f, "{}", v),
            DbValue::Text(v) => write!(f, "{}", v),
            DbValue::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        DbValue::Integer(v as i64)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Real(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        DbValue::Blob(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    /// Create a new row with column names and values.
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T, BackendError> {
        self.values
            .get(index)
            .ok_or_else(|| {
                BackendError::TypeConversion(format!("Column index {} out of bounds", index))
            })
            .and_then(|v| T::from_db_value(v))
    }

    /// Get a value by column name (ASCII case-insensitive, metadata queries
    /// come back upper-cased on some MySQL versions).
    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T, BackendError> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| BackendError::TypeConversion(format!("Column '{}' not found", name)))?;
        self.get(index)
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column names.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Get the raw DbValue at an index.
    pub fn get_raw(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[DbValue] {
        &self.values
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<DbValue>) {
        (self.columns, self.values)
    }
}

/// Trait for converting from DbValue.
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError>;
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Text(v) => v
                .trim()
                .parse()
                .map_err(|_| BackendError::TypeConversion(format!("Expected integer, got '{}'", v))),
            DbValue::Null => Err(BackendError::TypeConversion(
                "i64 field is NULL - use Option<i64> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected integer".to_string())),
        }
    }
}

impl FromDbValue for f64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Real(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v as f64),
            DbValue::Null => Err(BackendError::TypeConversion(
                "f64 field is NULL - use Option<f64> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected real".to_string())),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Null => Err(BackendError::TypeConversion(
                "String field is NULL - use Option<String> for nullable columns".to_string(),
            )),
            other => other
                .as_text()
                .ok_or_else(|| BackendError::TypeConversion("Expected text".to_string())),
        }
    }
}

impl FromDbValue for bool {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v != 0),
            DbValue::Null => Err(BackendError::TypeConversion(
                "bool field is NULL - use Option<bool> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected boolean".to_string())),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}

impl FromDbValue for Vec<u8> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Blob(v) => Ok(v.clone()),
            DbValue::Text(v) => Ok(v.as_bytes().to_vec()),
            DbValue::Null => Err(BackendError::TypeConversion(
                "Vec<u8> field is NULL - use Option<Vec<u8>> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected blob".to_string())),
        }
    }
}

/// Statement execution shared by connections and open transactions.
///
/// DDL helpers (the rebuild primitive, the column type side channel) are
/// written against this trait so they run the same way inside or outside a
/// transaction.
pub trait SqlExecutor {
    fn engine(&self) -> Engine;

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError>;

    fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError>;

    fn query_optional(
        &mut self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<Option<DbRow>, BackendError> {
        let rows = self.query_all(sql, params)?;
        Ok(rows.into_iter().next())
    }

    fn query_scalar<T: FromDbValue>(
        &mut self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<T, BackendError>
    where
        Self: Sized,
    {
        let row = self
            .query_optional(sql, params)?
            .ok_or_else(|| BackendError::Query("Expected one row, got none".to_string()))?;
        row.get(0)
    }
}

enum Driver {
    Sqlite(SqliteConnection),
    MySql(MySqlConnection),
}

/// A single open connection.
pub struct DbConnection {
    runtime: Arc<Runtime>,
    driver: Driver,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("backend", &self.backend_name())
            .finish()
    }
}

impl DbConnection {
    /// Open a connection on the given runtime.
    pub fn open(config: &ConnectionConfig, runtime: Arc<Runtime>) -> Result<Self, BackendError> {
        let driver = match config.engine() {
            Engine::Sqlite => {
                let options = SqliteConnectOptions::from_str(config.url())?.create_if_missing(true);
                Driver::Sqlite(runtime.block_on(SqliteConnection::connect_with(&options))?)
            }
            Engine::MySql => Driver::MySql(runtime.block_on(MySqlConnection::connect(config.url()))?),
        };
        debug!(url = %config.redacted_url(), "Opened connection");
        Ok(Self { runtime, driver })
    }

    pub fn engine(&self) -> Engine {
        match self.driver {
            Driver::Sqlite(_) => Engine::Sqlite,
            Driver::MySql(_) => Engine::MySql,
        }
    }

    /// Get the backend name.
    pub fn backend_name(&self) -> &'static str {
        self.engine().display_name()
    }

    /// Execute a SQL statement (no results).
    pub fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        let span = debug_span!(
            "db.exec",
            op = sql_op_name(sql),
            sql_hash = %hash_sql(sql),
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let runtime = Arc::clone(&self.runtime);
        let affected = match &mut self.driver {
            Driver::Sqlite(conn) => runtime.block_on(sqlite_execute(conn, sql, params))?,
            Driver::MySql(conn) => runtime.block_on(mysql_execute(conn, sql, params))?,
        };

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(affected)
    }

    /// Execute a batch of SQL statements.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), BackendError> {
        let span = debug_span!(
            "db.exec_batch",
            op = "BATCH",
            sql_hash = %hash_sql(sql),
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let runtime = Arc::clone(&self.runtime);
        match &mut self.driver {
            Driver::Sqlite(conn) => {
                runtime.block_on(sqlx::raw_sql(sql).execute(&mut *conn))?;
            }
            Driver::MySql(conn) => {
                runtime.block_on(sqlx::raw_sql(sql).execute(&mut *conn))?;
            }
        }

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(())
    }

    /// Query and return all rows.
    pub fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        let span = debug_span!(
            "db.query",
            op = sql_op_name(sql),
            sql_hash = %hash_sql(sql),
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let runtime = Arc::clone(&self.runtime);
        let rows = match &mut self.driver {
            Driver::Sqlite(conn) => runtime.block_on(sqlite_query(conn, sql, params))?,
            Driver::MySql(conn) => runtime.block_on(mysql_query(conn, sql, params))?,
        };

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(rows)
    }

    /// Query and return the first row, if any.
    pub fn query_optional(
        &mut self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<Option<DbRow>, BackendError> {
        let rows = self.query_all(sql, params)?;
        Ok(rows.into_iter().next())
    }

    /// Query and return a single scalar value.
    pub fn query_scalar<T: FromDbValue>(
        &mut self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<T, BackendError> {
        let row = self
            .query_optional(sql, params)?
            .ok_or_else(|| BackendError::Query("Expected one row, got none".to_string()))?;
        row.get(0)
    }

    /// Run `op` inside a transaction.
    ///
    /// Commits when `op` succeeds; rolls back and returns its error otherwise.
    pub fn transaction<T, E, F>(&mut self, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut DbTransaction<'_>) -> Result<T, E>,
        E: From<BackendError> + std::fmt::Display,
    {
        let begin = match self.engine() {
            Engine::Sqlite => "BEGIN",
            Engine::MySql => "START TRANSACTION",
        };
        self.execute_batch(begin)?;

        let result = {
            let mut tx = DbTransaction { conn: self };
            op(&mut tx)
        };

        match result {
            Ok(value) => {
                self.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => match self.execute_batch("ROLLBACK") {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(E::from(BackendError::Transaction(format!(
                    "Transaction failed: {}; rollback failed: {}",
                    err, rollback_err
                )))),
            },
        }
    }

    /// Close the connection gracefully.
    pub fn close(self) -> Result<(), BackendError> {
        let runtime = self.runtime;
        match self.driver {
            Driver::Sqlite(conn) => runtime.block_on(conn.close())?,
            Driver::MySql(conn) => runtime.block_on(conn.close())?,
        }
        Ok(())
    }
}

impl SqlExecutor for DbConnection {
    fn engine(&self) -> Engine {
        DbConnection::engine(self)
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        DbConnection::execute(self, sql, params)
    }

    fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        DbConnection::query_all(self, sql, params)
    }
}

/// An open transaction; statements run on the borrowed connection.
pub struct DbTransaction<'a> {
    conn: &'a mut DbConnection,
}

impl<'a> DbTransaction<'a> {
    pub fn engine(&self) -> Engine {
        self.conn.engine()
    }

    pub fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        self.conn.execute(sql, params)
    }

    pub fn execute_batch(&mut self, sql: &str) -> Result<(), BackendError> {
        self.conn.execute_batch(sql)
    }

    pub fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        self.conn.query_all(sql, params)
    }
}

impl SqlExecutor for DbTransaction<'_> {
    fn engine(&self) -> Engine {
        self.conn.engine()
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        self.conn.execute(sql, params)
    }

    fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        self.conn.query_all(sql, params)
    }
}

async fn sqlite_execute(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[DbValue],
) -> Result<u64, sqlx::Error> {
    if params.is_empty() {
        return Ok(sqlx::raw_sql(sql).execute(&mut *conn).await?.rows_affected());
    }
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_sqlite(query, value);
    }
    Ok(query.execute(&mut *conn).await?.rows_affected())
}

async fn sqlite_query(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[DbValue],
) -> Result<Vec<DbRow>, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_sqlite(query, value);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(sqlite_row_to_db_row).collect()
}

fn bind_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DbValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DbValue::Null => query.bind(None::<String>),
        DbValue::Integer(v) => query.bind(*v),
        DbValue::Real(v) => query.bind(*v),
        DbValue::Text(v) => query.bind(v.clone()),
        DbValue::Blob(v) => query.bind(v.clone()),
    }
}

fn sqlite_row_to_db_row(row: &SqliteRow) -> Result<DbRow, sqlx::Error> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut values = Vec::with_capacity(columns.len());
    for index in 0..columns.len() {
        values.push(sqlite_value(row, index)?);
    }
    Ok(DbRow::new(columns, values))
}

/// SQLite reports the storage class of each value, not the declared type.
fn sqlite_value(row: &SqliteRow, index: usize) -> Result<DbValue, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(DbValue::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => DbValue::Integer(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "NUMERIC" => DbValue::Real(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => DbValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => DbValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

async fn mysql_execute(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[DbValue],
) -> Result<u64, sqlx::Error> {
    if params.is_empty() {
        return Ok(sqlx::raw_sql(sql).execute(&mut *conn).await?.rows_affected());
    }
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_mysql(query, value);
    }
    Ok(query.execute(&mut *conn).await?.rows_affected())
}

async fn mysql_query(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[DbValue],
) -> Result<Vec<DbRow>, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_mysql(query, value);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(mysql_row_to_db_row).collect()
}

fn bind_mysql<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &DbValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        DbValue::Null => query.bind(None::<String>),
        DbValue::Integer(v) => query.bind(*v),
        DbValue::Real(v) => query.bind(*v),
        DbValue::Text(v) => query.bind(v.clone()),
        DbValue::Blob(v) => query.bind(v.clone()),
    }
}

fn mysql_row_to_db_row(row: &MySqlRow) -> Result<DbRow, sqlx::Error> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut values = Vec::with_capacity(columns.len());
    for index in 0..columns.len() {
        values.push(mysql_value(row, index)?);
    }
    Ok(DbRow::new(columns, values))
}

fn mysql_value(row: &MySqlRow, index: usize) -> Result<DbValue, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(DbValue::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    if type_name.ends_with("UNSIGNED") {
        let v = row.try_get_unchecked::<u64, _>(index)?;
        return Ok(i64::try_from(v)
            .map(DbValue::Integer)
            .unwrap_or_else(|_| DbValue::Text(v.to_string())));
    }

    let value = match type_name.as_str() {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" | "BOOLEAN" => {
            DbValue::Integer(row.try_get_unchecked::<i64, _>(index)?)
        }
        "FLOAT" => DbValue::Real(row.try_get_unchecked::<f32, _>(index)? as f64),
        "DOUBLE" => DbValue::Real(row.try_get_unchecked::<f64, _>(index)?),
        "DATE" => DbValue::Text(
            row.try_get_unchecked::<chrono::NaiveDate, _>(index)?
                .format("%Y-%m-%d")
                .to_string(),
        ),
        "DATETIME" | "TIMESTAMP" => DbValue::Text(
            row.try_get_unchecked::<chrono::NaiveDateTime, _>(index)?
                .format("%Y-%m-%d %H:%M:%S%.f")
                .to_string(),
        ),
        "TIME" => DbValue::Text(
            row.try_get_unchecked::<chrono::NaiveTime, _>(index)?
                .format("%H:%M:%S%.f")
                .to_string(),
        ),
        "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT"
        | "GEOMETRY" => DbValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        // DECIMAL stays textual so no precision is lost before the codec sees it.
        _ => DbValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

fn redact_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    let userinfo = &rest[..at];
    match userinfo.find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..scheme_end + 3],
            &userinfo[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}

fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

fn hash_sql(sql: &str) -> String {
    // FNV-1a 64-bit hash for low-cardinality, stable identification.
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}

//! A rebuild that fails at any step leaves the original table untouched.

use std::sync::Arc;

use sqlpane_db::rebuild::{rebuild_table, RebuildPlan};
use sqlpane_db::{
    build_runtime, open_provider, AssetRegistry, BackendError, ColumnSpec, ConnectionConfig,
    DatabaseProvider, DbConnection, DbError, DbRow, DbValue, DeclaredType, Engine, Row,
    SqlExecutor, Vec2,
};
use tempfile::TempDir;

/// Passes statements through until one starts with `fail_on`.
struct FailingExecutor<'a, E: SqlExecutor> {
    inner: &'a mut E,
    fail_on: &'static str,
    executed: Vec<String>,
}

impl<'a, E: SqlExecutor> FailingExecutor<'a, E> {
    fn new(inner: &'a mut E, fail_on: &'static str) -> Self {
        Self {
            inner,
            fail_on,
            executed: Vec::new(),
        }
    }
}

impl<E: SqlExecutor> SqlExecutor for FailingExecutor<'_, E> {
    fn engine(&self) -> Engine {
        self.inner.engine()
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        if sql.starts_with(self.fail_on) {
            return Err(BackendError::Query(format!("injected failure: {}", sql)));
        }
        self.executed.push(sql.to_string());
        self.inner.execute(sql, params)
    }

    fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        self.inner.query_all(sql, params)
    }
}

struct Fixture {
    _tmp: TempDir,
    config: ConnectionConfig,
    provider: Box<dyn DatabaseProvider>,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let config = ConnectionConfig::sqlite(tmp.path().join("rebuild.db"));
    let provider = open_provider(config.clone(), Arc::new(AssetRegistry::new())).unwrap();
    provider
        .create_table(
            "units",
            &[
                ColumnSpec::new("id", DeclaredType::Integer).auto_increment(),
                ColumnSpec::new("pos", DeclaredType::Vector2),
                ColumnSpec::new("team", DeclaredType::Text),
            ],
            Some(0),
        )
        .unwrap();
    for (i, team) in ["red", "red", "blue"].iter().enumerate() {
        let row = Row::new()
            .with("pos", Vec2::new(i as f32, 1.0))
            .with("team", *team);
        provider.insert_row("units", &row).unwrap();
    }
    Fixture {
        _tmp: tmp,
        config,
        provider,
    }
}

fn assert_untouched(provider: &dyn DatabaseProvider) {
    let schema = provider.get_columns("units").unwrap();
    assert_eq!(schema.column_names(), vec!["id", "pos", "team"]);
    assert_eq!(provider.get_primary_key_column("units").unwrap().as_deref(), Some("id"));
    assert_eq!(provider.get_column_type("units", "pos").unwrap(), "Vector2");
    assert_eq!(provider.fetch_rows("units", None).unwrap().len(), 3);
    assert_eq!(provider.list_tables().unwrap(), vec!["units".to_string()]);
}

fn run_failing_rebuild(fx: &Fixture, fail_on: &'static str) -> Vec<String> {
    let schema = fx.provider.get_columns("units").unwrap();
    let plan = RebuildPlan::modify_column(&schema, 1, "position", &DeclaredType::Vector2, false, true);

    let mut conn = DbConnection::open(&fx.config, build_runtime().unwrap()).unwrap();
    let mut executed = Vec::new();
    let result = conn.transaction(|tx| {
        let mut failing = FailingExecutor::new(tx, fail_on);
        let outcome = rebuild_table(&mut failing, &plan);
        executed = failing.executed;
        outcome
    });
    assert!(result.is_err());
    conn.close().unwrap();
    executed
}

#[test]
fn test_failure_on_copy_rolls_back() {
    let fx = fixture();
    let executed = run_failing_rebuild(&fx, "INSERT INTO");
    assert_eq!(executed.len(), 1);
    assert!(executed[0].starts_with("CREATE TABLE"));
    assert_untouched(fx.provider.as_ref());
}

#[test]
fn test_failure_after_drop_rolls_back() {
    let fx = fixture();
    let executed = run_failing_rebuild(&fx, "ALTER TABLE");
    assert_eq!(executed.len(), 3);
    assert!(executed[2].starts_with("DROP TABLE"));
    assert_untouched(fx.provider.as_ref());
}

#[test]
fn test_key_on_duplicate_column_fails_cleanly() {
    let fx = fixture();

    // Bypasses the duplicate pre-check in make_primary_key; the copy itself
    // must then fail on the new key.
    let err = fx
        .provider
        .modify_column("units", "team", "team", &DeclaredType::Text, true)
        .unwrap_err();
    assert!(matches!(err, DbError::SchemaModificationFailed { .. }));
    assert_untouched(fx.provider.as_ref());

    let err = fx.provider.make_primary_key("units", "team").unwrap_err();
    assert!(matches!(err, DbError::DuplicateValueViolation { .. }));
    assert_untouched(fx.provider.as_ref());
}

#[test]
fn test_successful_rebuild_leaves_consistent_database() {
    let fx = fixture();
    fx.provider
        .modify_column("units", "pos", "position", &DeclaredType::Vector2, false)
        .unwrap();

    let tables = fx.provider.list_tables().unwrap();
    assert_eq!(tables, vec!["units".to_string()]);
    let mut conn = DbConnection::open(&fx.config, build_runtime().unwrap()).unwrap();
    let check: Vec<DbRow> = conn.query_all("PRAGMA foreign_key_check", &[]).unwrap();
    assert!(check.is_empty());
    let integrity: String = conn.query_scalar("PRAGMA integrity_check", &[]).unwrap();
    assert_eq!(integrity, "ok");
    conn.close().unwrap();
}

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn sqlpane_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sqlpane"))
}

/// Run the CLI with an isolated home directory.
fn run_cli(home: &Path, args: &[&str]) -> Output {
    Command::new(sqlpane_bin())
        .args(args)
        .env("SQLPANE_HOME", home)
        .env("RUST_LOG", "error")
        .env_remove("SQLPANE_URL")
        .output()
        .expect("failed to execute sqlpane CLI")
}

fn run_ok(home: &Path, args: &[&str]) -> Output {
    let output = run_cli(home, args);
    assert!(
        output.status.success(),
        "command failed: {}\nstdout:\n{}\nstderr:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn parse_json<T: DeserializeOwned>(text: &str) -> T {
    let start = text
        .find(|c| c == '{' || c == '[')
        .unwrap_or_else(|| panic!("no JSON payload found in output:\n{}", text));
    let mut deserializer = serde_json::Deserializer::from_str(&text[start..]);
    T::deserialize(&mut deserializer)
        .unwrap_or_else(|err| panic!("failed to parse JSON output: {}\n{}", err, text))
}

fn run_json<T: DeserializeOwned>(home: &Path, args: &[&str]) -> T {
    let output = run_ok(home, args);
    parse_json(&String::from_utf8_lossy(&output.stdout))
}

struct Fixture {
    home: TempDir,
    url: String,
}

impl Fixture {
    fn new() -> Self {
        let home = TempDir::new().expect("create temp home");
        let url = format!("sqlite:{}", home.path().join("game.db").display());
        Self { home, url }
    }

    fn run(&self, args: &[&str]) -> Output {
        let mut full = vec!["--url", self.url.as_str()];
        full.extend_from_slice(args);
        run_ok(self.home.path(), &full)
    }

    fn json<T: DeserializeOwned>(&self, args: &[&str]) -> T {
        let mut full = vec!["--url", self.url.as_str()];
        full.extend_from_slice(args);
        run_json(self.home.path(), &full)
    }

    fn fail(&self, args: &[&str]) -> Output {
        let mut full = vec!["--url", self.url.as_str()];
        full.extend_from_slice(args);
        let output = run_cli(self.home.path(), &full);
        assert!(
            !output.status.success(),
            "command unexpectedly succeeded: {}",
            full.join(" ")
        );
        output
    }
}

#[derive(Debug, Deserialize)]
struct SchemaJson {
    table: String,
    engine: String,
    columns: Vec<ColumnJson>,
}

#[derive(Debug, Deserialize)]
struct ColumnJson {
    name: String,
    declared_type: String,
    primary_key: bool,
    auto_increment: bool,
}

#[derive(Debug, Deserialize)]
struct JsonError {
    error: String,
    suggestions: Vec<String>,
}

#[test]
fn test_create_insert_and_browse() {
    let fx = Fixture::new();
    fx.run(&["create-table", "units", "id:INTEGER:pk:auto", "pos:Vector2", "name:TEXT"]);
    fx.run(&["insert", "units", "pos=1.5,2", "name=archer"]);
    fx.run(&["insert", "units", "name=knight"]);

    let tables: Vec<String> = fx.json(&["tables", "--json"]);
    assert_eq!(tables, vec!["units"]);

    let schema: SchemaJson = fx.json(&["schema", "units", "--json"]);
    assert_eq!(schema.table, "units");
    assert_eq!(schema.engine, "sqlite");
    let names: Vec<_> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "pos", "name"]);
    assert!(schema.columns[0].primary_key && schema.columns[0].auto_increment);
    assert_eq!(schema.columns[1].declared_type, "Vector2");

    let rows: Vec<serde_json::Value> = fx.json(&["rows", "units", "--json"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["pos"], serde_json::json!({ "x": 1.5, "y": 2.0 }));
    assert_eq!(rows[0]["name"], "archer");
    assert!(rows[1]["pos"].is_null());

    let limited: Vec<serde_json::Value> = fx.json(&["rows", "units", "-n", "1", "--json"]);
    assert_eq!(limited.len(), 1);
}

#[test]
fn test_update_delete_and_modify() {
    let fx = Fixture::new();
    fx.run(&["create-table", "units", "id:INTEGER:pk:auto", "pos:Vector2", "name:TEXT"]);
    fx.run(&["insert", "units", "pos=0,0", "name=archer"]);
    fx.run(&["insert", "units", "pos=3,4", "name=knight"]);

    fx.run(&["update", "units", "id=2", "name=paladin"]);
    fx.run(&["modify-column", "units", "pos", "--rename", "position"]);
    fx.run(&["delete-row", "units", "id=1"]);

    let rows: Vec<serde_json::Value> = fx.json(&["rows", "units", "--json"]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "paladin");
    assert_eq!(rows[0]["position"], serde_json::json!({ "x": 3.0, "y": 4.0 }));
}

#[test]
fn test_modify_column_can_drop_primary_key() {
    let fx = Fixture::new();
    fx.run(&["create-table", "tags", "label:TEXT:pk", "color:TEXT"]);
    fx.run(&["insert", "tags", "label=north", "color=red"]);

    fx.run(&["modify-column", "tags", "label", "--no-pk"]);
    let schema: SchemaJson = fx.json(&["schema", "tags", "--json"]);
    assert!(schema.columns.iter().all(|c| !c.primary_key));

    fx.run(&["make-pk", "tags", "color"]);
    let schema: SchemaJson = fx.json(&["schema", "tags", "--json"]);
    let keys: Vec<_> = schema
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(keys, vec!["color"]);

    let rows: Vec<serde_json::Value> = fx.json(&["rows", "tags", "--json"]);
    assert_eq!(rows, vec![serde_json::json!({ "label": "north", "color": "red" })]);
}

#[test]
fn test_query_and_read_only() {
    let fx = Fixture::new();
    fx.run(&["create-table", "log", "n:INTEGER", "note:TEXT"]);
    fx.run(&["insert", "log", "n=1", "note=a"]);
    fx.run(&["insert", "log", "n=2", "note=b"]);

    let rows: Vec<serde_json::Value> =
        fx.json(&["query", "SELECT n FROM log WHERE n > 1", "--json"]);
    assert_eq!(rows, vec![serde_json::json!({ "n": 2 })]);

    // --last reruns the query saved in the session
    let again: Vec<serde_json::Value> = fx.json(&["query", "--last", "--json"]);
    assert_eq!(again, rows);

    let output = fx.fail(&["query", "DELETE FROM log", "--read-only", "--json"]);
    let err: JsonError = parse_json(&String::from_utf8_lossy(&output.stderr));
    assert!(err.error.contains("Read-only"));

    let affected: serde_json::Value = fx.json(&["query", "DELETE FROM log", "--json"]);
    assert_eq!(affected["affected"], 2);
}

#[test]
fn test_errors_carry_suggestions() {
    let fx = Fixture::new();
    let output = fx.fail(&["schema", "ghosts", "--json"]);
    let err: JsonError = parse_json(&String::from_utf8_lossy(&output.stderr));
    assert!(err.error.contains("ghosts"));
    assert!(err.suggestions.iter().any(|s| s.contains("sqlpane tables")));

    fx.run(&["create-table", "log", "n:INTEGER"]);
    let output = fx.fail(&["update", "log", "n=1", "n=2"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("has no primary key"), "stderr:\n{}", stderr);
    assert!(stderr.contains("sqlpane make-pk log"));
}

#[test]
fn test_named_connections_and_use() {
    let home = TempDir::new().expect("create temp home");
    let db_path = home.path().join("levels.db");
    let config = format!(
        "[[connections]]\nname = \"levels\"\nurl = \"sqlite:{}\"\n",
        db_path.display()
    );
    std::fs::write(home.path().join("config.toml"), config).expect("write config");

    let output = run_cli(home.path(), &["tables"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No database connection selected"));

    run_ok(home.path(), &["use", "levels"]);
    run_ok(home.path(), &["create-table", "maps", "id:INTEGER:pk", "title:TEXT"]);
    let tables: Vec<String> = run_json(home.path(), &["tables", "--json"]);
    assert_eq!(tables, vec!["maps"]);
    assert!(db_path.exists());

    let output = run_cli(home.path(), &["use", "nowhere"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("levels"));
}

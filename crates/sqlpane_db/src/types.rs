//! Schema model and typed values shared by providers, the codec and callers.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Engines
// ============================================================================

/// Supported SQL engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Sqlite,
    #[serde(alias = "mariadb")]
    MySql,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite",
            Self::MySql => "MySQL",
        }
    }

    /// Identifier comparison as the engine does it: MySQL column names are
    /// case-insensitive, SQLite's are compared exactly.
    pub fn names_match(&self, a: &str, b: &str) -> bool {
        match self {
            Self::Sqlite => a == b,
            Self::MySql => a.eq_ignore_ascii_case(b),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Declared types
// ============================================================================

/// Logical type of a column, distinct from its physical storage type.
///
/// Canonical SQL spellings map to the scalar variants; the engine-native
/// variants (`Vector2`, `Vector3`, object references) are stored as text and
/// tracked in the `__column_types` side table. Anything else is kept verbatim
/// in `Other` so it survives a table rebuild unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    Integer,
    Real,
    Text,
    Blob,
    Varchar(u32),
    Vector2,
    Vector3,
    GameObjectRef,
    SpriteRef,
    Date,
    DateTime,
    Other(String),
}

/// Storage affinity, following SQLite's column affinity rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
    Blob,
    Numeric,
}

impl DeclaredType {
    /// Parse a SQL type string or logical type name (case-insensitive).
    pub fn from_sql(sql_type: &str) -> Self {
        let trimmed = sql_type.trim();
        let upper = trimmed.to_ascii_uppercase();

        if let Some(len) = parse_varchar(&upper) {
            return Self::Varchar(len);
        }

        match upper.as_str() {
            "INTEGER" => Self::Integer,
            "REAL" => Self::Real,
            "TEXT" => Self::Text,
            "BLOB" => Self::Blob,
            "VECTOR2" => Self::Vector2,
            "VECTOR3" => Self::Vector3,
            "GAMEOBJECT" | "GAMEOBJECTREF" => Self::GameObjectRef,
            "SPRITE" | "SPRITEREF" => Self::SpriteRef,
            "DATE" => Self::Date,
            "DATETIME" => Self::DateTime,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Name recorded in `__column_types` for types SQL cannot express.
    pub fn logical_name(&self) -> Option<&'static str> {
        match self {
            Self::Vector2 => Some("Vector2"),
            Self::Vector3 => Some("Vector3"),
            Self::GameObjectRef => Some("GameObject"),
            Self::SpriteRef => Some("Sprite"),
            _ => None,
        }
    }

    /// Inverse of [`logical_name`](Self::logical_name).
    pub fn from_logical_name(name: &str) -> Option<Self> {
        match Self::from_sql(name) {
            ty if ty.needs_annotation() => Some(ty),
            _ => None,
        }
    }

    /// True for types stored as text and tracked in the side table.
    pub fn needs_annotation(&self) -> bool {
        self.logical_name().is_some()
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector2 | Self::Vector3)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::GameObjectRef | Self::SpriteRef)
    }

    pub fn affinity(&self) -> Affinity {
        match self {
            Self::Integer => Affinity::Integer,
            Self::Real => Affinity::Real,
            Self::Blob => Affinity::Blob,
            Self::Text
            | Self::Varchar(_)
            | Self::Vector2
            | Self::Vector3
            | Self::GameObjectRef
            | Self::SpriteRef
            | Self::Date
            | Self::DateTime => Affinity::Text,
            Self::Other(sql) => affinity_of(sql),
        }
    }

    /// Physical column type for `CREATE TABLE` / `ADD COLUMN`.
    ///
    /// `keyed` columns on MySQL cannot be unbounded TEXT, so text-backed
    /// types become `VARCHAR(255)` there.
    pub fn storage_type(&self, engine: Engine, keyed: bool) -> String {
        let text = || match (engine, keyed) {
            (Engine::MySql, true) => "VARCHAR(255)".to_string(),
            _ => "TEXT".to_string(),
        };
        match self {
            Self::Integer => "INTEGER".to_string(),
            Self::Real => match engine {
                Engine::Sqlite => "REAL".to_string(),
                Engine::MySql => "DOUBLE".to_string(),
            },
            Self::Text | Self::Vector2 | Self::Vector3 | Self::GameObjectRef | Self::SpriteRef => {
                text()
            }
            Self::Blob => "BLOB".to_string(),
            Self::Varchar(len) => format!("VARCHAR({})", len),
            Self::Date => "DATE".to_string(),
            Self::DateTime => "DATETIME".to_string(),
            Self::Other(sql) => sql.clone(),
        }
    }
}

impl std::fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Real => write!(f, "REAL"),
            Self::Text => write!(f, "TEXT"),
            Self::Blob => write!(f, "BLOB"),
            Self::Varchar(len) => write!(f, "VARCHAR({})", len),
            Self::Date => write!(f, "DATE"),
            Self::DateTime => write!(f, "DATETIME"),
            Self::Other(sql) => write!(f, "{}", sql),
            logical => write!(f, "{}", logical.logical_name().unwrap_or("TEXT")),
        }
    }
}

impl std::str::FromStr for DeclaredType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_sql(s))
    }
}

fn parse_varchar(upper: &str) -> Option<u32> {
    let inner = upper.strip_prefix("VARCHAR(")?.strip_suffix(')')?;
    inner.trim().parse().ok()
}

fn affinity_of(sql_type: &str) -> Affinity {
    let upper = sql_type.to_ascii_uppercase();
    if (upper.contains("INT") && !upper.contains("POINT")) || upper.starts_with("BOOL") {
        Affinity::Integer
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        Affinity::Text
    } else if upper.is_empty() || upper.contains("BLOB") || upper.contains("BINARY") {
        Affinity::Blob
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

// ============================================================================
// Columns and schemas
// ============================================================================

/// One column of an existing table, as introspected.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// SQL type as the engine reports it (original casing)
    pub sql_type: String,
    /// Logical type, from `__column_types` when recorded
    pub declared_type: DeclaredType,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    pub is_not_null: bool,
    pub is_unique: bool,
    /// SQL literal or expression, ready to splice after `DEFAULT`
    pub default_value: Option<String>,
}

/// Column requested by `create_table`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub declared_type: DeclaredType,
    pub is_auto_increment: bool,
    pub is_not_null: bool,
    pub is_unique: bool,
    pub default_value: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, declared_type: DeclaredType) -> Self {
        Self {
            name: name.into(),
            declared_type,
            is_auto_increment: false,
            is_not_null: false,
            is_unique: false,
            default_value: None,
        }
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default_value = Some(literal.into());
        self
    }

    /// Resolve to a concrete column for `engine`.
    pub fn to_column(&self, engine: Engine, is_primary_key: bool) -> Column {
        let keyed = is_primary_key || self.is_unique;
        Column {
            name: self.name.clone(),
            sql_type: self.declared_type.storage_type(engine, keyed),
            declared_type: self.declared_type.clone(),
            is_primary_key,
            is_auto_increment: self.is_auto_increment,
            is_not_null: self.is_not_null,
            is_unique: self.is_unique,
            default_value: self.default_value.clone(),
        }
    }
}

/// Columns of one table in physical order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<Column>,
    pub engine: Engine,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| self.engine.names_match(&c.name, name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| self.engine.names_match(&c.name, name))
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Kind of host asset an object reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    GameObject,
    Sprite,
}

impl ObjectKind {
    /// Kind referenced by a declared type, if it is a reference type.
    pub fn for_type(declared: &DeclaredType) -> Option<Self> {
        match declared {
            DeclaredType::GameObjectRef => Some(Self::GameObject),
            DeclaredType::SpriteRef => Some(Self::Sprite),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GameObject => write!(f, "GameObject"),
            Self::Sprite => write!(f, "Sprite"),
        }
    }
}

/// Opaque handle to a loaded host asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub handle: ObjectHandle,
}

/// A typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Vector2(Vec2),
    Vector3(Vec3),
    ObjectRef(ObjectRef),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Vector2(_) => "vector2",
            Value::Vector3(_) => "vector3",
            Value::ObjectRef(_) => "object",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
        }
    }

    /// JSON rendering for machine-readable output.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(v) => json!(v),
            Value::Real(v) => json!(v),
            Value::Text(v) => json!(v),
            Value::Blob(v) => json!(v),
            Value::Vector2(v) => json!({ "x": v.x, "y": v.y }),
            Value::Vector3(v) => json!({ "x": v.x, "y": v.y, "z": v.z }),
            Value::ObjectRef(r) => json!({ "kind": r.kind, "handle": r.handle.0 }),
            Value::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => json!(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Vector2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Vector3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::ObjectRef(r) => write!(f, "{}#{}", r.kind, r.handle.0),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Value::Vector2(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vector3(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::ObjectRef(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

/// Ordered column → value pairs.
///
/// Rows loaded from a table carry every column; rows handed to
/// `insert_row` / `delete_row` may carry a subset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a cell, replacing an existing cell of the same name.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(index) => self.values[index] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    /// Exact-name lookup.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|index| &self.values[index])
    }

    /// Lookup using the engine's identifier rules.
    pub fn get_in(&self, engine: Engine, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| engine.names_match(c, column))
            .map(|index| &self.values[index])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_logical_types() {
        assert_eq!(DeclaredType::from_sql("integer"), DeclaredType::Integer);
        assert_eq!(DeclaredType::from_sql("VARCHAR(64)"), DeclaredType::Varchar(64));
        assert_eq!(DeclaredType::from_sql("Vector2"), DeclaredType::Vector2);
        assert_eq!(DeclaredType::from_sql("vector3"), DeclaredType::Vector3);
        assert_eq!(DeclaredType::from_sql("GameObject"), DeclaredType::GameObjectRef);
        assert_eq!(DeclaredType::from_sql("Sprite"), DeclaredType::SpriteRef);
        assert_eq!(DeclaredType::from_sql("datetime"), DeclaredType::DateTime);
        assert_eq!(
            DeclaredType::from_sql("decimal(10,2)"),
            DeclaredType::Other("decimal(10,2)".to_string())
        );
    }

    #[test]
    fn display_round_trips_through_from_sql() {
        for ty in [
            DeclaredType::Integer,
            DeclaredType::Real,
            DeclaredType::Text,
            DeclaredType::Blob,
            DeclaredType::Varchar(12),
            DeclaredType::Vector2,
            DeclaredType::Vector3,
            DeclaredType::GameObjectRef,
            DeclaredType::SpriteRef,
            DeclaredType::Date,
            DeclaredType::DateTime,
        ] {
            assert_eq!(DeclaredType::from_sql(&ty.to_string()), ty);
        }
    }

    #[test]
    fn affinity_follows_sqlite_rules() {
        assert_eq!(DeclaredType::from_sql("BIGINT").affinity(), Affinity::Integer);
        assert_eq!(DeclaredType::from_sql("tinyint(1)").affinity(), Affinity::Integer);
        assert_eq!(DeclaredType::from_sql("NCHAR(4)").affinity(), Affinity::Text);
        assert_eq!(DeclaredType::from_sql("DOUBLE").affinity(), Affinity::Real);
        assert_eq!(DeclaredType::from_sql("").affinity(), Affinity::Blob);
        assert_eq!(DeclaredType::from_sql("DECIMAL(10,2)").affinity(), Affinity::Numeric);
        assert_eq!(DeclaredType::from_sql("POINT").affinity(), Affinity::Numeric);
        assert_eq!(DeclaredType::Vector2.affinity(), Affinity::Text);
    }

    #[test]
    fn storage_types_per_engine() {
        assert_eq!(DeclaredType::Vector2.storage_type(Engine::Sqlite, true), "TEXT");
        assert_eq!(
            DeclaredType::Vector2.storage_type(Engine::MySql, true),
            "VARCHAR(255)"
        );
        assert_eq!(DeclaredType::Text.storage_type(Engine::MySql, false), "TEXT");
        assert_eq!(DeclaredType::Real.storage_type(Engine::MySql, false), "DOUBLE");
        assert_eq!(DeclaredType::Date.storage_type(Engine::Sqlite, false), "DATE");
        assert!(DeclaredType::SpriteRef.needs_annotation());
        assert!(!DeclaredType::Date.needs_annotation());
    }

    #[test]
    fn names_match_per_engine() {
        assert!(Engine::MySql.names_match("Score", "score"));
        assert!(!Engine::Sqlite.names_match("Score", "score"));
        assert!(Engine::Sqlite.names_match("score", "score"));
    }

    #[test]
    fn row_set_replaces_existing_cells() {
        let mut row = Row::new().with("id", 1_i64).with("name", "a");
        row.set("name", "b");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::Text("b".to_string())));
        assert_eq!(row.get_in(Engine::MySql, "NAME"), Some(&Value::Text("b".to_string())));
        assert_eq!(row.get_in(Engine::Sqlite, "NAME"), None);
    }
}

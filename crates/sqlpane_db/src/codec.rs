//! Value codec: typed [`Value`]s to driver primitives and back.
//!
//! Encoding is strict: a value that cannot be stored faithfully is an error.
//! Decoding is lossy by policy: a malformed cell decodes to a default value
//! plus a [`DecodeWarning`], so one bad cell never blocks a table load.
//!
//! Vectors have one canonical encoding on every engine, a JSON object
//! (`{"x":1.5,"y":2.5}`). The legacy comma form (`"1.5,2.5"`) is still
//! accepted on decode.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::warn;

use crate::assets::AssetResolver;
use crate::backend::{DbRow, DbValue};
use crate::error::{DbError, Result};
use crate::types::{
    Affinity, DeclaredType, ObjectKind, ObjectRef, Row, TableSchema, Value, Vec2, Vec3,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Why a cell decoded to a fallback value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFallback {
    /// Vector text was neither JSON nor `x,y[,z]`; decoded as the zero vector.
    MalformedVector,
    /// Reference path unknown to the resolver; decoded as null.
    UnresolvedAsset,
    /// Date/time text did not parse; the raw value is kept.
    MalformedDate,
}

impl std::fmt::Display for DecodeFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedVector => write!(f, "malformed vector, using zero vector"),
            Self::UnresolvedAsset => write!(f, "asset path not resolvable, using null"),
            Self::MalformedDate => write!(f, "malformed date, keeping raw value"),
        }
    }
}

/// A cell that decoded to a fallback value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeWarning {
    /// Row index within the loaded table
    pub row: usize,
    pub column: String,
    /// Stored value as text
    pub raw: String,
    pub reason: DecodeFallback,
}

impl std::fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}, column '{}': {} (stored: {:?})",
            self.row, self.column, self.reason, self.raw
        )
    }
}

/// Result of decoding one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub fallback: Option<DecodeFallback>,
}

impl Decoded {
    fn ok(value: Value) -> Self {
        Self {
            value,
            fallback: None,
        }
    }

    fn fallback(value: Value, reason: DecodeFallback) -> Self {
        Self {
            value,
            fallback: Some(reason),
        }
    }
}

/// Converts between typed values and driver primitives.
#[derive(Clone)]
pub struct ValueCodec {
    resolver: Arc<dyn AssetResolver>,
}

impl std::fmt::Debug for ValueCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCodec").finish_non_exhaustive()
    }
}

impl ValueCodec {
    pub fn new(resolver: Arc<dyn AssetResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<dyn AssetResolver> {
        &self.resolver
    }

    /// Encode a value for storage in a column of type `declared`.
    pub fn encode(&self, value: &Value, declared: &DeclaredType) -> Result<DbValue> {
        let encoded = match value {
            Value::Null => DbValue::Null,
            Value::Integer(v) => DbValue::Integer(*v),
            Value::Real(v) => DbValue::Real(*v),
            Value::Blob(v) => DbValue::Blob(v.clone()),
            Value::Text(text) => coerce_text(text, declared)?,
            Value::Vector2(v) => DbValue::Text(encode_vector(v, &[v.x, v.y])?),
            Value::Vector3(v) => DbValue::Text(encode_vector(v, &[v.x, v.y, v.z])?),
            Value::ObjectRef(reference) => DbValue::Text(self.reference_path(reference)?),
            Value::Date(d) => DbValue::Text(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => DbValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        };
        Ok(encoded)
    }

    /// Decode a stored value from a column of type `declared`. Never fails.
    pub fn decode(&self, raw: &DbValue, declared: &DeclaredType) -> Decoded {
        if raw.is_null() {
            return Decoded::ok(Value::Null);
        }

        match declared {
            DeclaredType::Vector2 => match raw.as_text() {
                Some(text) if text.trim().is_empty() => Decoded::ok(Value::Vector2(Vec2::ZERO)),
                Some(text) => match parse_vector(&text, 2) {
                    Some(c) => Decoded::ok(Value::Vector2(Vec2::new(c[0], c[1]))),
                    None => Decoded::fallback(
                        Value::Vector2(Vec2::ZERO),
                        DecodeFallback::MalformedVector,
                    ),
                },
                None => {
                    Decoded::fallback(Value::Vector2(Vec2::ZERO), DecodeFallback::MalformedVector)
                }
            },
            DeclaredType::Vector3 => match raw.as_text() {
                Some(text) if text.trim().is_empty() => Decoded::ok(Value::Vector3(Vec3::ZERO)),
                Some(text) => match parse_vector(&text, 3) {
                    Some(c) => Decoded::ok(Value::Vector3(Vec3::new(c[0], c[1], c[2]))),
                    None => Decoded::fallback(
                        Value::Vector3(Vec3::ZERO),
                        DecodeFallback::MalformedVector,
                    ),
                },
                None => {
                    Decoded::fallback(Value::Vector3(Vec3::ZERO), DecodeFallback::MalformedVector)
                }
            },
            DeclaredType::GameObjectRef | DeclaredType::SpriteRef => {
                let kind = match declared {
                    DeclaredType::SpriteRef => ObjectKind::Sprite,
                    _ => ObjectKind::GameObject,
                };
                match raw.as_text() {
                    Some(path) if path.is_empty() => Decoded::ok(Value::Null),
                    Some(path) => match self.resolver.resolve(kind, &path) {
                        Some(handle) => Decoded::ok(Value::ObjectRef(ObjectRef { kind, handle })),
                        None => Decoded::fallback(Value::Null, DecodeFallback::UnresolvedAsset),
                    },
                    None => Decoded::fallback(Value::Null, DecodeFallback::UnresolvedAsset),
                }
            }
            DeclaredType::Date => match raw {
                DbValue::Text(text) => match parse_date(text) {
                    Some(d) => Decoded::ok(Value::Date(d)),
                    None => Decoded::fallback(Value::Text(text.clone()), DecodeFallback::MalformedDate),
                },
                other => Decoded::fallback(decode_untyped(other), DecodeFallback::MalformedDate),
            },
            DeclaredType::DateTime => match raw {
                DbValue::Text(text) => match parse_datetime(text) {
                    Some(dt) => Decoded::ok(Value::DateTime(dt)),
                    None => Decoded::fallback(Value::Text(text.clone()), DecodeFallback::MalformedDate),
                },
                other => Decoded::fallback(decode_untyped(other), DecodeFallback::MalformedDate),
            },
            scalar => Decoded::ok(decode_scalar(raw, scalar.affinity())),
        }
    }

    /// Decode one fetched row against its table schema.
    ///
    /// Fallbacks are logged and appended to `warnings`.
    pub fn decode_row(
        &self,
        schema: &TableSchema,
        raw: &DbRow,
        row_index: usize,
        warnings: &mut Vec<DecodeWarning>,
    ) -> Row {
        let mut row = Row::new();
        for (column, stored) in raw.column_names().iter().zip(raw.values()) {
            let value = match schema.column(column) {
                Some(col) => {
                    let decoded = self.decode(stored, &col.declared_type);
                    if let Some(reason) = decoded.fallback {
                        warn!(
                            table = %schema.table,
                            row = row_index,
                            column = %column,
                            raw = %stored,
                            %reason,
                            "Value decode fell back"
                        );
                        warnings.push(DecodeWarning {
                            row: row_index,
                            column: column.clone(),
                            raw: stored.to_string(),
                            reason,
                        });
                    }
                    decoded.value
                }
                None => decode_untyped(stored),
            };
            row.set(column.clone(), value);
        }
        row
    }

    /// Parse user-entered text into a value for a column of type `declared`.
    ///
    /// The literal `NULL` (any case) is SQL NULL.
    pub fn parse_input(&self, text: &str, declared: &DeclaredType) -> Result<Value> {
        if text.eq_ignore_ascii_case("null") {
            return Ok(Value::Null);
        }
        let bad = |what: &str| DbError::invalid_input(format!("'{}' is not a valid {}", text, what));

        match declared {
            DeclaredType::Vector2 => parse_vector(text, 2)
                .map(|c| Value::Vector2(Vec2::new(c[0], c[1])))
                .ok_or_else(|| bad("Vector2 (expected x,y)")),
            DeclaredType::Vector3 => parse_vector(text, 3)
                .map(|c| Value::Vector3(Vec3::new(c[0], c[1], c[2])))
                .ok_or_else(|| bad("Vector3 (expected x,y,z)")),
            DeclaredType::GameObjectRef | DeclaredType::SpriteRef => {
                let path = text.trim();
                if path.is_empty() {
                    return Ok(Value::Null);
                }
                let kind = ObjectKind::for_type(declared).unwrap_or(ObjectKind::GameObject);
                self.resolver
                    .resolve(kind, path)
                    .map(|handle| Value::ObjectRef(ObjectRef { kind, handle }))
                    .ok_or_else(|| DbError::UnresolvableReference(path.to_string()))
            }
            DeclaredType::Date => parse_date(text.trim())
                .map(Value::Date)
                .ok_or_else(|| bad("date (expected YYYY-MM-DD)")),
            DeclaredType::DateTime => parse_datetime(text.trim())
                .map(Value::DateTime)
                .ok_or_else(|| bad("datetime (expected YYYY-MM-DD HH:MM:SS)")),
            scalar => match scalar.affinity() {
                Affinity::Integer => text
                    .trim()
                    .parse()
                    .map(Value::Integer)
                    .map_err(|_| bad("integer")),
                Affinity::Real => text
                    .trim()
                    .parse()
                    .map(Value::Real)
                    .map_err(|_| bad("number")),
                Affinity::Numeric => Ok(parse_number(text).unwrap_or_else(|| Value::Text(text.to_string()))),
                Affinity::Blob => Ok(Value::Blob(
                    parse_hex(text).unwrap_or_else(|| text.as_bytes().to_vec()),
                )),
                Affinity::Text => Ok(Value::Text(text.to_string())),
            },
        }
    }

    fn reference_path(&self, reference: &ObjectRef) -> Result<String> {
        self.resolver
            .logical_path(reference.kind, reference.handle)
            .ok_or_else(|| {
                DbError::UnresolvableReference(format!("{}#{}", reference.kind, reference.handle.0))
            })
    }
}

/// Decode a value with no declared type (ad-hoc query results).
pub fn decode_untyped(raw: &DbValue) -> Value {
    match raw {
        DbValue::Null => Value::Null,
        DbValue::Integer(v) => Value::Integer(*v),
        DbValue::Real(v) => Value::Real(*v),
        DbValue::Text(v) => Value::Text(v.clone()),
        DbValue::Blob(v) => Value::Blob(v.clone()),
    }
}

/// Guess whether a TEXT sample holds a serialized vector.
///
/// Only for adopting databases written before column types were recorded;
/// a text value that happens to contain commas will be misclassified.
pub fn sniff_text_type(sample: &str) -> Option<DeclaredType> {
    if parse_vector(sample, 3).is_some() {
        Some(DeclaredType::Vector3)
    } else if parse_vector(sample, 2).is_some() {
        Some(DeclaredType::Vector2)
    } else {
        None
    }
}

fn decode_scalar(raw: &DbValue, affinity: Affinity) -> Value {
    match (raw, affinity) {
        (DbValue::Integer(v), Affinity::Real) => Value::Real(*v as f64),
        (DbValue::Text(text), Affinity::Real) => text
            .trim()
            .parse()
            .map(Value::Real)
            .unwrap_or_else(|_| Value::Text(text.clone())),
        (DbValue::Text(text), Affinity::Numeric) => {
            parse_number(text).unwrap_or_else(|| Value::Text(text.clone()))
        }
        (DbValue::Blob(bytes), Affinity::Text) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => Value::Blob(bytes.clone()),
        },
        (other, _) => decode_untyped(other),
    }
}

fn coerce_text(text: &str, declared: &DeclaredType) -> Result<DbValue> {
    if declared.is_vector() {
        let dims = if *declared == DeclaredType::Vector2 { 2 } else { 3 };
        let c = parse_vector(text, dims).ok_or_else(|| {
            DbError::invalid_input(format!("'{}' is not a valid {}", text, declared))
        })?;
        let canonical = if dims == 2 {
            encode_vector(&Vec2::new(c[0], c[1]), &c)?
        } else {
            encode_vector(&Vec3::new(c[0], c[1], c[2]), &c)?
        };
        return Ok(DbValue::Text(canonical));
    }

    let trimmed = text.trim();
    let coerced = match declared.affinity() {
        Affinity::Integer => trimmed.parse().ok().map(DbValue::Integer),
        Affinity::Real => trimmed.parse().ok().map(DbValue::Real),
        Affinity::Numeric => match parse_number(trimmed) {
            Some(Value::Integer(v)) => Some(DbValue::Integer(v)),
            Some(Value::Real(v)) => Some(DbValue::Real(v)),
            _ => None,
        },
        Affinity::Text | Affinity::Blob => None,
    };
    Ok(coerced.unwrap_or_else(|| DbValue::Text(text.to_string())))
}

fn encode_vector<T: Serialize>(vector: &T, components: &[f32]) -> Result<String> {
    if components.iter().any(|c| !c.is_finite()) {
        return Err(DbError::invalid_input("vector components must be finite"));
    }
    serde_json::to_string(vector).map_err(|e| DbError::invalid_input(e.to_string()))
}

/// Parse a vector from canonical JSON, `x,y[,z]`, or `(x, y[, z])`.
fn parse_vector(text: &str, dims: usize) -> Option<Vec<f32>> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        let json: serde_json::Value = serde_json::from_str(trimmed).ok()?;
        let object = json.as_object()?;
        if object.len() != dims {
            return None;
        }
        return ["x", "y", "z"][..dims]
            .iter()
            .map(|axis| object.get(*axis)?.as_f64().map(|v| v as f32))
            .collect();
    }

    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    let parts: Vec<&str> = inner.split(',').collect();
    if parts.len() != dims {
        return None;
    }
    parts
        .iter()
        .map(|p| p.trim().parse::<f32>().ok().filter(|v| v.is_finite()))
        .collect()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .map(Value::Integer)
        .or_else(|_| trimmed.parse::<f64>().map(Value::Real))
        .ok()
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits = text.trim().strip_prefix("0x")?;
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetRegistry;
    use crate::types::{Column, Engine, ObjectHandle};

    fn codec_with(registry: AssetRegistry) -> (ValueCodec, Arc<AssetRegistry>) {
        let registry = Arc::new(registry);
        (ValueCodec::new(registry.clone()), registry)
    }

    fn codec() -> ValueCodec {
        codec_with(AssetRegistry::new()).0
    }

    fn round_trip(codec: &ValueCodec, value: Value, declared: DeclaredType) -> Value {
        let stored = codec.encode(&value, &declared).unwrap();
        let decoded = codec.decode(&stored, &declared);
        assert_eq!(decoded.fallback, None, "unexpected fallback for {:?}", value);
        decoded.value
    }

    #[test]
    fn round_trips_every_declared_type() {
        let (codec, registry) = codec_with(AssetRegistry::new());
        let hero = registry.register(ObjectKind::Sprite, "Sprites/hero.png");
        let enemy = registry.register(ObjectKind::GameObject, "Prefabs/Enemy.prefab");
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let stamp = date.and_hms_milli_opt(13, 45, 10, 250).unwrap();

        let cases = vec![
            (Value::Integer(-42), DeclaredType::Integer),
            (Value::Real(0.125), DeclaredType::Real),
            (Value::Text("a, b, c".into()), DeclaredType::Text),
            (Value::Text("short".into()), DeclaredType::Varchar(16)),
            (Value::Blob(vec![0, 159, 146, 150]), DeclaredType::Blob),
            (Value::Vector2(Vec2::new(1.5, 2.5)), DeclaredType::Vector2),
            (Value::Vector3(Vec3::new(-1.0, 0.1, 3.25)), DeclaredType::Vector3),
            (
                Value::ObjectRef(ObjectRef { kind: ObjectKind::Sprite, handle: hero }),
                DeclaredType::SpriteRef,
            ),
            (
                Value::ObjectRef(ObjectRef { kind: ObjectKind::GameObject, handle: enemy }),
                DeclaredType::GameObjectRef,
            ),
            (Value::Date(date), DeclaredType::Date),
            (Value::DateTime(stamp), DeclaredType::DateTime),
            (Value::Null, DeclaredType::Vector2),
            (Value::Null, DeclaredType::Integer),
        ];

        for (value, declared) in cases {
            assert_eq!(round_trip(&codec, value.clone(), declared), value);
        }
    }

    #[test]
    fn vectors_use_canonical_json() {
        let stored = codec()
            .encode(&Value::Vector2(Vec2::new(1.5, 2.5)), &DeclaredType::Vector2)
            .unwrap();
        assert_eq!(stored, DbValue::Text(r#"{"x":1.5,"y":2.5}"#.to_string()));

        let stored = codec()
            .encode(&Value::Vector3(Vec3::new(1.0, 2.0, 3.0)), &DeclaredType::Vector3)
            .unwrap();
        assert_eq!(stored, DbValue::Text(r#"{"x":1.0,"y":2.0,"z":3.0}"#.to_string()));
    }

    #[test]
    fn float_components_round_trip_within_epsilon() {
        let codec = codec();
        let original = Vec3::new(0.1, 1.0 / 3.0, 1e-7);
        let value = round_trip(&codec, Value::Vector3(original), DeclaredType::Vector3);
        let Value::Vector3(decoded) = value else {
            panic!("expected a vector, got {:?}", value);
        };
        assert!((decoded.x - original.x).abs() < f32::EPSILON);
        assert!((decoded.y - original.y).abs() < f32::EPSILON);
        assert!((decoded.z - original.z).abs() < f32::EPSILON);
    }

    #[test]
    fn legacy_comma_vectors_decode() {
        let codec = codec();
        let decoded = codec.decode(&DbValue::Text("1.5, 2.5".into()), &DeclaredType::Vector2);
        assert_eq!(decoded, Decoded::ok(Value::Vector2(Vec2::new(1.5, 2.5))));

        let decoded = codec.decode(&DbValue::Text("(1, 2, 3)".into()), &DeclaredType::Vector3);
        assert_eq!(decoded.value, Value::Vector3(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn malformed_vectors_fall_back_to_zero() {
        let codec = codec();
        for raw in ["not a vector", "1,2,3", r#"{"x":1}"#, "1,abc"] {
            let decoded = codec.decode(&DbValue::Text(raw.into()), &DeclaredType::Vector2);
            assert_eq!(decoded.value, Value::Vector2(Vec2::ZERO));
            assert_eq!(decoded.fallback, Some(DecodeFallback::MalformedVector));
        }
        let decoded = codec.decode(&DbValue::Integer(7), &DeclaredType::Vector3);
        assert_eq!(decoded.value, Value::Vector3(Vec3::ZERO));
    }

    #[test]
    fn non_finite_vectors_are_rejected() {
        let result = codec().encode(&Value::Vector2(Vec2::new(f32::NAN, 0.0)), &DeclaredType::Vector2);
        assert!(matches!(result, Err(DbError::InvalidInput(_))));
    }

    #[test]
    fn unknown_references_decode_to_null_with_warning() {
        let codec = codec();
        let decoded = codec.decode(&DbValue::Text("Prefabs/Gone.prefab".into()), &DeclaredType::GameObjectRef);
        assert_eq!(decoded.value, Value::Null);
        assert_eq!(decoded.fallback, Some(DecodeFallback::UnresolvedAsset));

        let decoded = codec.decode(&DbValue::Text(String::new()), &DeclaredType::SpriteRef);
        assert_eq!(decoded, Decoded::ok(Value::Null));
    }

    #[test]
    fn unregistered_handle_is_unresolvable() {
        let reference = Value::ObjectRef(ObjectRef {
            kind: ObjectKind::Sprite,
            handle: ObjectHandle(99),
        });
        let result = codec().encode(&reference, &DeclaredType::SpriteRef);
        assert!(matches!(result, Err(DbError::UnresolvableReference(_))));
    }

    #[test]
    fn malformed_dates_keep_raw_text() {
        let decoded = codec().decode(&DbValue::Text("yesterday".into()), &DeclaredType::Date);
        assert_eq!(decoded.value, Value::Text("yesterday".into()));
        assert_eq!(decoded.fallback, Some(DecodeFallback::MalformedDate));
    }

    #[test]
    fn scalars_decode_to_natural_variant() {
        let codec = codec();
        assert_eq!(
            codec.decode(&DbValue::Integer(3), &DeclaredType::Text).value,
            Value::Integer(3)
        );
        assert_eq!(
            codec.decode(&DbValue::Integer(3), &DeclaredType::Real).value,
            Value::Real(3.0)
        );
        assert_eq!(
            codec.decode(&DbValue::Text("12.50".into()), &DeclaredType::from_sql("decimal(10,2)")).value,
            Value::Real(12.5)
        );
        assert_eq!(
            codec.decode(&DbValue::Blob(b"abc".to_vec()), &DeclaredType::Text).value,
            Value::Text("abc".into())
        );
    }

    #[test]
    fn text_is_coerced_for_typed_columns() {
        let codec = codec();
        assert_eq!(
            codec.encode(&Value::Text("12".into()), &DeclaredType::Integer).unwrap(),
            DbValue::Integer(12)
        );
        assert_eq!(
            codec.encode(&Value::Text("x".into()), &DeclaredType::Integer).unwrap(),
            DbValue::Text("x".into())
        );
        assert_eq!(
            codec.encode(&Value::Text("1,2".into()), &DeclaredType::Vector2).unwrap(),
            DbValue::Text(r#"{"x":1.0,"y":2.0}"#.into())
        );
    }

    #[test]
    fn malformed_vector_text_is_rejected() {
        let codec = codec();
        let err = codec
            .encode(&Value::Text("north".into()), &DeclaredType::Vector2)
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput(_)), "{:?}", err);
        assert!(codec
            .encode(&Value::Text("1,2".into()), &DeclaredType::Vector3)
            .is_err());
    }

    #[test]
    fn parse_input_per_type() {
        let (codec, _registry) = codec_with(AssetRegistry::with_auto_register(true));
        assert_eq!(codec.parse_input("NULL", &DeclaredType::Integer).unwrap(), Value::Null);
        assert_eq!(codec.parse_input(" 7 ", &DeclaredType::Integer).unwrap(), Value::Integer(7));
        assert!(codec.parse_input("seven", &DeclaredType::Integer).is_err());
        assert_eq!(
            codec.parse_input("1.5,2.5", &DeclaredType::Vector2).unwrap(),
            Value::Vector2(Vec2::new(1.5, 2.5))
        );
        assert_eq!(
            codec.parse_input("2024-01-31", &DeclaredType::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
        );
        assert_eq!(
            codec.parse_input("0x0aff", &DeclaredType::Blob).unwrap(),
            Value::Blob(vec![0x0a, 0xff])
        );
        assert!(matches!(
            codec.parse_input("Sprites/a.png", &DeclaredType::SpriteRef).unwrap(),
            Value::ObjectRef(ObjectRef { kind: ObjectKind::Sprite, .. })
        ));
    }

    #[test]
    fn sniffing_is_only_a_guess() {
        assert_eq!(sniff_text_type("1,2"), Some(DeclaredType::Vector2));
        assert_eq!(sniff_text_type(r#"{"x":1,"y":2,"z":3}"#), Some(DeclaredType::Vector3));
        assert_eq!(sniff_text_type("Hello, world"), None);
        assert_eq!(sniff_text_type("plain"), None);
    }

    #[test]
    fn decode_row_collects_warnings() {
        let codec = codec();
        let schema = TableSchema {
            table: "t".to_string(),
            engine: Engine::Sqlite,
            columns: vec![
                Column {
                    name: "id".into(),
                    sql_type: "INTEGER".into(),
                    declared_type: DeclaredType::Integer,
                    is_primary_key: true,
                    is_auto_increment: false,
                    is_not_null: false,
                    is_unique: false,
                    default_value: None,
                },
                Column {
                    name: "pos".into(),
                    sql_type: "TEXT".into(),
                    declared_type: DeclaredType::Vector2,
                    is_primary_key: false,
                    is_auto_increment: false,
                    is_not_null: false,
                    is_unique: false,
                    default_value: None,
                },
            ],
        };
        let raw = DbRow::new(
            vec!["id".into(), "pos".into()],
            vec![DbValue::Integer(1), DbValue::Text("garbage".into())],
        );

        let mut warnings = Vec::new();
        let row = codec.decode_row(&schema, &raw, 4, &mut warnings);

        assert_eq!(row.get("pos"), Some(&Value::Vector2(Vec2::ZERO)));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].row, 4);
        assert_eq!(warnings[0].column, "pos");
        assert_eq!(warnings[0].raw, "garbage");
    }
}

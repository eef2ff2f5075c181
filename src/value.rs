//! Source-side value model.
//!
//! Rows handed to the engine by a row source are ordered maps of field name to
//! [`FieldValue`]. Values are untyped until a mapping rule coerces them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One source record: field name -> value, in the layer's column order.
pub type Row = IndexMap<String, FieldValue>;

/// A single coordinate position (x, y and optionally z).
pub type Position = Vec<f64>;

/// Represents the different kinds of values a layer field can hold
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Geometry(Geometry),
    Null,
}

impl FieldValue {
    /// True for explicit nulls and floating-point NaN (the usual "missing" marker
    /// for numeric columns).
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Render the value into the output JSON model without any type conversion.
    ///
    /// Geometry is emitted as its WKT text, non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Geometry(g) => serde_json::Value::String(g.to_wkt()),
            FieldValue::Null => serde_json::Value::Null,
        }
    }

    /// Loose equality against a configured literal (dynamic relation rules).
    ///
    /// Numbers compare numerically across int/float, strings compare exactly,
    /// a string never equals a number. A null literal matches null and NaN.
    pub fn matches_literal(&self, literal: &serde_json::Value) -> bool {
        match (self, literal) {
            (FieldValue::String(s), serde_json::Value::String(l)) => s == l,
            (FieldValue::Bool(b), serde_json::Value::Bool(l)) => b == l,
            (FieldValue::Int(i), serde_json::Value::Number(n)) => match n.as_i64() {
                Some(l) => *i == l,
                None => n.as_f64() == Some(*i as f64),
            },
            (FieldValue::Float(f), serde_json::Value::Number(n)) => n.as_f64() == Some(*f),
            (FieldValue::Geometry(g), serde_json::Value::String(l)) => g.to_wkt() == *l,
            (value, serde_json::Value::Null) => value.is_null(),
            _ => false,
        }
    }
}

/// Textual form of a value, used for key construction and WKT fallbacks.
///
/// Floats follow the shortest round-trip form with a trailing `.0` on
/// integral values (`441.0`), switching to exponent form (`1e+16`, `1e-07`)
/// below `1e-4` and from `1e16` up. Keys built from a float column therefore
/// differ from keys built from an int column holding the same number.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", float_text(*fl)),
            FieldValue::Bool(true) => write!(f, "True"),
            FieldValue::Bool(false) => write!(f, "False"),
            FieldValue::Geometry(g) => write!(f, "{}", g.to_wkt()),
            FieldValue::Null => Ok(()),
        }
    }
}

fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let mut parts = scientific.splitn(2, 'e');
    let mantissa = parts.next().unwrap_or_default();
    let exponent = parts.next().and_then(|e| e.parse::<i32>().ok()).unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let fixed = value.to_string();
        if fixed.contains('.') {
            fixed
        } else {
            format!("{}.0", fixed)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FieldValue::String(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Null
                }
            }
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Null => FieldValue::Null,
            // Nested structures have no column equivalent; keep their JSON text
            other => FieldValue::String(other.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Geometry> for FieldValue {
    fn from(value: Geometry) -> Self {
        FieldValue::Geometry(value)
    }
}

/// Look up a field, treating missing fields, nulls and NaN alike.
pub fn lookup<'a>(row: &'a Row, field: &str) -> Option<&'a FieldValue> {
    row.get(field).filter(|v| !v.is_null())
}

/// Build a row from a JSON object, keeping the object's key order.
///
/// Non-object values produce an empty row.
pub fn row_from_json(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, FieldValue::from(v)))
            .collect(),
        _ => Row::new(),
    }
}

/// Geometry carried by a spatial field, in GeoJSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiPoint(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Well-known text representation (`POINT (1 2)`, `POLYGON ((...))`, ...).
    pub fn to_wkt(&self) -> String {
        let (tag, body) = match self {
            Geometry::Point(p) => ("POINT", positions(std::slice::from_ref(p))),
            Geometry::LineString(ps) => ("LINESTRING", positions(ps)),
            Geometry::Polygon(rings) => ("POLYGON", rings_wkt(rings)),
            Geometry::MultiPoint(ps) => (
                "MULTIPOINT",
                wrap_list(ps.iter().map(|p| format!("({})", position(p)))),
            ),
            Geometry::MultiLineString(lines) => (
                "MULTILINESTRING",
                wrap_list(lines.iter().map(|l| positions(l))),
            ),
            Geometry::MultiPolygon(polys) => (
                "MULTIPOLYGON",
                wrap_list(polys.iter().map(|p| rings_wkt(p))),
            ),
        };

        match body {
            Some(body) if self.has_z() => format!("{} Z {}", tag, body),
            Some(body) => format!("{} {}", tag, body),
            None => format!("{} EMPTY", tag),
        }
    }

    fn has_z(&self) -> bool {
        fn any3(ps: &[Position]) -> bool {
            ps.iter().any(|p| p.len() > 2)
        }
        match self {
            Geometry::Point(p) => p.len() > 2,
            Geometry::LineString(ps) | Geometry::MultiPoint(ps) => any3(ps),
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => {
                rings.iter().any(|r| any3(r))
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().any(|r| any3(r)),
        }
    }
}

fn position(p: &Position) -> String {
    p.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn positions(ps: &[Position]) -> Option<String> {
    if ps.is_empty() || ps.iter().all(|p| p.is_empty()) {
        return None;
    }
    Some(format!(
        "({})",
        ps.iter().map(position).collect::<Vec<_>>().join(", ")
    ))
}

fn rings_wkt(rings: &[Vec<Position>]) -> Option<String> {
    wrap_list(rings.iter().filter_map(|r| positions(r)))
}

fn wrap_list<I>(parts: I) -> Option<String>
where
    I: Iterator,
    I::Item: Into<Option<String>>,
{
    let parts: Vec<String> = parts.filter_map(Into::into).collect();
    if parts.is_empty() {
        None
    } else {
        Some(format!("({})", parts.join(", ")))
    }
}

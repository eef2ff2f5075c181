//! Value coercion from untyped layer values to declared attribute types.
//!
//! Coercion is total: any input yields an output, failures collapse to null.

use serde_json::Value;
use std::fmt;

use crate::value::FieldValue;

/// Declared target type of a simple attribute (`dtype` in the mapping YAML)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Float,
    Int,
    Wkt,
}

impl DataType {
    /// Read a `dtype` name; names outside `float`/`int`/`wkt` mean no coercion.
    pub fn from_config(name: &str) -> Option<Self> {
        match name {
            "float" => Some(DataType::Float),
            "int" => Some(DataType::Int),
            "wkt" => Some(DataType::Wkt),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Float => write!(f, "float"),
            DataType::Int => write!(f, "int"),
            DataType::Wkt => write!(f, "wkt"),
        }
    }
}

/// Convert a layer value to the declared type.
///
/// * null or NaN -> null
/// * `float` / `int` -> parsed number, null when parsing fails
/// * `wkt` -> geometry WKT, or the value's string form
/// * no type -> value unchanged
pub fn coerce(value: &FieldValue, dtype: Option<DataType>) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    match dtype {
        Some(DataType::Float) => to_float(value)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(DataType::Int) => to_int(value).map(Value::from).unwrap_or(Value::Null),
        Some(DataType::Wkt) => match value {
            FieldValue::Geometry(g) => Value::String(g.to_wkt()),
            other => Value::String(other.to_string()),
        },
        None => value.to_json(),
    }
}

/// Decimal reading of a value, `None` when it has no numeric meaning.
pub fn to_float(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Float(f) => Some(*f),
        FieldValue::Int(i) => Some(*i as f64),
        FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        FieldValue::String(s) => s.trim().parse::<f64>().ok(),
        FieldValue::Geometry(_) | FieldValue::Null => None,
    }
}

/// Integer reading of a value.
///
/// Floats truncate toward zero; strings must hold an integer literal, so
/// `"3.5"` is rejected while `3.5` becomes `3`.
pub fn to_int(value: &FieldValue) -> Option<i64> {
    match value {
        FieldValue::Int(i) => Some(*i),
        FieldValue::Float(f) if f.is_finite() && f.abs() < 9.2e18 => Some(f.trunc() as i64),
        FieldValue::Float(_) => None,
        FieldValue::Bool(b) => Some(i64::from(*b)),
        FieldValue::String(s) => s.trim().parse::<i64>().ok(),
        FieldValue::Geometry(_) | FieldValue::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Geometry;
    use serde_json::json;

    #[test]
    fn test_null_and_nan_propagate() {
        assert_eq!(coerce(&FieldValue::Null, Some(DataType::Int)), Value::Null);
        assert_eq!(coerce(&FieldValue::Float(f64::NAN), None), Value::Null);
        assert_eq!(coerce(&FieldValue::Float(f64::NAN), Some(DataType::Wkt)), Value::Null);
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(coerce(&FieldValue::from("12.5"), Some(DataType::Float)), json!(12.5));
        assert_eq!(coerce(&FieldValue::from(" 3 "), Some(DataType::Float)), json!(3.0));
        assert_eq!(coerce(&FieldValue::Int(7), Some(DataType::Float)), json!(7.0));
        assert_eq!(coerce(&FieldValue::from("abc"), Some(DataType::Float)), Value::Null);
        assert_eq!(coerce(&FieldValue::from("inf"), Some(DataType::Float)), Value::Null);
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(coerce(&FieldValue::from("42"), Some(DataType::Int)), json!(42));
        assert_eq!(coerce(&FieldValue::Float(3.9), Some(DataType::Int)), json!(3));
        assert_eq!(coerce(&FieldValue::Float(-3.9), Some(DataType::Int)), json!(-3));
        assert_eq!(coerce(&FieldValue::from("3.5"), Some(DataType::Int)), Value::Null);
        assert_eq!(coerce(&FieldValue::Float(f64::INFINITY), Some(DataType::Int)), Value::Null);
        assert_eq!(coerce(&FieldValue::Bool(true), Some(DataType::Int)), json!(1));
    }

    #[test]
    fn test_wkt_coercion() {
        let point = FieldValue::Geometry(Geometry::Point(vec![1.0, 2.0]));
        assert_eq!(coerce(&point, Some(DataType::Wkt)), json!("POINT (1 2)"));
        assert_eq!(coerce(&FieldValue::from("POINT (0 0)"), Some(DataType::Wkt)), json!("POINT (0 0)"));
        assert_eq!(coerce(&FieldValue::Int(5), Some(DataType::Wkt)), json!("5"));
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(coerce(&FieldValue::from("张三"), None), json!("张三"));
        assert_eq!(coerce(&FieldValue::Int(3), None), json!(3));
        assert_eq!(coerce(&FieldValue::Bool(false), None), json!(false));
    }

    #[test]
    fn test_dtype_from_config() {
        assert_eq!(DataType::from_config("wkt"), Some(DataType::Wkt));
        assert_eq!(DataType::from_config("int"), Some(DataType::Int));
        assert_eq!(DataType::from_config("str"), None);
        assert_eq!(DataType::from_config("Float"), None);
    }
}

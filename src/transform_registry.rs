//! Transform registry for computed attributes.
//!
//! Computed attribute rules name a function (`transform_func: calc_sum_fields`)
//! that is looked up here and evaluated against the whole row. Transforms are
//! total: they always produce a value, bad input contributes nothing.

use std::collections::HashMap;
use std::fmt;
use serde_json::Value;

use crate::mapping::coerce::to_int;
use crate::mapping::rules::TransformParams;
use crate::value::{lookup, Row};

/// Name of the built-in column sum transform
pub const CALC_SUM_FIELDS: &str = "calc_sum_fields";

/// Error type for transform lookups
#[derive(Debug, Clone)]
pub enum TransformError {
    NotFound(String),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::NotFound(name) => write!(f, "Transform not found: {}", name),
        }
    }
}

impl std::error::Error for TransformError {}

/// Trait for computed-attribute functions
pub trait TransformFn: Send + Sync {
    /// Compute a value from the row and the rule's `params`
    fn execute(&self, row: &Row, params: &TransformParams) -> Value;
}

impl<F> TransformFn for F
where
    F: Fn(&Row, &TransformParams) -> Value + Send + Sync,
{
    fn execute(&self, row: &Row, params: &TransformParams) -> Value {
        self(row, params)
    }
}

/// Registry of named computed-attribute functions
pub struct TransformRegistry {
    transforms: HashMap<String, Box<dyn TransformFn>>,
}

impl TransformRegistry {
    /// Create a registry with no transforms at all
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in transforms (`calc_sum_fields`)
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(CALC_SUM_FIELDS, Box::new(sum_fields_transform));
        registry
    }

    /// Register a transformation function, replacing any previous one of that name
    ///
    /// # Example
    ///
    /// ```
    /// use geokg::TransformRegistry;
    /// use geokg::mapping::TransformParams;
    /// use geokg::value::Row;
    /// use serde_json::Value;
    ///
    /// let mut registry = TransformRegistry::new();
    /// registry.register("field_count", Box::new(|row: &Row, _params: &TransformParams| {
    ///     Value::from(row.len())
    /// }));
    /// assert!(registry.has_transform("field_count"));
    /// ```
    pub fn register(&mut self, name: impl Into<String>, func: Box<dyn TransformFn>) {
        self.transforms.insert(name.into(), func);
    }

    /// Call a registered transform
    pub fn call(&self, name: &str, row: &Row, params: &TransformParams) -> Result<Value, TransformError> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| TransformError::NotFound(name.to_string()))?;

        Ok(transform.execute(row, params))
    }

    /// Check if a transform is registered
    pub fn has_transform(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Get list of all registered transform names
    pub fn list_transforms(&self) -> Vec<String> {
        self.transforms.keys().cloned().collect()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum the integer readings of `columns`; missing or non-numeric values add 0.
pub fn calc_sum_fields<S: AsRef<str>>(row: &Row, columns: &[S]) -> i64 {
    columns
        .iter()
        .filter_map(|col| lookup(row, col.as_ref()))
        .filter_map(to_int)
        .fold(0i64, |total, v| total.saturating_add(v))
}

fn sum_fields_transform(row: &Row, params: &TransformParams) -> Value {
    let columns: Vec<&str> = params
        .get("columns")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    Value::from(calc_sum_fields(row, &columns))
}

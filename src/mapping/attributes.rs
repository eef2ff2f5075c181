//! Attribute mapping: project a row onto the declared attribute rules.

use serde_json::{Map, Value};

use crate::mapping::coerce::coerce;
use crate::mapping::rules::{AttributeRule, ComputedRule, LeafRule, NestedRule, SimpleRule, SubsetRule};
use crate::transform_registry::TransformRegistry;
use crate::value::{lookup, Row};

/// Target attribute map, in rule declaration order.
pub type AttributeMap = Map<String, Value>;

/// Evaluate every attribute rule against one row.
///
/// The result holds one key per top-level rule target. Two rules writing the
/// same target leave the later value in place.
pub fn map_attributes(row: &Row, rules: &[AttributeRule], registry: &TransformRegistry) -> AttributeMap {
    let mut attributes = AttributeMap::new();

    for rule in rules {
        let value = match rule {
            AttributeRule::Simple(simple) => simple_value(row, simple),
            AttributeRule::Computed(computed) => computed_value(row, computed, registry),
            AttributeRule::Nested(nested) => Value::Object(nested_value(row, nested, registry)),
        };
        attributes.insert(rule.target().to_string(), value);
    }

    attributes
}

fn simple_value(row: &Row, rule: &SimpleRule) -> Value {
    match rule.source.as_deref().and_then(|source| lookup(row, source)) {
        Some(value) => coerce(value, rule.dtype),
        None => rule.default.clone(),
    }
}

fn computed_value(row: &Row, rule: &ComputedRule, registry: &TransformRegistry) -> Value {
    match registry.call(&rule.function, row, &rule.params) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Attribute '{}' left empty: {}", rule.target, e);
            Value::Null
        }
    }
}

fn subset_value(row: &Row, subset: &SubsetRule) -> Value {
    match subset.source.as_deref().and_then(|source| lookup(row, source)) {
        Some(value) => coerce(value, None),
        None => subset.default.clone(),
    }
}

/// Children and their subsets share a single flat map.
fn nested_value(row: &Row, rule: &NestedRule, registry: &TransformRegistry) -> AttributeMap {
    let mut nested = AttributeMap::new();

    for child in &rule.children {
        let value = match &child.rule {
            LeafRule::Simple(simple) => simple_value(row, simple),
            LeafRule::Computed(computed) => computed_value(row, computed, registry),
        };
        nested.insert(child.rule.target().to_string(), value);

        for subset in &child.subsets {
            nested.insert(subset.target.clone(), subset_value(row, subset));
        }
    }

    for subset in &rule.subsets {
        nested.insert(subset.target.clone(), subset_value(row, subset));
    }

    nested
}

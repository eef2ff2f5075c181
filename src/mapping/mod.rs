//! Row-level mapping: rules and the pure functions that evaluate them.
//!
//! Everything here works on a single row and has no state, so the same row and
//! rules always produce the same key, attributes and relationships.

pub mod attributes;
pub mod coerce;
pub mod key;
pub mod relationships;
pub mod rules;

pub use attributes::{map_attributes, AttributeMap};
pub use coerce::{coerce, DataType};
pub use key::generate_key;
pub use relationships::{map_relationships, resolve_relation};
pub use rules::{
    AttributeRule, ComputedRule, DeduplicationPolicy, DynamicRelationRule, KeyRule, KeyStrategy,
    LeafRule, MappingConfig, MatchValue, NestedChild, NestedRule, RelationshipRule, SimpleRule,
    SubsetRule, TransformParams, OTHERWISE,
};

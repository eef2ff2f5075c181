//! Relationship mapping: derive outgoing edges for one row.

use crate::entity::RelationshipDescriptor;
use crate::mapping::rules::{DynamicRelationRule, MatchValue, RelationshipRule};
use crate::value::{lookup, FieldValue, Row};

/// Evaluate relationship rules in declaration order.
///
/// A rule whose foreign key is null, missing or an empty string contributes
/// nothing; so does a dynamic rule whose decision table has no match.
pub fn map_relationships(row: &Row, rules: &[RelationshipRule]) -> Vec<RelationshipDescriptor> {
    let mut result = Vec::new();

    for rule in rules {
        match rule {
            RelationshipRule::Static {
                relation,
                target_type,
                foreign_key_field,
                target_key_prefix,
            } => {
                if let Some(fk) = foreign_key(row, foreign_key_field) {
                    result.push(RelationshipDescriptor::new(
                        relation.clone(),
                        target_type.clone(),
                        format!("{}{}", target_key_prefix, fk),
                    ));
                }
            }
            RelationshipRule::Dynamic {
                source_column,
                target_type,
                foreign_key_field,
                target_key_prefix,
                rules: table,
            } => {
                let Some(relation) = resolve_relation(row.get(source_column), table) else {
                    tracing::debug!(
                        "No dynamic relation rule matched column '{}' for target {}",
                        source_column,
                        target_type
                    );
                    continue;
                };
                if let Some(fk) = foreign_key(row, foreign_key_field) {
                    result.push(RelationshipDescriptor::new(
                        relation.to_string(),
                        target_type.clone(),
                        format!("{}{}", target_key_prefix, fk),
                    ));
                }
            }
        }
    }

    result
}

/// First entry equal to `value` or marked `otherwise` wins.
///
/// An early `otherwise` shadows everything declared after it. A matched entry
/// without a relation name resolves to nothing. An entry without a
/// `match_value` matches a missing or null column.
pub fn resolve_relation<'a>(value: Option<&FieldValue>, table: &'a [DynamicRelationRule]) -> Option<&'a str> {
    table
        .iter()
        .find(|rule| match &rule.match_value {
            MatchValue::Otherwise => true,
            MatchValue::Literal(literal) => match value {
                Some(v) => v.matches_literal(literal),
                None => literal.is_null(),
            },
        })
        .and_then(|rule| rule.relation_name.as_deref())
        .filter(|name| !name.is_empty())
}

fn foreign_key<'a>(row: &'a Row, field: &str) -> Option<&'a FieldValue> {
    lookup(row, field).filter(|v| !matches!(v, FieldValue::String(s) if s.is_empty()))
}

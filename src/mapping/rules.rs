//! Typed mapping rules.
//!
//! The YAML form of a mapping is loose (one attribute shape carries `type`,
//! `source`, `transform_func`, `children`, ...). Each rule category is read
//! through a `Raw*` struct and converted into a closed enum, so the mappers
//! match exhaustively instead of probing string tags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mapping::coerce::DataType;

/// Parameters handed to a computed-attribute transform (`params:` in YAML)
pub type TransformParams = IndexMap<String, Value>;

/// Catch-all `match_value` of a dynamic relation rule
pub const OTHERWISE: &str = "otherwise";

/// One named transformation unit: one source layer into one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub source_layer: String,
    pub entity_type: String,
    #[serde(default)]
    pub key_rule: KeyRule,
    #[serde(default)]
    pub attributes: Vec<AttributeRule>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRule>,
}

// ---------------------------------------------------------------------------
// Key rules
// ---------------------------------------------------------------------------

/// How entity ids are derived and how rows sharing an id are folded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKeyRule", into = "RawKeyRule")]
pub struct KeyRule {
    pub strategy: KeyStrategy,
    pub deduplication_policy: DeduplicationPolicy,
}

impl Default for KeyRule {
    fn default() -> Self {
        Self {
            strategy: KeyStrategy::Direct {
                prefix: String::new(),
                field: String::new(),
            },
            deduplication_policy: DeduplicationPolicy::Overwrite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// `prefix + row[field]`
    Direct { prefix: String, field: String },
    /// `prefix + md5(row[f1] + row[f2] + ...)`
    CombinatorialHash { prefix: String, fields: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeduplicationPolicy {
    /// First row keeps its attributes, later rows only add new relationships
    MergeRelation,
    /// Last row with a key replaces the whole entity
    Overwrite,
}

impl DeduplicationPolicy {
    /// `merge_relation` selects merging; absent or any other value overwrites.
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            Some("merge_relation") => DeduplicationPolicy::MergeRelation,
            _ => DeduplicationPolicy::Overwrite,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KeyMethod {
    #[default]
    Direct,
    Md5,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawKeyRule {
    #[serde(default)]
    method: KeyMethod,
    #[serde(default)]
    prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deduplication_policy: Option<String>,
}

impl TryFrom<RawKeyRule> for KeyRule {
    type Error = String;

    fn try_from(raw: RawKeyRule) -> Result<Self, Self::Error> {
        let strategy = match raw.method {
            KeyMethod::Direct => KeyStrategy::Direct {
                prefix: raw.prefix,
                field: raw.field,
            },
            KeyMethod::Md5 => {
                if raw.fields.is_empty() {
                    return Err("md5 key rule requires a non-empty 'fields' list".to_string());
                }
                KeyStrategy::CombinatorialHash {
                    prefix: raw.prefix,
                    fields: raw.fields,
                }
            }
        };

        Ok(Self {
            strategy,
            deduplication_policy: DeduplicationPolicy::from_config(
                raw.deduplication_policy.as_deref(),
            ),
        })
    }
}

impl From<KeyRule> for RawKeyRule {
    fn from(rule: KeyRule) -> Self {
        let deduplication_policy = match rule.deduplication_policy {
            DeduplicationPolicy::MergeRelation => Some("merge_relation".to_string()),
            DeduplicationPolicy::Overwrite => None,
        };
        match rule.strategy {
            KeyStrategy::Direct { prefix, field } => RawKeyRule {
                method: KeyMethod::Direct,
                prefix,
                field,
                fields: Vec::new(),
                deduplication_policy,
            },
            KeyStrategy::CombinatorialHash { prefix, fields } => RawKeyRule {
                method: KeyMethod::Md5,
                prefix,
                field: String::new(),
                fields,
                deduplication_policy,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAttributeRule", into = "RawAttributeRule")]
pub enum AttributeRule {
    Simple(SimpleRule),
    Computed(ComputedRule),
    Nested(NestedRule),
}

impl AttributeRule {
    pub fn target(&self) -> &str {
        match self {
            AttributeRule::Simple(rule) => &rule.target,
            AttributeRule::Computed(rule) => &rule.target,
            AttributeRule::Nested(rule) => &rule.target,
        }
    }
}

/// Copy one source field, with a default for nulls and an optional type.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleRule {
    pub target: String,
    pub source: Option<String>,
    pub dtype: Option<DataType>,
    pub default: Value,
}

/// Value produced by a registered transform over the whole row.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedRule {
    pub target: String,
    pub function: String,
    pub params: TransformParams,
}

/// A composite attribute: children plus flattened subsets in one sub-map.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedRule {
    pub target: String,
    pub children: Vec<NestedChild>,
    pub subsets: Vec<SubsetRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedChild {
    pub rule: LeafRule,
    /// Flattened into the parent's sub-map right after this child
    pub subsets: Vec<SubsetRule>,
}

/// Rules allowed inside a nested attribute (no nesting of nesting).
#[derive(Debug, Clone, PartialEq)]
pub enum LeafRule {
    Simple(SimpleRule),
    Computed(ComputedRule),
}

impl LeafRule {
    pub fn target(&self) -> &str {
        match self {
            LeafRule::Simple(rule) => &rule.target,
            LeafRule::Computed(rule) => &rule.target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetRule {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub default: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawAttributeRule {
    target: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dtype: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    default: Value,
    #[serde(default, alias = "function", skip_serializing_if = "Option::is_none")]
    transform_func: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    params: TransformParams,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<RawAttributeRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subsets: Vec<SubsetRule>,
}

impl RawAttributeRule {
    fn into_leaf(self) -> Result<LeafRule, String> {
        if let Some(function) = self.transform_func {
            return Ok(LeafRule::Computed(ComputedRule {
                target: self.target,
                function,
                params: self.params,
            }));
        }
        let dtype = match self.dtype.as_deref() {
            None => None,
            Some(name) => {
                let dtype = DataType::from_config(name);
                if dtype.is_none() {
                    tracing::warn!(
                        "attribute '{}': unknown dtype '{}', values are passed through",
                        self.target,
                        name
                    );
                }
                dtype
            }
        };
        Ok(LeafRule::Simple(SimpleRule {
            target: self.target,
            source: self.source,
            dtype,
            default: self.default,
        }))
    }
}

impl TryFrom<RawAttributeRule> for AttributeRule {
    type Error = String;

    fn try_from(raw: RawAttributeRule) -> Result<Self, Self::Error> {
        match raw.kind.as_deref() {
            Some("nested") => {
                let mut children = Vec::with_capacity(raw.children.len());
                for mut child in raw.children {
                    if child.kind.is_some() {
                        return Err(format!(
                            "attribute '{}': child '{}' cannot declare a type inside a nested attribute",
                            raw.target, child.target
                        ));
                    }
                    if !child.children.is_empty() {
                        return Err(format!(
                            "attribute '{}': child '{}' cannot declare children",
                            raw.target, child.target
                        ));
                    }
                    let subsets = std::mem::take(&mut child.subsets);
                    children.push(NestedChild {
                        rule: child.into_leaf()?,
                        subsets,
                    });
                }
                Ok(AttributeRule::Nested(NestedRule {
                    target: raw.target,
                    children,
                    subsets: raw.subsets,
                }))
            }
            Some(other) => Err(format!(
                "attribute '{}': unknown attribute type '{}'",
                raw.target, other
            )),
            None => {
                if !raw.children.is_empty() || !raw.subsets.is_empty() {
                    return Err(format!(
                        "attribute '{}': children/subsets require 'type: nested'",
                        raw.target
                    ));
                }
                Ok(match raw.into_leaf()? {
                    LeafRule::Simple(rule) => AttributeRule::Simple(rule),
                    LeafRule::Computed(rule) => AttributeRule::Computed(rule),
                })
            }
        }
    }
}

impl From<LeafRule> for RawAttributeRule {
    fn from(rule: LeafRule) -> Self {
        match rule {
            LeafRule::Simple(rule) => RawAttributeRule {
                target: rule.target,
                source: rule.source,
                dtype: rule.dtype.map(|dtype| dtype.to_string()),
                default: rule.default,
                ..Default::default()
            },
            LeafRule::Computed(rule) => RawAttributeRule {
                target: rule.target,
                transform_func: Some(rule.function),
                params: rule.params,
                ..Default::default()
            },
        }
    }
}

impl From<AttributeRule> for RawAttributeRule {
    fn from(rule: AttributeRule) -> Self {
        match rule {
            AttributeRule::Simple(rule) => LeafRule::Simple(rule).into(),
            AttributeRule::Computed(rule) => LeafRule::Computed(rule).into(),
            AttributeRule::Nested(rule) => RawAttributeRule {
                target: rule.target,
                kind: Some("nested".to_string()),
                children: rule
                    .children
                    .into_iter()
                    .map(|child| RawAttributeRule {
                        subsets: child.subsets,
                        ..child.rule.into()
                    })
                    .collect(),
                subsets: rule.subsets,
                ..Default::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Relationship rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRelationshipRule", into = "RawRelationshipRule")]
pub enum RelationshipRule {
    Static {
        relation: String,
        target_type: String,
        foreign_key_field: String,
        target_key_prefix: String,
    },
    Dynamic {
        source_column: String,
        target_type: String,
        foreign_key_field: String,
        target_key_prefix: String,
        rules: Vec<DynamicRelationRule>,
    },
}

/// One row of a dynamic relation decision table.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRelationRule {
    pub match_value: MatchValue,
    pub relation_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    /// The `otherwise` catch-all
    Otherwise,
    Literal(Value),
}

impl From<Value> for MatchValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) if s == OTHERWISE => MatchValue::Otherwise,
            other => MatchValue::Literal(other),
        }
    }
}

impl From<MatchValue> for Value {
    fn from(value: MatchValue) -> Self {
        match value {
            MatchValue::Otherwise => Value::String(OTHERWISE.to_string()),
            MatchValue::Literal(v) => v,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRelationshipRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relation: Option<String>,
    target_type: String,
    foreign_key_field: String,
    #[serde(default)]
    target_key_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dynamic_relation: Option<RawDynamicRelation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDynamicRelation {
    source_column: String,
    #[serde(default)]
    rules: Vec<RawDynamicRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDynamicRule {
    #[serde(default)]
    match_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relation_name: Option<String>,
}

impl TryFrom<RawRelationshipRule> for RelationshipRule {
    type Error = String;

    fn try_from(raw: RawRelationshipRule) -> Result<Self, Self::Error> {
        match raw.dynamic_relation {
            Some(dynamic) => Ok(RelationshipRule::Dynamic {
                source_column: dynamic.source_column,
                target_type: raw.target_type,
                foreign_key_field: raw.foreign_key_field,
                target_key_prefix: raw.target_key_prefix,
                rules: dynamic
                    .rules
                    .into_iter()
                    .map(|rule| DynamicRelationRule {
                        match_value: rule.match_value.into(),
                        relation_name: rule.relation_name,
                    })
                    .collect(),
            }),
            None => {
                let relation = raw.relation.filter(|r| !r.is_empty()).ok_or_else(|| {
                    format!(
                        "relationship to '{}' needs either 'relation' or 'dynamic_relation'",
                        raw.target_type
                    )
                })?;
                Ok(RelationshipRule::Static {
                    relation,
                    target_type: raw.target_type,
                    foreign_key_field: raw.foreign_key_field,
                    target_key_prefix: raw.target_key_prefix,
                })
            }
        }
    }
}

impl From<RelationshipRule> for RawRelationshipRule {
    fn from(rule: RelationshipRule) -> Self {
        match rule {
            RelationshipRule::Static {
                relation,
                target_type,
                foreign_key_field,
                target_key_prefix,
            } => RawRelationshipRule {
                relation: Some(relation),
                target_type,
                foreign_key_field,
                target_key_prefix,
                dynamic_relation: None,
            },
            RelationshipRule::Dynamic {
                source_column,
                target_type,
                foreign_key_field,
                target_key_prefix,
                rules,
            } => RawRelationshipRule {
                relation: None,
                target_type,
                foreign_key_field,
                target_key_prefix,
                dynamic_relation: Some(RawDynamicRelation {
                    source_column,
                    rules: rules
                        .into_iter()
                        .map(|rule| RawDynamicRule {
                            match_value: rule.match_value.into(),
                            relation_name: rule.relation_name,
                        })
                        .collect(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_rule_direct_default() {
        let rule: KeyRule = serde_yaml::from_str("field: BSM\nprefix: 'P_'").unwrap();

        assert_eq!(
            rule.strategy,
            KeyStrategy::Direct {
                prefix: "P_".to_string(),
                field: "BSM".to_string()
            }
        );
        assert_eq!(rule.deduplication_policy, DeduplicationPolicy::Overwrite);
    }

    #[test]
    fn test_key_rule_md5_with_merge() {
        let yaml = "method: md5\nprefix: R_\nfields: [XZQDM, DLBM]\ndeduplication_policy: merge_relation\n";
        let rule: KeyRule = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(
            rule.strategy,
            KeyStrategy::CombinatorialHash {
                prefix: "R_".to_string(),
                fields: vec!["XZQDM".to_string(), "DLBM".to_string()]
            }
        );
        assert_eq!(rule.deduplication_policy, DeduplicationPolicy::MergeRelation);
    }

    #[test]
    fn test_key_rule_md5_needs_fields() {
        let result = serde_yaml::from_str::<KeyRule>("method: md5\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_dedup_policy_overwrites() {
        assert_eq!(
            DeduplicationPolicy::from_config(Some("keep_all")),
            DeduplicationPolicy::Overwrite
        );
        assert_eq!(DeduplicationPolicy::from_config(None), DeduplicationPolicy::Overwrite);
    }

    #[test]
    fn test_attribute_rule_variants() {
        let yaml = r#"
- target: name
  source: MC
  default: unknown
- target: area
  source: MJ
  dtype: float
- target: total
  transform_func: calc_sum_fields
  params:
    columns: [a, b]
- target: detail
  type: nested
  children:
    - target: count
      transform_func: calc_sum_fields
      params: { columns: [a] }
      subsets:
        - target: note
          source: memo
          default: 无
"#;
        let rules: Vec<AttributeRule> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(rules.len(), 4);
        assert!(matches!(&rules[0], AttributeRule::Simple(r) if r.default == json!("unknown")));
        assert!(matches!(&rules[1], AttributeRule::Simple(r) if r.dtype == Some(DataType::Float)));
        assert!(matches!(&rules[2], AttributeRule::Computed(r) if r.function == "calc_sum_fields"));

        let AttributeRule::Nested(nested) = &rules[3] else {
            panic!("expected nested rule");
        };
        assert_eq!(nested.children.len(), 1);
        assert_eq!(nested.children[0].rule.target(), "count");
        assert_eq!(nested.children[0].subsets[0].target, "note");
    }

    #[test]
    fn test_unknown_dtype_means_no_coercion() {
        let rule: AttributeRule = serde_yaml::from_str("target: name\nsource: MC\ndtype: str\n").unwrap();

        let AttributeRule::Simple(simple) = rule else {
            panic!("expected simple rule");
        };
        assert_eq!(simple.source.as_deref(), Some("MC"));
        assert_eq!(simple.dtype, None);
    }

    #[test]
    fn test_nested_inside_nested_rejected() {
        let yaml = r#"
target: outer
type: nested
children:
  - target: inner
    type: nested
"#;
        assert!(serde_yaml::from_str::<AttributeRule>(yaml).is_err());
    }

    #[test]
    fn test_unknown_attribute_type_rejected() {
        let result = serde_yaml::from_str::<AttributeRule>("target: x\ntype: list\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown attribute type"));
    }

    #[test]
    fn test_relationship_rules() {
        let yaml = r#"
- relation: 位于
  target_type: Region
  foreign_key_field: XZQDM
  target_key_prefix: REG_
- target_type: Person
  foreign_key_field: owner
  dynamic_relation:
    source_column: role
    rules:
      - match_value: A
        relation_name: 负责
      - match_value: otherwise
        relation_name: 参与
"#;
        let rules: Vec<RelationshipRule> = serde_yaml::from_str(yaml).unwrap();

        assert!(matches!(&rules[0], RelationshipRule::Static { relation, target_key_prefix, .. }
            if relation == "位于" && target_key_prefix == "REG_"));

        let RelationshipRule::Dynamic { rules: table, target_key_prefix, .. } = &rules[1] else {
            panic!("expected dynamic rule");
        };
        assert_eq!(target_key_prefix, "");
        assert_eq!(table[0].match_value, MatchValue::Literal(json!("A")));
        assert_eq!(table[1].match_value, MatchValue::Otherwise);
    }

    #[test]
    fn test_static_relationship_requires_relation() {
        let yaml = "target_type: Person\nforeign_key_field: owner\n";
        assert!(serde_yaml::from_str::<RelationshipRule>(yaml).is_err());
    }

    #[test]
    fn test_mapping_config_requires_entity_type() {
        let yaml = "source_layer: parcels\n";
        let err = serde_yaml::from_str::<MappingConfig>(yaml).unwrap_err();
        assert!(err.to_string().contains("entity_type"));
    }
}

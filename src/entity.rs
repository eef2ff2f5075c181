//! Graph entity output model.
//!
//! Entities are the engine's output: a typed node with an id, an attribute map
//! and outgoing relationship descriptors. Ids are only unique within one
//! mapping; consumers qualify them by entity type.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::mapping::AttributeMap;

/// A directed, typed edge to another entity identified by key.
///
/// Two descriptors are the same edge iff relation, target type and target id
/// all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub relation: String,
    pub target_type: String,
    pub target_id: String,
}

impl RelationshipDescriptor {
    pub fn new(
        relation: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            target_type: target_type.into(),
            target_id: target_id.into(),
        }
    }
}

/// A typed node produced from one or more source rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub attributes: AttributeMap,
    pub relationships: Vec<RelationshipDescriptor>,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        entity_type: impl Into<String>,
        attributes: AttributeMap,
        relationships: Vec<RelationshipDescriptor>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            attributes,
            relationships,
        }
    }

    /// Append the relationships not already present, keeping their order.
    ///
    /// Returns how many were added.
    pub fn merge_relationships(&mut self, relationships: Vec<RelationshipDescriptor>) -> usize {
        let mut added = 0;
        for rel in relationships {
            if !self.relationships.contains(&rel) {
                self.relationships.push(rel);
                added += 1;
            }
        }
        added
    }

    /// Convert entity to pretty-printed JSON string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// All entities produced by one mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    pub mapping_name: String,
    pub entity_type: String,
    pub entities: Vec<Entity>,
}

impl MappingResult {
    /// A result with no entities (empty or missing layer)
    pub fn empty(mapping_name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            mapping_name: mapping_name.into(),
            entity_type: entity_type.into(),
            entities: Vec::new(),
        }
    }

    /// Find an entity by id
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Mapping name -> result, in configuration order.
pub type EngineResult = IndexMap<String, MappingResult>;

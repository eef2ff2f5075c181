//! Mapping processor: turn one layer's rows into one mapping's entities.
//!
//! Rows are handled strictly in order, since deduplication depends on which
//! row with a given key is seen first (merge) or last (overwrite).

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::entity::{Entity, MappingResult};
use crate::mapping::{
    generate_key, map_attributes, map_relationships, DeduplicationPolicy, MappingConfig,
};
use crate::transform_registry::TransformRegistry;
use crate::value::Row;

/// Run one mapping over a sequence of rows.
///
/// Entities come out in first-seen key order. Under `merge_relation` a
/// repeated key only contributes relationships that are not already present,
/// and the first row's attributes stay. Under the default policy a repeated
/// key replaces the whole entity, keeping its original position.
///
/// # Example
///
/// ```
/// use geokg::mapping::MappingConfig;
/// use geokg::runtime::process_mapping;
/// use geokg::value::row_from_json;
/// use geokg::TransformRegistry;
/// use serde_json::json;
///
/// let mapping: MappingConfig = serde_yaml::from_str(
///     "source_layer: parcels\nentity_type: Parcel\nkey_rule:\n  field: id\n",
/// ).unwrap();
/// let rows = vec![row_from_json(json!({"id": "441"}))];
///
/// let result = process_mapping("parcels", &mapping, &rows, &TransformRegistry::new());
/// assert_eq!(result.entities[0].id, "441");
/// ```
pub fn process_mapping<'r, I>(
    mapping_name: &str,
    mapping: &MappingConfig,
    rows: I,
    registry: &TransformRegistry,
) -> MappingResult
where
    I: IntoIterator<Item = &'r Row>,
{
    let policy = mapping.key_rule.deduplication_policy;
    let mut entities_by_key: IndexMap<String, Entity> = IndexMap::new();
    let mut row_count = 0usize;
    let mut folded = 0usize;

    for row in rows {
        row_count += 1;

        let key = generate_key(row, &mapping.key_rule.strategy);
        let attributes = map_attributes(row, &mapping.attributes, registry);
        let relationships = map_relationships(row, &mapping.relationships);

        match (policy, entities_by_key.entry(key)) {
            (DeduplicationPolicy::MergeRelation, Entry::Occupied(mut existing)) => {
                existing.get_mut().merge_relationships(relationships);
                folded += 1;
            }
            (DeduplicationPolicy::Overwrite, Entry::Occupied(mut existing)) => {
                let id = existing.key().clone();
                existing.insert(Entity::new(id, &mapping.entity_type, attributes, relationships));
                folded += 1;
            }
            (_, Entry::Vacant(slot)) => {
                let id = slot.key().clone();
                slot.insert(Entity::new(id, &mapping.entity_type, attributes, relationships));
            }
        }
    }

    if row_count == 0 {
        tracing::warn!(
            "Layer '{}' is empty or missing; mapping '{}' produced no entities",
            mapping.source_layer,
            mapping_name
        );
        return MappingResult::empty(mapping_name, &mapping.entity_type);
    }

    tracing::debug!(
        "Mapping '{}': {} rows, {} folded into existing keys ({:?})",
        mapping_name,
        row_count,
        folded,
        policy
    );

    MappingResult {
        mapping_name: mapping_name.to_string(),
        entity_type: mapping.entity_type.clone(),
        entities: entities_by_key.into_values().collect(),
    }
}

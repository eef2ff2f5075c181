//! # geokg: Declarative Layer-to-Graph Transformation
//!
//! geokg turns rows of geospatial layers into graph entities (typed nodes with
//! attributes and relationships). What to build is described entirely in a
//! YAML mapping document; the engine interprets it.
//!
//! ## Features
//!
//! - **Key rules**: direct field keys or MD5 keys over several fields
//! - **Attribute rules**: typed copies with defaults, computed values through a
//!   transform registry, nested attributes with flattened subsets
//! - **Relationship rules**: static edges, or edges named by a decision table
//!   on a column value with an `otherwise` catch-all
//! - **Deduplication**: `merge_relation` folds repeated keys by merging edges,
//!   otherwise the last row with a key wins
//! - **Pluggable I/O**: row sources and result writers behind traits
//!
//! ## Example: mapping document
//!
//! ```yaml
//! global_config:
//!   database_path: data/survey
//!
//! parcels:
//!   source_layer: DLTB
//!   entity_type: Parcel
//!   key_rule:
//!     field: BSM
//!     prefix: "P_"
//!     deduplication_policy: merge_relation
//!   attributes:
//!     - target: area
//!       source: TBMJ
//!       dtype: float
//!     - target: shape
//!       source: geometry
//!       dtype: wkt
//!   relationships:
//!     - relation: 位于
//!       target_type: Region
//!       foreign_key_field: ZLDWDM
//!       target_key_prefix: "REG_"
//! ```

// Core modules
pub mod entity;
pub mod mapping;
pub mod serialization;
pub mod source;
pub mod transform_registry;
pub mod value;

// Configuration loading and orchestration
pub mod runtime;

// Re-export key types
pub use entity::{EngineResult, Entity, MappingResult, RelationshipDescriptor};
pub use mapping::{AttributeRule, KeyRule, MappingConfig, RelationshipRule};
pub use transform_registry::{TransformError, TransformRegistry};
pub use value::{FieldValue, Geometry, Row};

pub use runtime::{ConfigError, Engine, EngineConfig, EngineRun, MappingError};
pub use serialization::{JsonDirWriter, NdjsonDirWriter, ResultWriter, SerializationError};
pub use source::{GeoJsonDirSource, InMemorySource, RowSource, SourceError};

//! Engine orchestrator: run every configured mapping against a row source.

use indexmap::IndexMap;
use std::fmt;

use crate::entity::{EngineResult, MappingResult};
use crate::mapping::MappingConfig;
use crate::runtime::config_loader::{check_required, unknown_transforms, ConfigError, EngineConfig};
use crate::runtime::layer_cache::LayerCache;
use crate::runtime::processor::process_mapping;
use crate::source::{RowSource, SourceError};
use crate::transform_registry::TransformRegistry;

/// Why a single mapping produced no result
#[derive(Debug, Clone)]
pub enum MappingError {
    Configuration(ConfigError),
    SourceUnavailable(SourceError),
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::Configuration(e) => write!(f, "Configuration error: {}", e),
            MappingError::SourceUnavailable(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MappingError::Configuration(e) => Some(e),
            MappingError::SourceUnavailable(e) => Some(e),
        }
    }
}

impl From<ConfigError> for MappingError {
    fn from(err: ConfigError) -> Self {
        MappingError::Configuration(err)
    }
}

impl From<SourceError> for MappingError {
    fn from(err: SourceError) -> Self {
        MappingError::SourceUnavailable(err)
    }
}

/// Outcome of one engine run.
///
/// A failed mapping is reported in `failures` and never stops its siblings.
#[derive(Debug, Clone, Default)]
pub struct EngineRun {
    pub result: EngineResult,
    pub failures: IndexMap<String, MappingError>,
}

impl EngineRun {
    /// True when every mapping produced a result
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of entities across all mappings
    pub fn entity_count(&self) -> usize {
        self.result.values().map(MappingResult::len).sum()
    }

    pub fn into_result(self) -> EngineResult {
        self.result
    }
}

/// Runs a mapping document against row sources.
///
/// # Example
///
/// ```
/// use geokg::runtime::{Engine, EngineConfig};
/// use geokg::source::InMemorySource;
/// use geokg::value::row_from_json;
/// use serde_json::json;
///
/// let config = EngineConfig::from_yaml_str(r#"
/// global_config:
///   database_path: unused
/// parcels:
///   source_layer: DLTB
///   entity_type: Parcel
///   key_rule: { field: BSM }
/// "#).unwrap();
/// let source = InMemorySource::new()
///     .with_layer("DLTB", vec![row_from_json(json!({"BSM": "1"}))]);
///
/// let run = Engine::new(config).run(&source);
/// assert_eq!(run.result["parcels"].entities[0].id, "1");
/// ```
pub struct Engine {
    config: EngineConfig,
    registry: TransformRegistry,
}

impl Engine {
    /// Create an engine with the built-in transforms.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, TransformRegistry::new())
    }

    /// Create an engine with a caller-supplied transform registry.
    pub fn with_registry(config: EngineConfig, registry: TransformRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Register extra computed-attribute transforms before running.
    pub fn registry_mut(&mut self) -> &mut TransformRegistry {
        &mut self.registry
    }

    /// Run every mapping block in document order.
    ///
    /// Layers are read through a cache that lives for this run only.
    pub fn run<S: RowSource>(&self, source: S) -> EngineRun {
        let mut cache = LayerCache::new(source);
        let mut run = EngineRun::default();

        for (name, entry) in self.config.entries() {
            let outcome = match entry {
                Ok(mapping) => self.run_mapping(name, mapping, &mut cache),
                Err(e) => Err(MappingError::from(e.clone())),
            };

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        "Mapping '{}' complete: {} {} entities",
                        name,
                        result.len(),
                        result.entity_type
                    );
                    run.result.insert(name.clone(), result);
                }
                Err(e) => {
                    tracing::warn!("Mapping '{}' skipped: {}", name, e);
                    run.failures.insert(name.clone(), e);
                }
            }
        }

        run
    }

    /// Run a single mapping through a layer cache.
    ///
    /// Fails only when the mapping lacks its layer or entity type, or when the
    /// source cannot be read. Unknown transforms leave their attribute null.
    pub fn run_mapping<S: RowSource>(
        &self,
        name: &str,
        mapping: &MappingConfig,
        cache: &mut LayerCache<S>,
    ) -> Result<MappingResult, MappingError> {
        check_required(name, mapping)?;
        for problem in unknown_transforms(name, mapping, &self.registry) {
            tracing::warn!("{}; the attribute will be null", problem);
        }

        tracing::info!("Processing mapping '{}' (layer '{}')", name, mapping.source_layer);
        let rows = cache.rows(&mapping.source_layer)?;

        Ok(process_mapping(name, mapping, rows, &self.registry))
    }
}

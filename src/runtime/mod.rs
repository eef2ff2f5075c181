//! Engine runtime: configuration loading, per-mapping processing and the
//! orchestrator that runs a whole mapping document.

pub mod config_loader;
pub mod engine;
pub mod layer_cache;
pub mod processor;

// Re-export key types
pub use config_loader::{
    check_required, unknown_transforms, validate_mapping, ConfigError, EngineConfig, GlobalConfig,
    GLOBAL_CONFIG_KEY,
};
pub use engine::{Engine, EngineRun, MappingError};
pub use layer_cache::LayerCache;
pub use processor::process_mapping;

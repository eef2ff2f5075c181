//! Engine configuration loader.
//!
//! Loads a mapping document from YAML. The document is a map of mapping name
//! to mapping block, plus a reserved `global_config` entry. Blocks that do not
//! declare a `source_layer` are auxiliary configuration and are skipped.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::mapping::{AttributeRule, LeafRule, MappingConfig};
use crate::transform_registry::TransformRegistry;

/// Reserved top-level key that never describes a mapping
pub const GLOBAL_CONFIG_KEY: &str = "global_config";

/// Error type for configuration problems
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Yaml(String),
    /// The document itself is not a usable mapping document
    InvalidDocument(String),
    /// One mapping block is malformed; only that mapping is affected
    InvalidMapping { mapping: String, reason: String },
    /// A computed attribute names a transform that is not registered.
    /// Reported by validation only; at run time the attribute is null.
    UnknownTransform {
        mapping: String,
        target: String,
        function: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Yaml(msg) => write!(f, "Failed to parse YAML: {}", msg),
            ConfigError::InvalidDocument(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidMapping { mapping, reason } => {
                write!(f, "Invalid mapping '{}': {}", mapping, reason)
            }
            ConfigError::UnknownTransform {
                mapping,
                target,
                function,
            } => write!(
                f,
                "Mapping '{}': attribute '{}' uses unknown transform '{}'",
                mapping, target, function
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings shared by all mappings (`global_config:` block)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Location of the source dataset
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Directory result files are written to
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Anything else; kept so auxiliary settings survive a round trip
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

/// Loaded mapping document.
///
/// Mapping blocks keep document order. A malformed block is kept as its error
/// so the engine can report it while still running its siblings.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub global: GlobalConfig,
    mappings: IndexMap<String, Result<MappingConfig, ConfigError>>,
}

impl EngineConfig {
    /// Load a mapping document from a YAML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not a YAML map. Problems
    /// inside individual mapping blocks do not fail the load.
    ///
    /// # Example
    /// ```ignore
    /// use geokg::runtime::EngineConfig;
    ///
    /// let config = EngineConfig::load_from_file("config/mapping.yaml")?;
    /// println!("Mappings: {:?}", config.mapping_names());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::Io(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse a mapping document from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::Yaml(e.to_string()))?;

        let document = match yaml {
            serde_yaml::Value::Mapping(map) => map,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            _ => {
                return Err(ConfigError::InvalidDocument(
                    "top level must be a map of mapping blocks".to_string(),
                ))
            }
        };

        let mut config = Self::default();

        for (key, value) in document {
            let Some(name) = key.as_str() else {
                tracing::debug!("Skipping non-string configuration key {:?}", key);
                continue;
            };

            if name == GLOBAL_CONFIG_KEY {
                config.global = serde_yaml::from_value(value).map_err(|e| {
                    ConfigError::InvalidDocument(format!("{}: {}", GLOBAL_CONFIG_KEY, e))
                })?;
                continue;
            }

            if value.get("source_layer").is_none() {
                tracing::debug!("Skipping '{}': not a mapping block", name);
                continue;
            }

            let mapping = serde_yaml::from_value::<MappingConfig>(value)
                .map_err(|e| ConfigError::InvalidMapping {
                    mapping: name.to_string(),
                    reason: e.to_string(),
                })
                .and_then(|mapping| check_structure(name, mapping));

            if let Err(e) = &mapping {
                tracing::warn!("{}", e);
            }
            config.mappings.insert(name.to_string(), mapping);
        }

        Ok(config)
    }

    /// Build a configuration from already-typed mappings.
    ///
    /// Useful for testing or when the rule tree is built programmatically.
    pub fn from_mappings<I, S>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (S, MappingConfig)>,
        S: Into<String>,
    {
        Self {
            global: GlobalConfig::default(),
            mappings: mappings
                .into_iter()
                .map(|(name, mapping)| (name.into(), Ok(mapping)))
                .collect(),
        }
    }

    /// Every mapping block in document order, malformed ones included
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Result<MappingConfig, ConfigError>)> {
        self.mappings.iter()
    }

    /// Get a well-formed mapping by name
    pub fn get_mapping(&self, name: &str) -> Option<&MappingConfig> {
        self.mappings.get(name).and_then(|m| m.as_ref().ok())
    }

    /// Check if a mapping block (well-formed or not) is defined
    pub fn has_mapping(&self, name: &str) -> bool {
        self.mappings.contains_key(name)
    }

    /// Get all mapping names in document order
    pub fn mapping_names(&self) -> Vec<&String> {
        self.mappings.keys().collect()
    }

    /// Collect every configuration problem against a transform registry.
    ///
    /// Unknown transforms are reported here but do not stop a run: the
    /// affected attribute is written as null.
    pub fn validate(&self, registry: &TransformRegistry) -> Vec<ConfigError> {
        self.mappings
            .iter()
            .flat_map(|(name, mapping)| match mapping {
                Ok(mapping) => validate_mapping(name, mapping, registry),
                Err(e) => vec![e.clone()],
            })
            .collect()
    }
}

/// Every problem of a typed mapping: required fields, then unknown transforms.
pub fn validate_mapping(
    name: &str,
    mapping: &MappingConfig,
    registry: &TransformRegistry,
) -> Vec<ConfigError> {
    match check_required(name, mapping) {
        Ok(()) => unknown_transforms(name, mapping, registry),
        Err(e) => vec![e],
    }
}

/// The only structural problems that stop a mapping from running.
pub fn check_required(name: &str, mapping: &MappingConfig) -> Result<(), ConfigError> {
    if mapping.source_layer.trim().is_empty() {
        return Err(invalid(name, "source_layer must not be empty"));
    }
    if mapping.entity_type.trim().is_empty() {
        return Err(invalid(name, "entity_type must not be empty"));
    }
    Ok(())
}

/// Computed attributes (nested ones included) naming a transform `registry` lacks.
pub fn unknown_transforms(
    name: &str,
    mapping: &MappingConfig,
    registry: &TransformRegistry,
) -> Vec<ConfigError> {
    computed_functions(&mapping.attributes)
        .into_iter()
        .filter(|(_, function)| !registry.has_transform(function))
        .map(|(target, function)| ConfigError::UnknownTransform {
            mapping: name.to_string(),
            target: target.to_string(),
            function: function.to_string(),
        })
        .collect()
}

fn check_structure(name: &str, mapping: MappingConfig) -> Result<MappingConfig, ConfigError> {
    check_required(name, &mapping)?;
    Ok(mapping)
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidMapping {
        mapping: name.to_string(),
        reason: reason.to_string(),
    }
}

/// (target, function) of every computed attribute, nested ones included.
fn computed_functions(rules: &[AttributeRule]) -> Vec<(&str, &str)> {
    let mut found = Vec::new();
    for rule in rules {
        match rule {
            AttributeRule::Simple(_) => {}
            AttributeRule::Computed(c) => found.push((c.target.as_str(), c.function.as_str())),
            AttributeRule::Nested(nested) => {
                for child in &nested.children {
                    if let LeafRule::Computed(c) = &child.rule {
                        found.push((c.target.as_str(), c.function.as_str()));
                    }
                }
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::KeyStrategy;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = r#"
global_config:
  database_path: data/survey.gdb
  output_dir: out
  crs: EPSG:4490

parcels:
  source_layer: DLTB
  entity_type: Parcel
  key_rule:
    field: BSM
    prefix: P_
  attributes:
    - target: name
      source: MC

notes:
  author: survey team

roads:
  source_layer: LXDW
  entity_type: Road
  key_rule:
    method: md5
    fields: [XZQDM, LXBM]
"#;

    #[test]
    fn test_load_document() {
        let config = EngineConfig::from_yaml_str(DOCUMENT).unwrap();

        assert_eq!(config.mapping_names(), vec!["parcels", "roads"]);
        assert_eq!(config.global.database_path, Some(PathBuf::from("data/survey.gdb")));
        assert_eq!(config.global.output_dir, Some(PathBuf::from("out")));
        assert!(config.global.extra.contains_key("crs"));
        assert!(!config.has_mapping("notes"));
        assert!(!config.has_mapping(GLOBAL_CONFIG_KEY));

        let parcels = config.get_mapping("parcels").unwrap();
        assert_eq!(parcels.source_layer, "DLTB");
        assert!(matches!(parcels.key_rule.strategy, KeyStrategy::Direct { .. }));

        let roads = config.get_mapping("roads").unwrap();
        assert!(roads.attributes.is_empty());
        assert!(matches!(roads.key_rule.strategy, KeyStrategy::CombinatorialHash { .. }));
    }

    #[test]
    fn test_malformed_mapping_is_isolated() {
        let yaml = r#"
good:
  source_layer: A
  entity_type: Thing
bad:
  source_layer: B
blank:
  source_layer: ""
  entity_type: Thing
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();

        assert!(config.get_mapping("good").is_some());
        assert!(config.has_mapping("bad"));
        assert!(config.get_mapping("bad").is_none());

        let errors = config.validate(&TransformRegistry::new());
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], ConfigError::InvalidMapping { mapping, .. } if mapping == "bad"));
        assert!(matches!(&errors[1], ConfigError::InvalidMapping { mapping, .. } if mapping == "blank"));
    }

    #[test]
    fn test_unknown_transform_reported() {
        let yaml = r#"
stats:
  source_layer: A
  entity_type: Stat
  attributes:
    - target: detail
      type: nested
      children:
        - target: avg
          transform_func: calc_average
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert!(config.get_mapping("stats").is_some());

        let errors = config.validate(&TransformRegistry::new());
        assert_eq!(
            errors,
            vec![ConfigError::UnknownTransform {
                mapping: "stats".to_string(),
                target: "avg".to_string(),
                function: "calc_average".to_string(),
            }]
        );
    }

    #[test]
    fn test_non_map_document_rejected() {
        let result = EngineConfig::from_yaml_str("- a\n- b\n");
        assert!(matches!(result, Err(ConfigError::InvalidDocument(_))));

        let empty = EngineConfig::from_yaml_str("{}").unwrap();
        assert!(empty.mapping_names().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), DOCUMENT).unwrap();

        let config = EngineConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.mapping_names().len(), 2);

        let missing = EngineConfig::load_from_file("/nonexistent/mapping.yaml");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_from_mappings() {
        let mapping: MappingConfig =
            serde_yaml::from_str("source_layer: L\nentity_type: T\n").unwrap();

        let config = EngineConfig::from_mappings(vec![("m", mapping)]);

        assert_eq!(config.mapping_names(), vec!["m"]);
        assert!(config.validate(&TransformRegistry::new()).is_empty());
    }
}

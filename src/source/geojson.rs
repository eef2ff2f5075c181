//! GeoJSON directory source.
//!
//! A dataset is a directory with one FeatureCollection per layer
//! (`<dir>/<layer>.geojson`, or `<layer>.json`). Each feature becomes a row of
//! its properties followed by a geometry field.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::source::{RowSource, SourceError};
use crate::value::{FieldValue, Geometry, Row};

/// Default name of the geometry column
pub const GEOMETRY_FIELD: &str = "geometry";

const LAYER_EXTENSIONS: [&str; 2] = ["geojson", "json"];

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

/// Reads layers from a directory of GeoJSON files
#[derive(Debug, Clone)]
pub struct GeoJsonDirSource {
    root: PathBuf,
    geometry_field: String,
}

impl GeoJsonDirSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            geometry_field: GEOMETRY_FIELD.to_string(),
        }
    }

    /// Store feature geometry under a different column name
    pub fn with_geometry_field(mut self, name: impl Into<String>) -> Self {
        self.geometry_field = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn layer_path(&self, layer: &str) -> Option<PathBuf> {
        LAYER_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", layer, ext)))
            .find(|p| p.is_file())
    }

    fn feature_to_row(&self, feature: Feature) -> Row {
        let mut row: Row = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, FieldValue::from(v)))
            .collect();

        let geometry = match feature.geometry {
            None | Some(Value::Null) => FieldValue::Null,
            Some(value) => match serde_json::from_value::<Geometry>(value) {
                Ok(geometry) => FieldValue::Geometry(geometry),
                Err(e) => {
                    tracing::debug!("Unsupported feature geometry, stored as null: {}", e);
                    FieldValue::Null
                }
            },
        };
        row.insert(self.geometry_field.clone(), geometry);
        row
    }
}

impl RowSource for GeoJsonDirSource {
    fn read_layer(&self, layer: &str) -> Result<Vec<Row>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::Unavailable {
                layer: layer.to_string(),
                reason: format!("dataset directory does not exist: {}", self.root.display()),
            });
        }

        let Some(path) = self.layer_path(layer) else {
            tracing::warn!("Layer '{}' not found in {}", layer, self.root.display());
            return Ok(Vec::new());
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to read layer file {}: {}", path.display(), e);
                return Ok(Vec::new());
            }
        };

        let collection: FeatureCollection = match serde_json::from_str(&contents) {
            Ok(collection) => collection,
            Err(e) => {
                tracing::warn!("Failed to parse layer file {}: {}", path.display(), e);
                return Ok(Vec::new());
            }
        };

        Ok(collection
            .features
            .into_iter()
            .map(|f| self.feature_to_row(f))
            .collect())
    }
}

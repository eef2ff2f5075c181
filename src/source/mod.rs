//! Row sources: where layers come from.
//!
//! The engine never reads storage itself. A [`RowSource`] turns a layer name
//! into an ordered sequence of rows; a missing layer is an empty sequence, and
//! only an unreachable backing store is an error.

pub mod geojson;

use indexmap::IndexMap;
use std::fmt;

use crate::value::Row;

pub use geojson::GeoJsonDirSource;

/// Error type for row source failures
#[derive(Debug, Clone)]
pub enum SourceError {
    /// The backing store cannot be reached at all
    Unavailable { layer: String, reason: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable { layer, reason } => {
                write!(f, "Source unavailable while reading layer '{}': {}", layer, reason)
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// Supplier of layer rows.
///
/// Implementations return rows in the layer's natural order.
pub trait RowSource {
    /// Read every row of `layer`.
    ///
    /// # Returns
    ///
    /// * `Ok(rows)` - Layer rows, empty when the layer does not exist
    /// * `Err(SourceError::Unavailable)` - The store itself failed
    fn read_layer(&self, layer: &str) -> Result<Vec<Row>, SourceError>;
}

impl<T: RowSource + ?Sized> RowSource for &T {
    fn read_layer(&self, layer: &str) -> Result<Vec<Row>, SourceError> {
        (**self).read_layer(layer)
    }
}

/// Layers held in memory, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    layers: IndexMap<String, Vec<Row>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.layers.insert(name.into(), rows);
        self
    }

    pub fn insert_layer(&mut self, name: impl Into<String>, rows: Vec<Row>) {
        self.layers.insert(name.into(), rows);
    }

    pub fn layer_names(&self) -> Vec<&String> {
        self.layers.keys().collect()
    }
}

impl RowSource for InMemorySource {
    fn read_layer(&self, layer: &str) -> Result<Vec<Row>, SourceError> {
        Ok(self.layers.get(layer).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::row_from_json;
    use serde_json::json;

    #[test]
    fn test_in_memory_source() {
        let source = InMemorySource::new()
            .with_layer("parcels", vec![row_from_json(json!({"id": 1}))]);

        assert_eq!(source.read_layer("parcels").unwrap().len(), 1);
        assert!(source.read_layer("roads").unwrap().is_empty());
        assert_eq!(source.layer_names(), vec!["parcels"]);
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::Unavailable {
            layer: "parcels".to_string(),
            reason: "disk gone".to_string(),
        };
        assert!(err.to_string().contains("parcels"));
        assert!(err.to_string().contains("disk gone"));
    }
}

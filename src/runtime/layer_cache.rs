//! Per-run layer cache.
//!
//! Several mappings often read the same layer. The cache pulls a layer from
//! its row source on first access and hands out the stored rows afterwards.
//! It lives for one engine run and is dropped with it.

use std::collections::HashMap;

use crate::source::{RowSource, SourceError};
use crate::value::Row;

/// Lazily populated layer -> rows cache over a row source
pub struct LayerCache<S> {
    source: S,
    layers: HashMap<String, Vec<Row>>,
}

impl<S: RowSource> LayerCache<S> {
    /// Create an empty cache in front of `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            layers: HashMap::new(),
        }
    }

    /// Rows of `layer`, reading the source only on first access.
    ///
    /// Source failures are not cached; a later call retries the read.
    pub fn rows(&mut self, layer: &str) -> Result<&[Row], SourceError> {
        if !self.layers.contains_key(layer) {
            let rows = self.source.read_layer(layer)?;
            tracing::debug!("Cached layer '{}' ({} rows)", layer, rows.len());
            self.layers.insert(layer.to_string(), rows);
        }

        Ok(self.layers.get(layer).map(Vec::as_slice).unwrap_or_default())
    }

    /// Check if a layer has been read already.
    pub fn is_cached(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    /// Get the number of cached layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Drop every cached layer (keeps the source).
    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Give back the row source.
    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use crate::value::row_from_json;
    use serde_json::json;
    use std::cell::Cell;

    struct CountingSource {
        inner: InMemorySource,
        reads: Cell<usize>,
    }

    impl RowSource for CountingSource {
        fn read_layer(&self, layer: &str) -> Result<Vec<Row>, SourceError> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read_layer(layer)
        }
    }

    struct BrokenSource;

    impl RowSource for BrokenSource {
        fn read_layer(&self, layer: &str) -> Result<Vec<Row>, SourceError> {
            Err(SourceError::Unavailable {
                layer: layer.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    #[test]
    fn test_layer_read_once() {
        let source = CountingSource {
            inner: InMemorySource::new().with_layer("a", vec![row_from_json(json!({"x": 1}))]),
            reads: Cell::new(0),
        };
        let mut cache = LayerCache::new(source);

        assert!(!cache.is_cached("a"));
        assert_eq!(cache.rows("a").unwrap().len(), 1);
        assert_eq!(cache.rows("a").unwrap().len(), 1);
        assert!(cache.is_cached("a"));
        assert_eq!(cache.layer_count(), 1);

        let source = cache.into_source();
        assert_eq!(source.reads.get(), 1);
    }

    #[test]
    fn test_missing_layer_cached_as_empty() {
        let mut cache = LayerCache::new(InMemorySource::new());

        assert!(cache.rows("nothing").unwrap().is_empty());
        assert!(cache.is_cached("nothing"));

        cache.clear();
        assert_eq!(cache.layer_count(), 0);
    }

    #[test]
    fn test_source_error_not_cached() {
        let mut cache = LayerCache::new(BrokenSource);

        assert!(cache.rows("a").is_err());
        assert!(!cache.is_cached("a"));
    }
}

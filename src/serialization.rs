//! Result writers.
//!
//! The engine hands its [`EngineResult`] to a [`ResultWriter`]; writers own
//! the storage format. Two are provided: one pretty JSON document per mapping,
//! and NDJSON with one entity per line.

use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entity::EngineResult;

/// Failure while writing mapping results
#[derive(Debug)]
pub enum SerializationError {
    /// An entity or mapping result could not be encoded
    JsonError(serde_json::Error),
    /// The output directory or a result file could not be written
    IoError(std::io::Error),
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError::JsonError(err)
    }
}

impl From<std::io::Error> for SerializationError {
    fn from(err: std::io::Error) -> Self {
        SerializationError::IoError(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::JsonError(e) => write!(f, "JSON error: {}", e),
            SerializationError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::JsonError(e) => Some(e),
            SerializationError::IoError(e) => Some(e),
        }
    }
}

/// Destination for an engine result
pub trait ResultWriter {
    /// Persist every mapping result, returning the files written
    fn write(&mut self, result: &EngineResult) -> Result<Vec<PathBuf>, SerializationError>;
}

/// Writes `<output_dir>/<mapping>.json`, one pretty-printed document per mapping
pub struct JsonDirWriter {
    output_dir: PathBuf,
}

impl JsonDirWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

impl ResultWriter for JsonDirWriter {
    fn write(&mut self, result: &EngineResult) -> Result<Vec<PathBuf>, SerializationError> {
        fs::create_dir_all(&self.output_dir)?;

        let mut written = Vec::with_capacity(result.len());
        for (name, mapping_result) in result {
            let path = self.output_dir.join(format!("{}.json", name));
            let mut writer = BufWriter::new(fs::File::create(&path)?);
            serde_json::to_writer_pretty(&mut writer, mapping_result)?;
            writer.flush()?;

            tracing::info!("Saved {} ({} entities)", path.display(), mapping_result.len());
            written.push(path);
        }
        Ok(written)
    }
}

/// Writes `<output_dir>/<mapping>.ndjson`, one entity per line
pub struct NdjsonDirWriter {
    output_dir: PathBuf,
}

impl NdjsonDirWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

impl ResultWriter for NdjsonDirWriter {
    fn write(&mut self, result: &EngineResult) -> Result<Vec<PathBuf>, SerializationError> {
        fs::create_dir_all(&self.output_dir)?;

        let mut written = Vec::with_capacity(result.len());
        for (name, mapping_result) in result {
            let path = self.output_dir.join(format!("{}.ndjson", name));
            let mut writer = NdjsonWriter::new(BufWriter::new(fs::File::create(&path)?));
            writer.write_all(&mapping_result.entities)?;
            writer.flush()?;

            tracing::info!("Saved {} ({} entities)", path.display(), mapping_result.len());
            written.push(path);
        }
        Ok(written)
    }
}

/// NDJSON stream of [`Entity`](crate::entity::Entity) records.
///
/// Each entity becomes one compact JSON line with its `id`, `type`,
/// `attributes` and `relationships`, so large mappings can be streamed into a
/// graph loader line by line. [`NdjsonDirWriter`] uses one per mapping file.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    /// Create a new NDJSON writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Append one entity as a single line
    pub fn write<T: Serialize>(&mut self, entity: &T) -> Result<(), SerializationError> {
        let json = serde_json::to_string(entity)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Append entities in order, one line each
    pub fn write_all<T: Serialize>(
        &mut self,
        entities: &[T],
    ) -> Result<(), SerializationError> {
        for entity in entities {
            self.write(entity)?;
        }
        Ok(())
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, MappingResult, RelationshipDescriptor};
    use crate::mapping::AttributeMap;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn sample_result() -> EngineResult {
        let mut attributes = AttributeMap::new();
        attributes.insert("name".to_string(), json!("张三的地块"));

        let mut result = EngineResult::new();
        result.insert(
            "parcels".to_string(),
            MappingResult {
                mapping_name: "parcels".to_string(),
                entity_type: "Parcel".to_string(),
                entities: vec![
                    Entity::new(
                        "441",
                        "Parcel",
                        attributes,
                        vec![RelationshipDescriptor::new("负责", "Person", "张三")],
                    ),
                    Entity::new("442", "Parcel", AttributeMap::new(), Vec::new()),
                ],
            },
        );
        result.insert("roads".to_string(), MappingResult::empty("roads", "Road"));
        result
    }

    #[test]
    fn test_ndjson_writer_streams_entities() {
        let result = sample_result();
        let mut buf = Vec::new();
        let mut writer = NdjsonWriter::new(&mut buf);

        writer.write_all(&result["parcels"].entities).unwrap();
        writer.flush().unwrap();

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("张三的地块"));
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(
            first,
            json!({
                "id": "441",
                "type": "Parcel",
                "attributes": {"name": "张三的地块"},
                "relationships": [{"relation": "负责", "target_type": "Person", "target_id": "张三"}]
            })
        );
    }

    #[test]
    fn test_json_dir_writer() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("output");

        let written = JsonDirWriter::new(&out).write(&sample_result()).unwrap();

        assert_eq!(written, vec![out.join("parcels.json"), out.join("roads.json")]);

        let text = fs::read_to_string(out.join("parcels.json")).unwrap();
        assert!(text.contains("张三的地块"));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["mapping_name"], json!("parcels"));
        assert_eq!(value["entities"][0]["relationships"][0]["target_id"], json!("张三"));

        let roads: Value = serde_json::from_str(&fs::read_to_string(out.join("roads.json")).unwrap()).unwrap();
        assert_eq!(roads["entities"], json!([]));
    }

    #[test]
    fn test_ndjson_dir_writer() {
        let dir = TempDir::new().unwrap();

        NdjsonDirWriter::new(dir.path()).write(&sample_result()).unwrap();

        let text = fs::read_to_string(dir.path().join("parcels.ndjson")).unwrap();
        let ids: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("441"), json!("442")]);

        let roads = fs::read_to_string(dir.path().join("roads.ndjson")).unwrap();
        assert!(roads.is_empty());
    }
}

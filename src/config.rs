//! Pipeline documents
//!
//! A document is YAML with one reserved top-level key, `pipeline`, holding
//! the ordered stage identifiers. Every other top-level key is the
//! configuration of the stage whose identifier it names:
//!
//! ```yaml
//! pipeline:
//!   - stagelink.stages.integer.IntegerStage
//!   - stagelink.stages.print.PrintStage
//! stagelink.stages.integer.IntegerStage:
//!   value: 42
//! ```

use crate::error::{LinkError, LinkResult};
use crate::schema::Schema;
use serde_json::{Map, Value};
use std::path::Path;

/// Top-level key holding the stage identifiers
pub const PIPELINE_KEY: &str = "pipeline";

/// Default document looked up by the command line
pub const DEFAULT_DOCUMENT: &str = "pipeline.yaml";

const DOCUMENT_SCHEMA: &str = r#"
type: object
properties:
  pipeline:
    type: [array, "null"]
    items:
      type: string
"#;

/// A parsed and shape-checked pipeline document
#[derive(Debug, Clone, Default)]
pub struct PipelineDocument {
    stages: Vec<String>,
    stage_configs: Map<String, Value>,
}

impl PipelineDocument {
    /// Read and check a document from disk
    pub fn from_path(path: impl AsRef<Path>) -> LinkResult<Self> {
        let path = path.as_ref();
        tracing::debug!("Reading pipeline document {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse and check a document from YAML text
    pub fn from_yaml_str(text: &str) -> LinkResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_value(value)
    }

    /// Check an already parsed document
    ///
    /// The shape is verified before anything is extracted, so a malformed
    /// document fails before any stage is touched.
    pub fn from_value(value: Value) -> LinkResult<Self> {
        let value = match value {
            Value::Null => return Ok(Self::default()),
            other => other,
        };

        let schema = Schema::from_yaml("pipeline document", DOCUMENT_SCHEMA)?;
        if let Some(violation) = schema.first_violation(&value) {
            return Err(LinkError::InvalidDocument(violation));
        }

        let mut stage_configs = match value {
            Value::Object(map) => map,
            _ => return Err(LinkError::InvalidDocument("expected a mapping".to_string())),
        };

        let stages = match stage_configs.remove(PIPELINE_KEY) {
            Some(list) => serde_json::from_value::<Option<Vec<String>>>(list)?.unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(Self {
            stages,
            stage_configs,
        })
    }

    /// Build a document programmatically
    pub fn new<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stages: stages.into_iter().map(Into::into).collect(),
            stage_configs: Map::new(),
        }
    }

    /// Attach configuration for the stage identified by `key`
    pub fn with_stage_config(mut self, key: impl Into<String>, config: Value) -> Self {
        self.stage_configs.insert(key.into(), config);
        self
    }

    /// Stage identifiers in pipeline order
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Configuration stored under `key`, if any
    pub fn stage_config(&self, key: &str) -> Option<&Value> {
        self.stage_configs.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document() {
        let document = PipelineDocument::from_yaml_str(
            r#"
pipeline:
  - units.a.A
  - units.b.B
units.a.A:
  value: 3
"#,
        )
        .unwrap();

        assert_eq!(document.stages(), &["units.a.A", "units.b.B"]);
        assert_eq!(document.stage_config("units.a.A"), Some(&json!({ "value": 3 })));
        assert!(document.stage_config("units.b.B").is_none());
        assert!(document.stage_config(PIPELINE_KEY).is_none());
    }

    #[test]
    fn test_empty_documents() {
        for text in ["", "   \n", "~", "pipeline:", "pipeline: []", "other.Stage: {}"] {
            let document = PipelineDocument::from_yaml_str(text).unwrap();
            assert!(document.is_empty(), "{:?} should be empty", text);
        }
    }

    #[test]
    fn test_pipeline_must_be_list_of_strings() {
        for text in ["pipeline: units.a.A", "pipeline:\n  - 1\n  - units.a.A", "- units.a.A"] {
            let result = PipelineDocument::from_yaml_str(text);
            assert!(
                matches!(result, Err(LinkError::InvalidDocument(_))),
                "{:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_unparsable_yaml() {
        let result = PipelineDocument::from_yaml_str("pipeline: [units.a.A");
        assert!(matches!(result, Err(LinkError::Yaml(_))));
    }

    #[test]
    fn test_builder_style() {
        let document = PipelineDocument::new(["units.a.A"])
            .with_stage_config("units.a.A", json!({ "value": 1 }));

        assert_eq!(document.stages().len(), 1);
        assert!(document.stage_config("units.a.A").is_some());
    }

    #[test]
    fn test_from_path() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(DEFAULT_DOCUMENT);
        std::fs::write(&path, "pipeline:\n  - units.a.A\n").unwrap();

        let document = PipelineDocument::from_path(&path).unwrap();
        assert_eq!(document.stages(), &["units.a.A"]);

        let missing = PipelineDocument::from_path(temp_dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(LinkError::Io(_))));
    }
}

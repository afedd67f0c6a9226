//! JSON Schema checks for pipeline documents and stage configuration
//!
//! Schemas are written in YAML or JSON and compiled once. Validation stops at
//! the first violation so the message points at a single thing to fix.

use crate::error::{LinkError, LinkResult};
use jsonschema::JSONSchema;
use serde_json::Value;

/// A compiled schema
pub struct Schema {
    owner: String,
    compiled: JSONSchema,
}

impl Schema {
    /// Compile a schema given as a JSON value
    ///
    /// `owner` names whatever supplied the schema (a unit path, or the
    /// document itself) and only shows up in error messages.
    pub fn compile(owner: impl Into<String>, schema: &Value) -> LinkResult<Self> {
        let owner = owner.into();
        let compiled = JSONSchema::compile(schema).map_err(|e| LinkError::InvalidSchema {
            unit: owner.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { owner, compiled })
    }

    /// Compile a schema written as YAML
    pub fn from_yaml(owner: impl Into<String>, text: &str) -> LinkResult<Self> {
        let owner = owner.into();
        let schema: Value = serde_yaml::from_str(text).map_err(|e| LinkError::InvalidSchema {
            unit: owner.clone(),
            reason: e.to_string(),
        })?;
        Self::compile(owner, &schema)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Describe the first violation of `instance`, if any
    pub fn first_violation(&self, instance: &Value) -> Option<String> {
        let result = self.compiled.validate(instance);
        let mut errors = match result {
            Ok(()) => return None,
            Err(errors) => errors,
        };

        errors.next().map(|error| {
            let path = error.instance_path.to_string();
            if path.is_empty() {
                error.to_string()
            } else {
                format!("{} (at '{}')", error, path)
            }
        })
    }

    /// Validate a stage configuration entry stored under `key`
    pub fn validate_config(&self, key: &str, instance: &Value) -> LinkResult<()> {
        match self.first_violation(instance) {
            None => Ok(()),
            Some(reason) => Err(LinkError::InvalidConfiguration {
                key: key.to_string(),
                reason,
            }),
        }
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema").field("owner", &self.owner).finish()
    }
}

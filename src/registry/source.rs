//! Schema sources feeding the registry load phase.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RegistryError;
use crate::types::Definition;

/// Supplies parsed definitions for registry population.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load(&self) -> Result<Vec<Definition>, RegistryError>;
}

#[async_trait]
impl SchemaSource for Vec<Definition> {
    async fn load(&self) -> Result<Vec<Definition>, RegistryError> {
        Ok(self.clone())
    }
}

/// Source over in-memory JSON resources.
///
/// Each resource is either a single StructureDefinition, ValueSet or
/// CodeSystem, or a `Bundle` whose entries hold such resources (the layout of
/// the published `profiles-types.json` / `profiles-resources.json` files).
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaSource {
    resources: Vec<Value>,
}

impl JsonSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_resources(mut self, resources: impl IntoIterator<Item = Value>) -> Self {
        self.resources.extend(resources);
        self
    }

    /// Parses one JSON document and adds it to the source.
    pub fn with_json_str(self, json: &str) -> Result<Self, RegistryError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| RegistryError::load(format!("invalid JSON definition: {e}")))?;
        Ok(self.with_resource(value))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn collect(value: &Value, out: &mut Vec<Definition>) -> Result<(), RegistryError> {
        if !value.is_object() {
            return Err(RegistryError::load("definition is not a JSON object"));
        }

        if value.get("resourceType").and_then(Value::as_str) == Some("Bundle") {
            let entries = value
                .get("entry")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for entry in entries {
                if let Some(resource) = entry.get("resource") {
                    Self::collect(resource, out)?;
                }
            }
            return Ok(());
        }

        out.push(Definition::from_json(value.clone())?);
        Ok(())
    }
}

#[async_trait]
impl SchemaSource for JsonSchemaSource {
    async fn load(&self) -> Result<Vec<Definition>, RegistryError> {
        let mut definitions = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            Self::collect(resource, &mut definitions)?;
        }
        tracing::debug!(
            "JSON source produced {} definitions from {} resources",
            definitions.len(),
            self.resources.len()
        );
        Ok(definitions)
    }
}

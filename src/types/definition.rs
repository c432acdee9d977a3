use serde_json::Value;

use super::structure_definition::StructureDefinition;
use super::terminology::{CodeSystem, ValueSet};
use crate::error::RegistryError;

/// Any definition resource the registry can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    StructureDefinition(StructureDefinition),
    ValueSet(ValueSet),
    CodeSystem(CodeSystem),
}

impl Definition {
    /// Parses a definition resource, dispatching on `resourceType`.
    pub fn from_json(value: Value) -> Result<Self, RegistryError> {
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistryError::load("missing or invalid 'resourceType' in JSON"))?
            .to_string();

        let parse_err = |e: serde_json::Error| {
            RegistryError::load(format!("failed to parse {resource_type}: {e}"))
        };

        match resource_type.as_str() {
            "StructureDefinition" => serde_json::from_value(value)
                .map(Self::StructureDefinition)
                .map_err(parse_err),
            "ValueSet" => serde_json::from_value(value)
                .map(Self::ValueSet)
                .map_err(parse_err),
            "CodeSystem" => serde_json::from_value(value)
                .map(Self::CodeSystem)
                .map_err(parse_err),
            other => Err(RegistryError::load(format!("unknown resourceType: {other}"))),
        }
    }

    /// Key under which the registry stores this definition.
    pub fn canonical_key(&self) -> &str {
        match self {
            Self::StructureDefinition(sd) => sd.canonical_key(),
            Self::ValueSet(vs) => &vs.url,
            Self::CodeSystem(cs) => &cs.url,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::StructureDefinition(_) => "StructureDefinition",
            Self::ValueSet(_) => "ValueSet",
            Self::CodeSystem(_) => "CodeSystem",
        }
    }

    pub fn as_structure_definition(&self) -> Option<&StructureDefinition> {
        match self {
            Self::StructureDefinition(sd) => Some(sd),
            _ => None,
        }
    }
}

impl From<StructureDefinition> for Definition {
    fn from(sd: StructureDefinition) -> Self {
        Self::StructureDefinition(sd)
    }
}

impl From<ValueSet> for Definition {
    fn from(vs: ValueSet) -> Self {
        Self::ValueSet(vs)
    }
}

impl From<CodeSystem> for Definition {
    fn from(cs: CodeSystem) -> Self {
        Self::CodeSystem(cs)
    }
}

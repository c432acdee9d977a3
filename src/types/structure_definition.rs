//! StructureDefinition types used by the validator.
//!
//! Only the parts of a StructureDefinition that drive structural validation are
//! modelled: identity, the base type and the snapshot element list. Everything
//! else in the JSON is ignored on deserialization.

use serde::{Deserialize, Serialize};

use super::constraint::Constraint;

/// Type code marking a composite container (backbone) element.
pub const BACKBONE_ELEMENT_TYPE: &str = "BackboneElement";

/// Polymorphic (choice type) marker in element paths.
pub const CHOICE_MARKER: &str = "[x]";

/// FHIRPath system string type used by the `value` element of primitives.
pub const FHIRPATH_SYSTEM_STRING: &str = "http://hl7.org/fhirpath/System.String";

pub const REGEX_EXTENSION_URL: &str = "http://hl7.org/fhir/StructureDefinition/regex";

pub const FHIR_TYPE_EXTENSION_URL: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-fhir-type";

/// Literal used for unbounded maximum cardinality.
pub const UNBOUNDED: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StructureDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// primitive-type | complex-type | resource | logical
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub r#abstract: bool,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(rename = "baseDefinition", skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub element: Vec<ElementDefinition>,
}

impl StructureDefinition {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_element(mut self, element: ElementDefinition) -> Self {
        self.snapshot
            .get_or_insert_with(Snapshot::default)
            .element
            .push(element);
        self
    }

    /// Registry key: extension profiles key by URL, everything else by id.
    pub fn canonical_key(&self) -> &str {
        if self.type_name == "Extension" && self.id != "Extension" {
            &self.url
        } else {
            &self.id
        }
    }

    /// Snapshot elements, empty when the definition carries no snapshot.
    pub fn elements(&self) -> &[ElementDefinition] {
        self.snapshot
            .as_ref()
            .map(|s| s.element.as_slice())
            .unwrap_or_default()
    }

    /// The element describing the definition itself (`id == self.id`).
    pub fn root_element(&self) -> Option<&ElementDefinition> {
        self.elements()
            .iter()
            .find(|e| e.id.as_deref() == Some(self.id.as_str()))
    }

    /// The synthetic `<id>.value` element of a primitive type.
    pub fn value_element(&self) -> Option<&ElementDefinition> {
        let target = format!("{}.value", self.id);
        self.elements()
            .iter()
            .find(|e| e.id.as_deref() == Some(target.as_str()))
    }
}

/// Maximum cardinality of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxCardinality {
    Bounded(u32),
    Unbounded,
}

impl MaxCardinality {
    /// Parses a `max` value. Anything that is neither `*` nor an integer counts as 1.
    pub fn parse(max: &str) -> Self {
        if max == UNBOUNDED {
            return Self::Unbounded;
        }
        Self::Bounded(max.trim().parse().unwrap_or(1))
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ElementDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<ElementBase>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<ElementType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraint: Vec<Constraint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ElementBase {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: String,
}

impl ElementDefinition {
    /// Creates an element whose id equals its path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: Some(path.clone()),
            path,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_cardinality(mut self, min: u32, max: impl Into<String>) -> Self {
        self.min = Some(min);
        self.max = Some(max.into());
        self
    }

    pub fn with_base(mut self, min: u32, max: impl Into<String>) -> Self {
        self.base = Some(ElementBase {
            path: self.path.clone(),
            min,
            max: max.into(),
        });
        self
    }

    pub fn with_type(mut self, element_type: ElementType) -> Self {
        self.types.push(element_type);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint.push(constraint);
        self
    }

    /// Element id, falling back to the path for elements without one.
    pub fn element_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.path)
    }

    pub fn min(&self) -> u32 {
        self.min.unwrap_or(0)
    }

    pub fn max_cardinality(&self) -> MaxCardinality {
        MaxCardinality::parse(self.max.as_deref().unwrap_or("1"))
    }

    pub fn base_max_cardinality(&self) -> Option<MaxCardinality> {
        self.base.as_ref().map(|b| MaxCardinality::parse(&b.max))
    }

    /// Whether instances of this element are JSON arrays.
    ///
    /// True when the base or own max is unbounded, or the own max exceeds one.
    pub fn is_array(&self) -> bool {
        let base_unbounded = self
            .base_max_cardinality()
            .is_some_and(MaxCardinality::is_unbounded);
        match self.max_cardinality() {
            MaxCardinality::Unbounded => true,
            MaxCardinality::Bounded(max) => base_unbounded || max > 1,
        }
    }

    pub fn first_type_code(&self) -> Option<&str> {
        self.types.first().map(|t| t.code.as_str())
    }

    pub fn has_type(&self, code: &str) -> bool {
        self.types.iter().any(|t| t.code == code)
    }

    pub fn is_backbone(&self) -> bool {
        self.has_type(BACKBONE_ELEMENT_TYPE)
    }

    pub fn is_choice(&self) -> bool {
        self.path.contains(CHOICE_MARKER)
    }

    /// First underscore-prefixed segment of the id (primitive extension sibling).
    pub fn underscore_segment(&self) -> Option<&str> {
        self.element_id()
            .split('.')
            .find(|segment| segment.starts_with('_'))
    }

    /// First `regex` extension value across the declared types.
    pub fn regex_pattern(&self) -> Option<&str> {
        self.types
            .iter()
            .flat_map(|t| t.extension.iter())
            .find(|ext| ext.url == REGEX_EXTENSION_URL)
            .and_then(|ext| ext.value_string.as_deref())
    }

    /// Underlying FHIR type named by the `structuredefinition-fhir-type` extension.
    pub fn fhir_type_hint(&self) -> Option<&str> {
        self.types
            .iter()
            .flat_map(|t| t.extension.iter())
            .find(|ext| ext.url == FHIR_TYPE_EXTENSION_URL)
            .and_then(|ext| ext.value_url.as_deref().or(ext.value_string.as_deref()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ElementType {
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,
    #[serde(rename = "targetProfile", skip_serializing_if = "Option::is_none")]
    pub target_profile: Option<Vec<String>>,
}

impl ElementType {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Extension {
    pub url: String,
    #[serde(rename = "valueString", skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(rename = "valueUrl", skip_serializing_if = "Option::is_none")]
    pub value_url: Option<String>,
    #[serde(rename = "valueCode", skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,
    #[serde(rename = "valueCanonical", skip_serializing_if = "Option::is_none")]
    pub value_canonical: Option<String>,
}

impl Extension {
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            url: REGEX_EXTENSION_URL.to_string(),
            value_string: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn fhir_type(type_name: impl Into<String>) -> Self {
        Self {
            url: FHIR_TYPE_EXTENSION_URL.to_string(),
            value_url: Some(type_name.into()),
            ..Default::default()
        }
    }
}

pub mod constraint;
pub mod definition;
pub mod structure_definition;
pub mod terminology;

pub use constraint::Constraint;
pub use definition::Definition;
pub use structure_definition::{
    BACKBONE_ELEMENT_TYPE, CHOICE_MARKER, ElementBase, ElementDefinition, ElementType, Extension,
    FHIR_TYPE_EXTENSION_URL, FHIRPATH_SYSTEM_STRING, MaxCardinality, REGEX_EXTENSION_URL,
    Snapshot, StructureDefinition, UNBOUNDED,
};
pub use terminology::{CodeSystem, Concept, ValueSet, ValueSetCompose, ValueSetInclude};

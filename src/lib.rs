//! # OctoFHIR SD Validator
//!
//! Structural validation of FHIR resources driven directly by
//! StructureDefinition snapshots.
//!
//! ## Features
//!
//! - **Definition registry**: StructureDefinitions, ValueSets and CodeSystems keyed by canonical name, sealed after loading
//! - **Structural walk**: cardinality, array shape and primitive format checks with recursion into complex types
//! - **Batched invariants**: constraints are collected during the walk and evaluated in one call to a pluggable evaluator
//! - **OperationOutcome**: every finding, including evaluator failures, ends up in one outcome document
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use octofhir_sdvalidator::*;
//!
//! # async fn example(definitions: Vec<serde_json::Value>) -> Result<()> {
//! let source = JsonSchemaSource::new().with_resources(definitions);
//! let registry = DefinitionRegistry::from_source(&source).await?;
//! let validator = StructureValidator::new(Arc::new(registry), ValidatorConfig::default());
//!
//! let patient = serde_json::json!({"resourceType": "Patient", "name": [{"family": "Doe"}]});
//! let report = validator.validate_resource(&patient).await?;
//! println!("{}", serde_json::to_string_pretty(&report.outcome)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod invariant;
pub mod outcome;
pub mod registry;
pub mod types;
pub mod validation;

pub use config::{DEFAULT_SKIPPED_CONSTRAINTS, ValidatorConfig};
pub use error::{EvaluatorError, RegistryError, Result, ValidatorError};
#[cfg(feature = "process-evaluator")]
pub use invariant::{CommandEvaluator, CommandEvaluatorConfig};
pub use invariant::{
    EvaluationTrace, EvaluatorResponse, InvariantCollector, InvariantEvaluator, InvariantJob,
    InvariantResult,
};
pub use outcome::{
    CodeableConcept, InvariantCodeOverrides, Issue, IssueCode, IssueSeverity, OperationOutcome,
    default_code_overrides, finalize, record_evaluator_failure,
};
pub use registry::{DefinitionRegistry, JsonSchemaSource, RegistryStats, SchemaSource};
pub use types::*;
pub use validation::{
    DEFAULT_STRING_PATTERN, ElementGroups, FHIR_R4_RESOURCE_TYPES, PatternCache,
    ResourceTypeCatalogue, StructuralReport, StructureValidator, ValidationReport, ValidationRun,
    classify,
};

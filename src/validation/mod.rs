//! Validation entry points.
//!
//! [`StructureValidator`] checks a document's resource type, walks the document
//! against the StructureDefinition registered for that type, sends the
//! collected invariant batch to the evaluator and folds the results into a
//! single [`OperationOutcome`].

pub mod catalogue;
pub mod classifier;
pub mod primitive;
pub mod walker;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::config::ValidatorConfig;
use crate::error::{EvaluatorError, Result, ValidatorError};
use crate::invariant::{EvaluationTrace, InvariantEvaluator, InvariantJob, InvariantResult};
use crate::outcome::{IssueCode, OperationOutcome, finalize, record_evaluator_failure};
use crate::registry::DefinitionRegistry;

pub use catalogue::{FHIR_R4_RESOURCE_TYPES, ResourceTypeCatalogue};
pub use classifier::{ElementGroups, classify};
pub use primitive::{DEFAULT_STRING_PATTERN, PatternCache};
pub use walker::ValidationRun;

/// Outcome of the structural phase only.
#[derive(Debug, Clone)]
pub struct StructuralReport {
    pub outcome: OperationOutcome,
    /// Invariant batch collected during the walk, in enqueue order.
    pub jobs: Vec<InvariantJob>,
    /// Set when the document's resource type is not in the catalogue. The
    /// outcome then holds exactly one issue and nothing else runs.
    pub resource_type_rejected: bool,
}

/// Outcome of a full validation run.
#[derive(Debug)]
pub struct ValidationReport {
    pub outcome: OperationOutcome,
    /// Jobs sent to the evaluator, or left pending when none is configured.
    pub jobs: Vec<InvariantJob>,
    pub results: Vec<InvariantResult>,
    pub trace: Option<EvaluationTrace>,
    pub evaluator_error: Option<EvaluatorError>,
}

impl ValidationReport {
    fn from_structural(report: StructuralReport) -> Self {
        Self {
            outcome: report.outcome,
            jobs: report.jobs,
            results: Vec::new(),
            trace: None,
            evaluator_error: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.outcome.is_valid()
    }

    /// True when the evaluator call failed and invariants were not checked.
    pub fn is_fatal(&self) -> bool {
        self.evaluator_error.is_some()
    }
}

pub struct StructureValidator {
    registry: Arc<DefinitionRegistry>,
    evaluator: Option<Arc<dyn InvariantEvaluator>>,
    config: ValidatorConfig,
    catalogue: ResourceTypeCatalogue,
    patterns: PatternCache,
}

impl StructureValidator {
    /// Creates a validator over `registry`, sealing it if the load phase did
    /// not already.
    pub fn new(registry: Arc<DefinitionRegistry>, config: ValidatorConfig) -> Self {
        registry.seal();
        let catalogue = match &config.resource_types {
            Some(types) => ResourceTypeCatalogue::from_types(types.iter().cloned()),
            None => ResourceTypeCatalogue::r4(),
        };
        let patterns = PatternCache::new(config.pattern_cache_size);
        Self {
            registry,
            evaluator: None,
            config,
            catalogue,
            patterns,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn InvariantEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &ResourceTypeCatalogue {
        &self.catalogue
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Runs the structural phase and returns the outcome with the pending
    /// invariant batch.
    pub fn validate_structure(&self, resource: &Value) -> Result<StructuralReport> {
        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(ValidatorError::MissingResourceType)?;

        if !self.catalogue.contains(resource_type) {
            let mut outcome = OperationOutcome::new();
            outcome.add_error(
                IssueCode::Invalid,
                format!(
                    "Invalid resource type '{}'. Expected one of: {}",
                    resource_type,
                    self.catalogue.joined()
                ),
                "",
                "Invalid resource type",
            );
            return Ok(StructuralReport {
                outcome,
                jobs: Vec::new(),
                resource_type_rejected: true,
            });
        }

        let definition = self.registry.resolve(resource_type).map_err(|_| {
            ValidatorError::UnknownRootSchema {
                resource_type: resource_type.to_string(),
            }
        })?;
        let schema =
            definition
                .as_structure_definition()
                .ok_or_else(|| ValidatorError::InvalidRootSchema {
                    resource_type: resource_type.to_string(),
                })?;
        let data = resource
            .as_object()
            .ok_or(ValidatorError::MissingResourceType)?;

        tracing::debug!("Validating {} resource", resource_type);

        let mut run = ValidationRun::new(
            &self.registry,
            &self.config,
            &self.patterns,
            Arc::new(resource.clone()),
        );
        run.validate(data, schema, resource_type);
        let (outcome, jobs) = run.finish();

        Ok(StructuralReport {
            outcome,
            jobs,
            resource_type_rejected: false,
        })
    }

    /// Validates a resource end to end.
    ///
    /// Missing or unregistered root definitions are errors. Every other
    /// problem is reported in the returned outcome, including a failed
    /// evaluator call.
    pub async fn validate_resource(&self, resource: &Value) -> Result<ValidationReport> {
        let structural = self.validate_structure(resource)?;
        if structural.resource_type_rejected {
            return Ok(ValidationReport::from_structural(structural));
        }

        let mut report = ValidationReport::from_structural(structural);
        let evaluator = match &self.evaluator {
            Some(evaluator) if !report.jobs.is_empty() => evaluator,
            _ => {
                finalize(
                    &mut report.outcome,
                    &[],
                    &self.config.invariant_code_overrides,
                );
                return Ok(report);
            }
        };

        tracing::debug!("Evaluating {} invariants", report.jobs.len());

        match evaluator.evaluate(&report.jobs).await {
            Ok(mut response) => {
                response.retain_submitted(&report.jobs);
                finalize(
                    &mut report.outcome,
                    &response.results,
                    &self.config.invariant_code_overrides,
                );
                report.results = response.results;
                report.trace = response.trace;
            }
            Err(e) => {
                tracing::warn!("Invariant evaluation failed: {}", e);
                record_evaluator_failure(&mut report.outcome, &e);
                report.evaluator_error = Some(e);
            }
        }

        Ok(report)
    }

    /// Validates many resources, at most `max_concurrent_validations` at a
    /// time. Results are in input order.
    pub async fn validate_many(&self, resources: &[Value]) -> Vec<Result<ValidationReport>> {
        let limit = self.config.max_concurrent_validations.max(1);
        stream::iter(resources)
            .map(|resource| self.validate_resource(resource))
            .buffered(limit)
            .collect()
            .await
    }
}

impl std::fmt::Debug for StructureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureValidator")
            .field("definitions", &self.registry.len())
            .field("has_evaluator", &self.evaluator.is_some())
            .field("config", &self.config)
            .finish()
    }
}

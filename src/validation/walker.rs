//! Recursive descent of a document against its StructureDefinitions.
//!
//! A [`ValidationRun`] walks one document. It owns the run-local state (the
//! outcome and the invariant collector) and borrows everything shared: the
//! registry, the configuration and the compiled pattern cache. Structural
//! problems are recorded as issues and never stop the walk.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::classifier::classify;
use super::primitive::{PatternCache, normalize_type_code, scalar_text, value_pattern};
use crate::config::ValidatorConfig;
use crate::invariant::{InvariantCollector, InvariantJob};
use crate::outcome::{IssueCode, OperationOutcome};
use crate::registry::DefinitionRegistry;
use crate::types::{ElementDefinition, MaxCardinality, StructureDefinition};

pub struct ValidationRun<'v> {
    registry: &'v DefinitionRegistry,
    config: &'v ValidatorConfig,
    patterns: &'v PatternCache,
    root_data: Arc<Value>,
    outcome: OperationOutcome,
    invariants: InvariantCollector,
}

impl<'v> ValidationRun<'v> {
    pub fn new(
        registry: &'v DefinitionRegistry,
        config: &'v ValidatorConfig,
        patterns: &'v PatternCache,
        root_data: Arc<Value>,
    ) -> Self {
        Self {
            registry,
            config,
            patterns,
            root_data,
            outcome: OperationOutcome::new(),
            invariants: InvariantCollector::new(),
        }
    }

    pub fn outcome(&self) -> &OperationOutcome {
        &self.outcome
    }

    pub fn invariants(&self) -> &InvariantCollector {
        &self.invariants
    }

    /// Ends the run, handing back the structural outcome and the job batch.
    pub fn finish(self) -> (OperationOutcome, Vec<InvariantJob>) {
        (self.outcome, self.invariants.drain())
    }

    /// Validates `data` against `schema`, reporting fields under `path_prefix`.
    ///
    /// An empty object is a no-op.
    pub fn validate(
        &mut self,
        data: &Map<String, Value>,
        schema: &StructureDefinition,
        path_prefix: &str,
    ) {
        self.validate_at_depth(data, schema, path_prefix, 0);
    }

    fn validate_at_depth(
        &mut self,
        data: &Map<String, Value>,
        schema: &StructureDefinition,
        path_prefix: &str,
        depth: usize,
    ) {
        if data.is_empty() {
            return;
        }
        if depth > self.config.max_depth {
            self.outcome.add_error(
                IssueCode::TooCostly,
                format!(
                    "Maximum nesting depth of {} exceeded at '{}'",
                    self.config.max_depth, path_prefix
                ),
                path_prefix,
                "Nesting too deep",
            );
            return;
        }

        tracing::trace!("Validating {} at {}", schema.id, path_prefix);

        let groups = classify(schema.elements());

        for element in &groups.top_level {
            if self.check_path(element, path_prefix) {
                self.validate_element(data, element, schema, path_prefix, depth);
            }
        }
        for element in &groups.backbone_nested {
            if self.check_path(element, path_prefix) {
                self.validate_backbone_element(element, path_prefix);
            }
        }
        for element in &groups.choice {
            if self.check_path(element, path_prefix) {
                self.validate_choice_element(element, path_prefix);
            }
        }

        self.gather_invariants(data, schema, path_prefix);
    }

    fn check_path(&mut self, element: &ElementDefinition, parent_path: &str) -> bool {
        if element.path.is_empty() {
            self.outcome.add_error(
                IssueCode::Invalid,
                "Element has an empty path",
                parent_path,
                "Path is empty",
            );
            return false;
        }
        true
    }

    fn validate_element(
        &mut self,
        data: &Map<String, Value>,
        element: &ElementDefinition,
        schema: &StructureDefinition,
        parent_path: &str,
        depth: usize,
    ) {
        // The schema's own element describes the node, not one of its fields.
        if element.element_id() == schema.id {
            return;
        }

        let field_name = element
            .path
            .strip_prefix(schema.id.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(&element.path);
        let full_path = join_path(
            parent_path,
            element.underscore_segment().unwrap_or(field_name),
        );

        match data.get(field_name) {
            None => {
                if element.min() > 0 {
                    self.outcome.add_error(
                        IssueCode::Required,
                        format!("Field '{full_path}' is required"),
                        &full_path,
                        "Field is required",
                    );
                }
            }
            Some(value) => self.validate_field(value, element, &full_path, depth),
        }
    }

    fn validate_field(
        &mut self,
        value: &Value,
        element: &ElementDefinition,
        path: &str,
        depth: usize,
    ) {
        if element.is_array() {
            self.validate_array(value, element, path, depth);
        } else {
            self.validate_value(value, element, path, depth);
        }
    }

    fn validate_array(
        &mut self,
        value: &Value,
        element: &ElementDefinition,
        path: &str,
        depth: usize,
    ) {
        let Some(items) = value.as_array() else {
            self.outcome.add_error(
                IssueCode::Invalid,
                format!("Field '{path}' must be an array"),
                path,
                "Field must be an array",
            );
            return;
        };

        let length = items.len();
        let min = element.min() as usize;
        if length < min {
            self.outcome.add_error(
                IssueCode::Required,
                format!(
                    "Field '{path}' has too few items: minimum is {min}. Found {length} elements"
                ),
                path,
                "Field has too few items",
            );
        }

        if let MaxCardinality::Bounded(max) = element.max_cardinality() {
            if length > max as usize {
                self.outcome.add_error(
                    IssueCode::Invalid,
                    format!(
                        "Field '{path}' has too many items: maximum is {max}. Found {length} elements"
                    ),
                    path,
                    "Field has too many items",
                );
            }
        }

        for (index, item) in items.iter().enumerate() {
            let item_path = format!("{path}[{index}]");
            self.validate_value(item, element, &item_path, depth);
        }
    }

    fn validate_value(
        &mut self,
        value: &Value,
        element: &ElementDefinition,
        path: &str,
        depth: usize,
    ) {
        let type_code = match element.first_type_code() {
            Some(code) => code,
            None if value.is_null() || value.is_array() => "",
            None => {
                self.outcome.add_error(
                    IssueCode::Invalid,
                    format!("Element '{}' declares no type", element.element_id()),
                    path,
                    "No type declared",
                );
                return;
            }
        };

        match value {
            Value::Null => self.outcome.add_error(
                IssueCode::Invalid,
                format!("All children of '{path}' must be present"),
                path,
                "Field must be present",
            ),
            Value::Array(_) => self.outcome.add_error(
                IssueCode::Invalid,
                format!("Field '{path}' must be a single value"),
                path,
                "Field must be a single value",
            ),
            Value::Object(object) => self.validate_complex_type(object, type_code, path, depth),
            scalar => {
                if let Some(text) = scalar_text(scalar) {
                    self.validate_primitive(&text, type_code, path);
                }
            }
        }
    }

    fn validate_complex_type(
        &mut self,
        object: &Map<String, Value>,
        type_code: &str,
        path: &str,
        depth: usize,
    ) {
        let Ok(definition) = self.registry.resolve(type_code) else {
            self.outcome.add_error(
                IssueCode::Invalid,
                format!("No structure definition found for type '{type_code}'"),
                path,
                "No structure definition found",
            );
            return;
        };
        let Some(nested) = definition.as_structure_definition() else {
            self.outcome.add_error(
                IssueCode::Invalid,
                format!("Invalid structure definition for type '{type_code}'"),
                path,
                "Invalid structure definition",
            );
            return;
        };

        self.validate_at_depth(object, nested, path, depth + 1);
    }

    fn validate_primitive(&mut self, value: &str, type_code: &str, path: &str) {
        let type_code = normalize_type_code(type_code);

        let Ok(definition) = self.registry.resolve(type_code) else {
            self.outcome.add_error(
                IssueCode::Invalid,
                format!("No definition found for type '{type_code}'"),
                path,
                "No definition found",
            );
            return;
        };
        let Some(primitive) = definition.as_structure_definition() else {
            self.outcome.add_error(
                IssueCode::Invalid,
                format!("Invalid structure definition for type '{type_code}'"),
                path,
                "Invalid structure definition",
            );
            return;
        };
        let Some(value_element) = primitive.value_element() else {
            self.outcome.add_error(
                IssueCode::Invalid,
                format!("No value element found for '{path}'"),
                path,
                "No value element found",
            );
            return;
        };
        let Some(pattern) = value_pattern(value_element) else {
            self.outcome.add_error(
                IssueCode::Invalid,
                format!("No regex pattern found for '{path}'"),
                path,
                "No regex pattern found",
            );
            return;
        };

        match self.patterns.get(pattern) {
            Ok(regex) => {
                if !regex.is_match(value) {
                    self.outcome.add_error(
                        IssueCode::Invalid,
                        format!("Field '{path}' does not match the expected pattern: {pattern}"),
                        path,
                        "Field does not match the expected pattern",
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Pattern for type '{}' does not compile: {}", type_code, e);
                self.outcome.add_error(
                    IssueCode::Invalid,
                    format!("Invalid regex pattern '{pattern}' for '{path}'"),
                    path,
                    "Invalid regex pattern",
                );
            }
        }
    }

    /// Children of backbone containers are not validated yet.
    fn validate_backbone_element(&mut self, element: &ElementDefinition, parent_path: &str) {
        tracing::trace!(
            "Skipping backbone element {} under {}",
            element.path,
            parent_path
        );
    }

    /// Choice-type (`[x]`) elements are not validated yet.
    fn validate_choice_element(&mut self, element: &ElementDefinition, parent_path: &str) {
        tracing::trace!(
            "Skipping choice element {} under {}",
            element.path,
            parent_path
        );
    }

    /// Queues the constraints of the schema's own element for this node.
    fn gather_invariants(
        &mut self,
        data: &Map<String, Value>,
        schema: &StructureDefinition,
        path: &str,
    ) {
        let Some(root_element) = schema.root_element() else {
            return;
        };

        let mut local_data: Option<Value> = None;
        for constraint in &root_element.constraint {
            if self.config.is_skipped_constraint(&constraint.key)
                || self.invariants.contains(&constraint.key, path)
            {
                continue;
            }

            let data = local_data
                .get_or_insert_with(|| Value::Object(data.clone()))
                .clone();
            self.invariants.enqueue(InvariantJob {
                root_data: Arc::clone(&self.root_data),
                data,
                expression: constraint.expression.clone(),
                key: constraint.key.clone(),
                human: constraint.human.clone(),
                severity: constraint.severity.clone(),
                source: constraint.source.clone(),
                path: path.to_string(),
            });
        }
    }
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

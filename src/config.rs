use serde::{Deserialize, Serialize};

use crate::outcome::{InvariantCodeOverrides, IssueCode, default_code_overrides};

/// Base-model invariants that are not sent to the evaluator by default.
pub const DEFAULT_SKIPPED_CONSTRAINTS: &[&str] = &["ele-1", "txt-1", "txt-2"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Deepest complex-type nesting walked before the subtree is reported and skipped.
    pub max_depth: usize,
    pub skipped_constraint_keys: Vec<String>,
    pub invariant_code_overrides: InvariantCodeOverrides,
    pub pattern_cache_size: usize,
    pub max_concurrent_validations: usize,
    /// Replaces the built-in FHIR R4 resource type catalogue when set.
    pub resource_types: Option<Vec<String>>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            skipped_constraint_keys: DEFAULT_SKIPPED_CONSTRAINTS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            invariant_code_overrides: default_code_overrides(),
            pattern_cache_size: 256,
            max_concurrent_validations: num_cpus::get(),
            resource_types: None,
        }
    }
}

impl ValidatorConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_skipped_constraint_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped_constraint_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_code_override(mut self, key: impl Into<String>, code: IssueCode) -> Self {
        self.invariant_code_overrides.insert(key.into(), code);
        self
    }

    pub fn with_pattern_cache_size(mut self, size: usize) -> Self {
        self.pattern_cache_size = size;
        self
    }

    pub fn with_max_concurrent_validations(mut self, limit: usize) -> Self {
        self.max_concurrent_validations = limit;
        self
    }

    pub fn with_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_skipped_constraint(&self, key: &str) -> bool {
        self.skipped_constraint_keys.iter().any(|k| k == key)
    }
}

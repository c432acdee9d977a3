//! Outcome builder.
//!
//! An [`OperationOutcome`] is the append-only issue list of one validation run.
//! Structural issues are added during the walk; invariant failures are added by
//! [`finalize`] once the evaluator has answered.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EvaluatorError;
use crate::invariant::InvariantResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl IssueSeverity {
    /// Maps a constraint or evaluator severity string. Unknown values are
    /// treated as information.
    pub fn from_str_lossy(severity: &str) -> Self {
        match severity.to_ascii_lowercase().as_str() {
            "fatal" => Self::Fatal,
            "error" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Information,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Fatal | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    Invalid,
    Required,
    Invariant,
    Informational,
    Exception,
    TooCostly,
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            IssueCode::Invalid => "invalid",
            IssueCode::Required => "required",
            IssueCode::Invariant => "invariant",
            IssueCode::Informational => "informational",
            IssueCode::Exception => "exception",
            IssueCode::TooCostly => "too-costly",
        };
        f.write_str(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CodeableConcept {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: IssueCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diagnostics: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

impl Issue {
    /// Field path the issue refers to, if any.
    pub fn location(&self) -> Option<&str> {
        self.expression.first().map(String::as_str)
    }

    pub fn details_text(&self) -> Option<&str> {
        self.details.as_ref().and_then(|d| d.text.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(default)]
    pub issue: Vec<Issue>,
}

impl Default for OperationOutcome {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationOutcome {
    pub fn new() -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue: Vec::new(),
        }
    }

    /// Appends one issue. Empty `location` and `details` are omitted.
    pub fn add_issue(
        &mut self,
        code: IssueCode,
        diagnostics: impl Into<String>,
        location: &str,
        details: &str,
        severity: IssueSeverity,
    ) {
        self.issue.push(Issue {
            severity,
            code,
            details: (!details.is_empty()).then(|| CodeableConcept {
                text: Some(details.to_string()),
            }),
            diagnostics: diagnostics.into(),
            expression: if location.is_empty() {
                Vec::new()
            } else {
                vec![location.to_string()]
            },
        });
    }

    pub fn add_error(
        &mut self,
        code: IssueCode,
        diagnostics: impl Into<String>,
        location: &str,
        details: &str,
    ) {
        self.add_issue(code, diagnostics, location, details, IssueSeverity::Error);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issue
    }

    pub fn len(&self) -> usize {
        self.issue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issue.is_empty()
    }

    /// True when no issue has error or fatal severity.
    pub fn is_valid(&self) -> bool {
        !self.issue.iter().any(|i| i.severity.is_error())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issue.iter().filter(|i| i.severity.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_fatal(&self) -> bool {
        self.issue
            .iter()
            .any(|i| i.severity == IssueSeverity::Fatal)
    }

    pub fn issues_with_code(&self, code: IssueCode) -> impl Iterator<Item = &Issue> {
        self.issue.iter().filter(move |i| i.code == code)
    }
}

/// Issue codes assigned to specific invariant keys instead of `invariant`.
pub type InvariantCodeOverrides = HashMap<String, IssueCode>;

/// Default override table: `dom-6` (resources should have a narrative) is
/// reported as informational.
pub fn default_code_overrides() -> InvariantCodeOverrides {
    HashMap::from([("dom-6".to_string(), IssueCode::Informational)])
}

/// Appends invariant failures and, when nothing was recorded at all, the
/// "validation successful" entry.
pub fn finalize(
    outcome: &mut OperationOutcome,
    results: &[InvariantResult],
    overrides: &InvariantCodeOverrides,
) {
    for result in results.iter().filter(|r| !r.passed) {
        let diagnostics = match result.source.as_deref().filter(|s| !s.is_empty()) {
            Some(source) => format!("Failed constraint '{}' (source: {})", result.key, source),
            None => format!("Failed constraint '{}'", result.key),
        };
        let code = overrides
            .get(&result.key)
            .copied()
            .unwrap_or(IssueCode::Invariant);
        let details = format!("{}: {}", result.key, result.human);

        outcome.add_issue(
            code,
            diagnostics,
            &result.path,
            &details,
            IssueSeverity::from_str_lossy(&result.severity),
        );
    }

    if outcome.is_empty() {
        outcome.add_issue(
            IssueCode::Informational,
            "Validation successful",
            "",
            "",
            IssueSeverity::Information,
        );
    }
}

/// Records a failed evaluator call as a single fatal exception issue.
pub fn record_evaluator_failure(outcome: &mut OperationOutcome, error: &EvaluatorError) {
    outcome.add_issue(
        IssueCode::Exception,
        format!("Error validating constraint {error}"),
        "",
        "",
        IssueSeverity::Fatal,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(key: &str, source: Option<&str>) -> InvariantResult {
        InvariantResult {
            key: key.to_string(),
            path: "Patient".to_string(),
            passed: false,
            human: "human text".to_string(),
            severity: "error".to_string(),
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn empty_outcome_gets_success_issue() {
        let mut outcome = OperationOutcome::new();
        finalize(&mut outcome, &[], &default_code_overrides());

        assert_eq!(outcome.len(), 1);
        let issue = &outcome.issues()[0];
        assert_eq!(issue.severity, IssueSeverity::Information);
        assert_eq!(issue.diagnostics, "Validation successful");
        assert!(outcome.is_valid());
    }

    #[test]
    fn passed_results_do_not_add_issues() {
        let mut outcome = OperationOutcome::new();
        let mut result = failed("pat-1", None);
        result.passed = true;
        finalize(&mut outcome, &[result], &default_code_overrides());

        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.issues()[0].diagnostics, "Validation successful");
    }

    #[test]
    fn failed_invariants_cite_key_and_source() {
        let mut outcome = OperationOutcome::new();
        finalize(
            &mut outcome,
            &[
                failed("pat-1", None),
                failed("dom-3", Some("http://hl7.org/fhir/StructureDefinition/DomainResource")),
            ],
            &default_code_overrides(),
        );

        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.issues()[0].diagnostics, "Failed constraint 'pat-1'");
        assert_eq!(outcome.issues()[0].code, IssueCode::Invariant);
        assert_eq!(outcome.issues()[0].details_text(), Some("pat-1: human text"));
        assert_eq!(outcome.issues()[0].location(), Some("Patient"));
        assert_eq!(
            outcome.issues()[1].diagnostics,
            "Failed constraint 'dom-3' (source: http://hl7.org/fhir/StructureDefinition/DomainResource)"
        );
    }

    #[test]
    fn dom_6_is_downgraded_by_override_table() {
        let mut outcome = OperationOutcome::new();
        let mut result = failed("dom-6", None);
        result.severity = "warning".into();
        finalize(&mut outcome, &[result], &default_code_overrides());

        let issue = &outcome.issues()[0];
        assert_eq!(issue.code, IssueCode::Informational);
        assert_eq!(issue.severity, IssueSeverity::Warning);
        assert!(outcome.is_valid());
    }

    #[test]
    fn existing_issues_suppress_success_entry() {
        let mut outcome = OperationOutcome::new();
        outcome.add_error(IssueCode::Required, "Field 'Patient.name' is required", "Patient.name", "Field is required");
        finalize(&mut outcome, &[], &default_code_overrides());

        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.issues()[0].code, IssueCode::Required);
    }

    #[test]
    fn serializes_as_fhir_operation_outcome() {
        let mut outcome = OperationOutcome::new();
        outcome.add_error(IssueCode::TooCostly, "too deep", "Patient.contact", "");
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["resourceType"], "OperationOutcome");
        assert_eq!(json["issue"][0]["code"], "too-costly");
        assert_eq!(json["issue"][0]["severity"], "error");
        assert_eq!(json["issue"][0]["expression"][0], "Patient.contact");
        assert!(json["issue"][0].get("details").is_none());
    }
}

//! Boundary to the external invariant evaluator.
//!
//! The evaluator receives the whole job batch in one call and answers with a
//! result per job plus optional trace lists. Expression semantics live entirely
//! on the other side of this seam.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::collector::InvariantJob;
use crate::error::EvaluatorError;

#[async_trait]
pub trait InvariantEvaluator: Send + Sync {
    /// Evaluates a batch. A transport or decoding failure fails the whole batch.
    async fn evaluate(&self, jobs: &[InvariantJob]) -> Result<EvaluatorResponse, EvaluatorError>;
}

/// Outcome of one job. Evaluators may answer with only `key`, `path` and the
/// pass flag; the remaining fields are filled from the submitted job by
/// [`EvaluatorResponse::retain_submitted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawInvariantResult")]
pub struct InvariantResult {
    pub key: String,
    pub path: String,
    pub passed: bool,
    pub human: String,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl InvariantResult {
    fn fill_from(&mut self, job: &InvariantJob) {
        if self.human.is_empty() {
            self.human.clone_from(&job.human);
        }
        if self.severity.is_empty() {
            self.severity.clone_from(&job.severity);
        }
        if self.source.as_deref().is_none_or(str::is_empty) {
            self.source.clone_from(&job.source);
        }
    }
}

/// Wire shape of a result. The pass flag arrives as `passed` or `result`; a
/// null or missing flag counts as a failure.
#[derive(Deserialize)]
struct RawInvariantResult {
    key: String,
    path: String,
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    result: Option<bool>,
    #[serde(default)]
    human: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl From<RawInvariantResult> for InvariantResult {
    fn from(raw: RawInvariantResult) -> Self {
        Self {
            key: raw.key,
            path: raw.path,
            passed: raw.passed.or(raw.result).unwrap_or(false),
            human: raw.human.unwrap_or_default(),
            severity: raw.severity.unwrap_or_default(),
            source: raw.source,
        }
    }
}

/// Diagnostic lists reported by the evaluator. Never used for pass/fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EvaluationTrace {
    #[serde(default)]
    pub url: Vec<String>,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub unmatched: Vec<String>,
}

impl EvaluationTrace {
    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.ids.is_empty() && self.unmatched.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EvaluatorResponse {
    pub results: Vec<InvariantResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<EvaluationTrace>,
}

static RESULT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"Result:\s*").unwrap());

static TRACE_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)TRACE:\[(url|ids|unmatched)\]:?\s*\[\s*([\s\S]*?)\s*\]").unwrap()
});

impl EvaluatorResponse {
    pub fn new(results: Vec<InvariantResult>) -> Self {
        Self {
            results,
            trace: None,
        }
    }

    /// Decodes a JSON response: `{"results": [...], "trace": {...}}` or a bare
    /// array of results.
    pub fn from_json(value: Value) -> Result<Self, EvaluatorError> {
        if value.is_array() {
            return Ok(Self::new(serde_json::from_value(value)?));
        }
        if !value.get("results").is_some_and(Value::is_array) {
            return Err(EvaluatorError::malformed(
                "response has no recognizable result collection",
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Decodes raw evaluator output.
    ///
    /// The whole output may be a JSON response. Otherwise it must contain a
    /// `Result:` marker followed by a JSON array, and may contain
    /// `TRACE:[url]`, `TRACE:[ids]` and `TRACE:[unmatched]` list sections.
    pub fn from_output(output: &str) -> Result<Self, EvaluatorError> {
        if let Ok(value) = serde_json::from_str::<Value>(output.trim()) {
            return Self::from_json(value);
        }

        let marker = RESULT_MARKER
            .find(output)
            .ok_or_else(|| EvaluatorError::malformed("no 'Result' array found in output"))?;
        let mut stream =
            serde_json::Deserializer::from_str(&output[marker.end()..]).into_iter::<Value>();
        let results = match stream.next() {
            Some(Ok(value @ Value::Array(_))) => serde_json::from_value(value)?,
            Some(Ok(_)) => return Err(EvaluatorError::malformed("'Result' is not an array")),
            Some(Err(e)) => return Err(EvaluatorError::Serialization(e)),
            None => return Err(EvaluatorError::malformed("empty 'Result' section")),
        };

        let trace = parse_trace(output);
        Ok(Self {
            results,
            trace: (!trace.is_empty()).then_some(trace),
        })
    }

    /// Keeps only results that answer a submitted job, and fills human text,
    /// severity and source the evaluator left out from that job.
    pub fn retain_submitted(&mut self, jobs: &[InvariantJob]) {
        let submitted: HashMap<(&str, &str), &InvariantJob> =
            jobs.iter().map(|job| (job.dedup_key(), job)).collect();
        self.results.retain_mut(|result| {
            match submitted.get(&(result.key.as_str(), result.path.as_str())) {
                Some(job) => {
                    result.fill_from(job);
                    true
                }
                None => {
                    tracing::warn!(
                        "Discarding evaluator result '{}' at '{}' with no matching job",
                        result.key,
                        result.path
                    );
                    false
                }
            }
        });
    }

    pub fn failed(&self) -> impl Iterator<Item = &InvariantResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

fn parse_trace(output: &str) -> EvaluationTrace {
    let mut trace = EvaluationTrace::default();
    for captures in TRACE_SECTION.captures_iter(output) {
        let values = clean_values(&captures[2]);
        match &captures[1] {
            "url" => trace.url.extend(values),
            "ids" => trace.ids.extend(values),
            _ => trace.unmatched.extend(values),
        }
    }
    trace
}

fn clean_values(raw: &str) -> Vec<String> {
    raw.replace('\n', "")
        .split(',')
        .map(|v| v.trim().trim_matches(|c| c == '"' || c == '\\').to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

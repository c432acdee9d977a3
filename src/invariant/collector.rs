use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One invariant to be evaluated against the data visible at a node.
///
/// Field names follow the evaluator's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantJob {
    #[serde(rename = "rootData")]
    pub root_data: Arc<Value>,
    pub data: Value,
    #[serde(rename = "constraintExpression")]
    pub expression: String,
    #[serde(rename = "constraintKey")]
    pub key: String,
    #[serde(rename = "constraintHuman")]
    pub human: String,
    #[serde(rename = "constraintSeverity")]
    pub severity: String,
    #[serde(rename = "constraintSource", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "parentPath", alias = "path")]
    pub path: String,
}

impl InvariantJob {
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.key, &self.path)
    }
}

/// Run-scoped, order-preserving job queue deduplicated on `(key, path)`.
#[derive(Debug, Default)]
pub struct InvariantCollector {
    jobs: Vec<InvariantJob>,
    seen: HashSet<(String, String)>,
}

impl InvariantCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str, path: &str) -> bool {
        self.seen.contains(&(key.to_string(), path.to_string()))
    }

    /// Appends a job unless one with the same `(key, path)` is queued.
    /// Returns whether the job was added.
    pub fn enqueue(&mut self, job: InvariantJob) -> bool {
        if !self.seen.insert((job.key.clone(), job.path.clone())) {
            return false;
        }
        self.jobs.push(job);
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[InvariantJob] {
        &self.jobs
    }

    /// Consumes the collector, yielding the batch in enqueue order.
    pub fn drain(self) -> Vec<InvariantJob> {
        self.jobs
    }
}

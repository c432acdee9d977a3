use serde::{Deserialize, Serialize};

/// A declarative invariant attached to an element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Constraint {
    pub key: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub human: String,
    #[serde(default)]
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Constraint {
    pub fn new(
        key: impl Into<String>,
        severity: impl Into<String>,
        human: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            severity: severity.into(),
            human: human.into(),
            expression: expression.into(),
            xpath: None,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

use thiserror::Error;

/// Fatal conditions that stop a validation run before an outcome exists.
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("Resource type not found: 'resourceType' is missing or not a string")]
    MissingResourceType,

    #[error("Resource type '{resource_type}' not found in definitions")]
    UnknownRootSchema { resource_type: String },

    #[error("Definition for resource type '{resource_type}' is not a StructureDefinition")]
    InvalidRootSchema { resource_type: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Definition not found: {key}")]
    NotFound { key: String },

    #[error("Registry is sealed; cannot register '{key}' after the load phase")]
    Sealed { key: String },

    #[error("Load error: {message}")]
    Load { message: String },
}

impl RegistryError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }
}

/// Failures of the external invariant evaluator call.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Failed to start evaluator '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Evaluator IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Evaluator exited with status {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    #[error("Malformed evaluator response: {message}")]
    MalformedResponse { message: String },

    #[error("Evaluator timed out after {millis} ms")]
    Timeout { millis: u128 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvaluatorError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidatorError>;

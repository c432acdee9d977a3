//! Primitive format patterns.
//!
//! A primitive type's format comes from the `regex` extension on the type of
//! its synthetic `<type>.value` element. Compiled patterns are cached per
//! validator.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use regex::Regex;

use crate::types::{ElementDefinition, FHIRPATH_SYSTEM_STRING};

/// Used for string-like values whose definition carries no regex.
pub const DEFAULT_STRING_PATTERN: &str = r"[ \r\n\t\S]+";

/// Maps the FHIRPath system string type onto the FHIR `string` type.
pub fn normalize_type_code(code: &str) -> &str {
    if code == FHIRPATH_SYSTEM_STRING {
        "string"
    } else {
        code
    }
}

/// Pattern that applies to a primitive's value element, if any.
pub fn value_pattern(value_element: &ElementDefinition) -> Option<&str> {
    value_element.regex_pattern().or_else(|| {
        (value_element.fhir_type_hint() == Some("string")).then_some(DEFAULT_STRING_PATTERN)
    })
}

/// Renders a scalar JSON value the way it appears in the document.
pub fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// LRU cache of anchored, compiled patterns.
#[derive(Debug)]
pub struct PatternCache {
    compiled: Mutex<LruCache<String, Arc<Regex>>>,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            compiled: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns `pattern` compiled with anchors at both ends.
    pub fn get(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        let mut compiled = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = compiled.get(pattern) {
            return Ok(Arc::clone(regex));
        }

        let regex = Arc::new(Regex::new(&format!("^(?:{pattern})$"))?);
        compiled.put(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(256)
    }
}

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use octofhir_sdvalidator::*;

#[allow(dead_code)]
pub const CODE_PATTERN: &str = r"[^\s]+(\s[^\s]+)*";
#[allow(dead_code)]
pub const DATE_PATTERN: &str = r"([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1]))?)?";

/// A primitive type definition whose `.value` element carries `pattern`.
#[allow(dead_code)]
pub fn primitive(id: &str, pattern: Option<&str>) -> StructureDefinition {
    let mut value_type = ElementType::new(FHIRPATH_SYSTEM_STRING);
    match pattern {
        Some(pattern) => value_type = value_type.with_extension(Extension::regex(pattern)),
        None => value_type = value_type.with_extension(Extension::fhir_type("string")),
    }

    StructureDefinition::new(id, id)
        .with_kind("primitive-type")
        .with_element(ElementDefinition::new(id).with_cardinality(0, "*"))
        .with_element(
            ElementDefinition::new(format!("{id}.value"))
                .with_cardinality(0, "1")
                .with_type(value_type),
        )
}

#[allow(dead_code)]
pub fn element(path: &str, min: u32, max: &str, code: &str) -> ElementDefinition {
    ElementDefinition::new(path)
        .with_cardinality(min, max)
        .with_base(min, max)
        .with_type(ElementType::new(code))
}

#[allow(dead_code)]
pub fn ele1() -> Constraint {
    Constraint::new(
        "ele-1",
        "error",
        "All FHIR elements must have a @value or children",
        "hasValue() or (children().count() > id.count())",
    )
}

#[allow(dead_code)]
pub fn human_name() -> StructureDefinition {
    StructureDefinition::new("HumanName", "HumanName")
        .with_kind("complex-type")
        .with_element(
            ElementDefinition::new("HumanName")
                .with_cardinality(0, "*")
                .with_constraint(ele1()),
        )
        .with_element(element("HumanName.use", 0, "1", "code"))
        .with_element(element("HumanName.family", 0, "1", "string"))
        .with_element(element("HumanName.given", 0, "*", "string"))
}

/// Patient with a required `name`, a backbone `contact` and a `deceased[x]` choice.
#[allow(dead_code)]
pub fn patient() -> StructureDefinition {
    let root = ElementDefinition::new("Patient")
        .with_cardinality(0, "*")
        .with_constraint(
            Constraint::new(
                "dom-2",
                "error",
                "If the resource is contained in another resource, it SHALL NOT contain nested Resources",
                "contained.contained.empty()",
            )
            .with_source("http://hl7.org/fhir/StructureDefinition/DomainResource"),
        )
        .with_constraint(
            Constraint::new(
                "dom-6",
                "warning",
                "A resource should have narrative for robust management",
                "text.`div`.exists()",
            )
            .with_source("http://hl7.org/fhir/StructureDefinition/DomainResource"),
        )
        .with_constraint(ele1());

    StructureDefinition::new("Patient", "Patient")
        .with_url("http://hl7.org/fhir/StructureDefinition/Patient")
        .with_kind("resource")
        .with_element(root)
        .with_element(element("Patient.id", 0, "1", FHIRPATH_SYSTEM_STRING))
        .with_element(element("Patient.text", 0, "1", "Narrative"))
        .with_element(element("Patient.active", 0, "1", "boolean"))
        .with_element(element("Patient.name", 1, "*", "HumanName"))
        .with_element(element("Patient.gender", 0, "1", "code"))
        .with_element(element("Patient.birthDate", 0, "1", "date"))
        .with_element(element("Patient.deceased[x]", 0, "1", "boolean"))
        .with_element(element("Patient.contact", 0, "*", BACKBONE_ELEMENT_TYPE))
        .with_element(element("Patient.contact.name", 0, "1", "HumanName"))
        .with_element(element("Patient.contact.gender", 0, "1", "code"))
}

#[allow(dead_code)]
pub fn definitions() -> Vec<Definition> {
    vec![
        patient().into(),
        human_name().into(),
        primitive("string", None).into(),
        primitive("code", Some(CODE_PATTERN)).into(),
        primitive("date", Some(DATE_PATTERN)).into(),
        primitive("boolean", Some("true|false")).into(),
        primitive("integer", Some("-?([0]|([1-9][0-9]*))")).into(),
    ]
}

#[allow(dead_code)]
pub fn registry() -> Arc<DefinitionRegistry> {
    Arc::new(DefinitionRegistry::from_definitions(definitions()).unwrap())
}

#[allow(dead_code)]
pub fn validator() -> StructureValidator {
    StructureValidator::new(registry(), ValidatorConfig::default())
}

/// Answers every job with only key, path and pass flag, failing the keys it
/// was told to fail, and records each batch.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    failing: HashSet<String>,
    pub batches: Mutex<Vec<Vec<InvariantJob>>>,
}

#[allow(dead_code)]
impl ScriptedEvaluator {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn failing<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: keys.into_iter().map(Into::into).collect(),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl InvariantEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        jobs: &[InvariantJob],
    ) -> std::result::Result<EvaluatorResponse, EvaluatorError> {
        self.batches.lock().unwrap().push(jobs.to_vec());
        let results = jobs
            .iter()
            .map(|job| InvariantResult {
                key: job.key.clone(),
                path: job.path.clone(),
                passed: !self.failing.contains(&job.key),
                human: String::new(),
                severity: String::new(),
                source: None,
            })
            .collect();
        Ok(EvaluatorResponse::new(results))
    }
}

/// Always fails the call.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct BrokenEvaluator;

#[async_trait]
impl InvariantEvaluator for BrokenEvaluator {
    async fn evaluate(
        &self,
        _jobs: &[InvariantJob],
    ) -> std::result::Result<EvaluatorResponse, EvaluatorError> {
        Err(EvaluatorError::malformed("evaluator exited before answering"))
    }
}

mod common;

use std::sync::Arc;

use octofhir_sdvalidator::*;
use serde_json::{Value, json};

fn definitions_bundle() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [
            {
                "fullUrl": "http://hl7.org/fhir/StructureDefinition/Observation",
                "resource": {
                    "resourceType": "StructureDefinition",
                    "id": "Observation",
                    "url": "http://hl7.org/fhir/StructureDefinition/Observation",
                    "name": "Observation",
                    "version": "4.0.1",
                    "status": "draft",
                    "kind": "resource",
                    "abstract": false,
                    "type": "Observation",
                    "baseDefinition": "http://hl7.org/fhir/StructureDefinition/DomainResource",
                    "derivation": "specialization",
                    "snapshot": {
                        "element": [
                            {
                                "id": "Observation",
                                "path": "Observation",
                                "min": 0,
                                "max": "*",
                                "constraint": [
                                    {
                                        "key": "obs-6",
                                        "severity": "error",
                                        "human": "dataAbsentReason SHALL only be present if Observation.value[x] is not present",
                                        "expression": "dataAbsentReason.empty() or value.empty()",
                                        "xpath": "not(f:*[starts-with(local-name(.), 'value')])"
                                    },
                                    {
                                        "key": "ele-1",
                                        "severity": "error",
                                        "human": "All FHIR elements must have a @value or children",
                                        "expression": "hasValue() or (children().count() > id.count())",
                                        "source": "http://hl7.org/fhir/StructureDefinition/Element"
                                    }
                                ]
                            },
                            {
                                "id": "Observation.status",
                                "path": "Observation.status",
                                "short": "registered | preliminary | final | amended +",
                                "min": 1,
                                "max": "1",
                                "base": {"path": "Observation.status", "min": 1, "max": "1"},
                                "type": [{"code": "code"}]
                            },
                            {
                                "id": "Observation.category",
                                "path": "Observation.category",
                                "min": 0,
                                "max": "*",
                                "base": {"path": "Observation.category", "min": 0, "max": "*"},
                                "type": [{"code": "CodeableConcept"}]
                            },
                            {
                                "id": "Observation.value[x]",
                                "path": "Observation.value[x]",
                                "min": 0,
                                "max": "1",
                                "type": [{"code": "Quantity"}, {"code": "string"}]
                            },
                            {
                                "id": "Observation.component",
                                "path": "Observation.component",
                                "min": 0,
                                "max": "*",
                                "type": [{"code": "BackboneElement"}]
                            },
                            {
                                "id": "Observation.component.code",
                                "path": "Observation.component.code",
                                "min": 1,
                                "max": "1",
                                "type": [{"code": "CodeableConcept"}]
                            }
                        ]
                    }
                }
            },
            {
                "resource": {
                    "resourceType": "StructureDefinition",
                    "id": "CodeableConcept",
                    "url": "http://hl7.org/fhir/StructureDefinition/CodeableConcept",
                    "kind": "complex-type",
                    "type": "CodeableConcept",
                    "snapshot": {
                        "element": [
                            {"id": "CodeableConcept", "path": "CodeableConcept", "min": 0, "max": "*"},
                            {
                                "id": "CodeableConcept.text",
                                "path": "CodeableConcept.text",
                                "min": 0,
                                "max": "1",
                                "type": [{"code": "string"}]
                            }
                        ]
                    }
                }
            },
            {
                "resource": {
                    "resourceType": "StructureDefinition",
                    "id": "code",
                    "url": "http://hl7.org/fhir/StructureDefinition/code",
                    "kind": "primitive-type",
                    "type": "code",
                    "snapshot": {
                        "element": [
                            {"id": "code", "path": "code", "min": 0, "max": "*"},
                            {
                                "id": "code.value",
                                "path": "code.value",
                                "min": 0,
                                "max": "1",
                                "type": [{
                                    "extension": [{
                                        "url": "http://hl7.org/fhir/StructureDefinition/structuredefinition-fhir-type",
                                        "valueUrl": "string"
                                    }, {
                                        "url": "http://hl7.org/fhir/StructureDefinition/regex",
                                        "valueString": "[^\\s]+(\\s[^\\s]+)*"
                                    }],
                                    "code": "http://hl7.org/fhirpath/System.String"
                                }]
                            }
                        ]
                    }
                }
            },
            {
                "resource": {
                    "resourceType": "StructureDefinition",
                    "id": "string",
                    "url": "http://hl7.org/fhir/StructureDefinition/string",
                    "kind": "primitive-type",
                    "type": "string",
                    "snapshot": {
                        "element": [
                            {"id": "string", "path": "string", "min": 0, "max": "*"},
                            {
                                "id": "string.value",
                                "path": "string.value",
                                "min": 0,
                                "max": "1",
                                "type": [{
                                    "extension": [{
                                        "url": "http://hl7.org/fhir/StructureDefinition/structuredefinition-fhir-type",
                                        "valueUrl": "string"
                                    }],
                                    "code": "http://hl7.org/fhirpath/System.String"
                                }]
                            }
                        ]
                    }
                }
            },
            {
                "resource": {
                    "resourceType": "ValueSet",
                    "id": "observation-status",
                    "url": "http://hl7.org/fhir/ValueSet/observation-status",
                    "status": "active",
                    "compose": {"include": [{"system": "http://hl7.org/fhir/observation-status"}]}
                }
            },
            {
                "resource": {
                    "resourceType": "CodeSystem",
                    "id": "observation-status",
                    "url": "http://hl7.org/fhir/observation-status",
                    "content": "complete",
                    "concept": [{"code": "final", "display": "Final"}]
                }
            }
        ]
    })
}

async fn loaded_registry() -> DefinitionRegistry {
    let source = JsonSchemaSource::new().with_resource(definitions_bundle());
    DefinitionRegistry::from_source(&source).await.unwrap()
}

#[tokio::test]
async fn test_load_bundle_of_definitions() {
    let registry = loaded_registry().await;

    assert!(registry.is_sealed());
    assert_eq!(
        registry.stats(),
        RegistryStats {
            structure_definitions: 4,
            value_sets: 1,
            code_systems: 1,
        }
    );
    assert!(registry.structure_definition("Observation").is_some());
    assert!(registry.structure_definition("http://hl7.org/fhir/ValueSet/observation-status").is_none());
    assert!(
        registry
            .value_set("http://hl7.org/fhir/ValueSet/observation-status")
            .is_some()
    );
    assert!(
        registry
            .code_system("http://hl7.org/fhir/observation-status")
            .is_some()
    );
}

#[tokio::test]
async fn test_sealed_registry_rejects_registration() {
    let registry = loaded_registry().await;

    let err = registry.register(common::human_name()).unwrap_err();
    assert_eq!(
        err,
        RegistryError::Sealed {
            key: "HumanName".to_string()
        }
    );
    assert!(matches!(
        registry.resolve("HumanName"),
        Err(RegistryError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_extensions_are_keyed_by_url() {
    let extension = json!({
        "resourceType": "StructureDefinition",
        "id": "patient-birthPlace",
        "url": "http://hl7.org/fhir/StructureDefinition/patient-birthPlace",
        "kind": "complex-type",
        "type": "Extension",
        "snapshot": {"element": [{"id": "Extension", "path": "Extension"}]}
    });
    let base = json!({
        "resourceType": "StructureDefinition",
        "id": "Extension",
        "url": "http://hl7.org/fhir/StructureDefinition/Extension",
        "kind": "complex-type",
        "type": "Extension"
    });
    let source = JsonSchemaSource::new().with_resources([extension, base]);
    let registry = DefinitionRegistry::from_source(&source).await.unwrap();

    assert!(registry.contains("http://hl7.org/fhir/StructureDefinition/patient-birthPlace"));
    assert!(!registry.contains("patient-birthPlace"));
    assert!(registry.contains("Extension"));
}

#[tokio::test]
async fn test_unknown_definition_kind_fails_load() {
    let source = JsonSchemaSource::new().with_resource(json!({
        "resourceType": "SearchParameter",
        "id": "Patient-name",
        "url": "http://hl7.org/fhir/SearchParameter/Patient-name"
    }));

    let err = DefinitionRegistry::from_source(&source).await.unwrap_err();
    assert!(matches!(err, RegistryError::Load { .. }));
}

#[tokio::test]
async fn test_validate_against_loaded_definitions() {
    let validator =
        StructureValidator::new(Arc::new(loaded_registry().await), ValidatorConfig::default());

    let valid = validator
        .validate_resource(&json!({
            "resourceType": "Observation",
            "status": "final",
            "category": [{"text": "vital-signs"}],
            "valueString": "present",
            "component": [{"code": {}}]
        }))
        .await
        .unwrap();
    assert_eq!(valid.outcome.len(), 1);
    assert_eq!(valid.outcome.issues()[0].diagnostics, "Validation successful");
    assert_eq!(valid.jobs.len(), 1);
    assert_eq!(valid.jobs[0].key, "obs-6");

    let invalid = validator
        .validate_resource(&json!({
            "resourceType": "Observation",
            "status": "final",
            "category": {"text": "vital-signs"}
        }))
        .await
        .unwrap();
    let locations: Vec<_> = invalid
        .outcome
        .issues()
        .iter()
        .filter_map(Issue::location)
        .collect();
    assert_eq!(locations, vec!["Observation.category"]);

    let missing = validator
        .validate_resource(&json!({"resourceType": "Observation", "category": []}))
        .await
        .unwrap();
    assert_eq!(
        missing.outcome.issues()[0].diagnostics,
        "Field 'Observation.status' is required"
    );
}

#[tokio::test]
async fn test_shared_registry_across_validators() {
    let registry = Arc::new(loaded_registry().await);
    let strict = StructureValidator::new(Arc::clone(&registry), ValidatorConfig::default());
    let shallow = StructureValidator::new(
        Arc::clone(&registry),
        ValidatorConfig::default().with_max_depth(0),
    );

    let observation = json!({
        "resourceType": "Observation",
        "status": "final",
        "category": [{"text": ""}]
    });
    let strict_report = strict.validate_structure(&observation).unwrap();
    let shallow_report = shallow.validate_structure(&observation).unwrap();

    assert_eq!(
        strict_report.outcome.issues()[0].location(),
        Some("Observation.category[0].text")
    );
    assert_eq!(
        shallow_report.outcome.issues()[0].code,
        IssueCode::TooCostly
    );
}

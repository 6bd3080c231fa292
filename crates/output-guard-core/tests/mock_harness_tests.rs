//! Drives every injected fault class from the mock harness through the
//! pipeline and checks the outcome the recovery rules promise for it.

use chrono::NaiveDate;
use output_guard_core::mock::generate_value;
use output_guard_core::registry::order_request;
use output_guard_core::{
    generate, repair, ErrorKind, FaultKind, FieldConstraint, MockError, PipelineOptions, Schema,
    SchemaRegistry, Strategy, ValidationPipeline, ValidationResult,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn run(fault: Option<FaultKind>) -> ValidationResult {
    let schema = order_request().unwrap();
    ValidationPipeline::new(PipelineOptions {
        today: NaiveDate::from_ymd_opt(2024, 6, 1),
        ..PipelineOptions::default()
    })
    .run(&generate(&schema, fault).unwrap(), &schema)
}

#[test]
fn test_clean_response_is_valid() {
    let result = run(None);
    assert!(result.valid);
    assert!(result.warnings.is_empty());
    assert!(result.recovery_attempts.is_empty());
}

#[test]
fn test_malformed_json_is_unrecoverable() {
    let result = run(Some(FaultKind::MalformedJson));
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].constraint, ErrorKind::JsonSyntax);
    assert!(result.recovery_attempts.is_empty());
    assert!(result.final_output.is_none());
}

#[test]
fn test_truncated_order_is_not_repaired_into_inner_fragment() {
    let schema = order_request().unwrap();
    let text = generate(&schema, Some(FaultKind::MalformedJson)).unwrap();
    let outcome = repair(&text);
    assert!(!outcome.success);
    assert_eq!(outcome.value, None);
    assert!(outcome.attempts.iter().all(|a| !a.success));
}

#[test]
fn test_missing_identifier_is_not_invented() {
    let result = run(Some(FaultKind::MissingRequiredField));
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].field, "orderId");
    assert_eq!(result.errors[0].constraint, ErrorKind::Required);
    assert_eq!(result.recovery_attempts.len(), 1);
    assert_eq!(result.recovery_attempts[0].strategy, Strategy::DefaultFill);
    assert!(!result.recovery_attempts[0].success);
}

#[test]
fn test_stringified_amount_is_coerced() {
    let result = run(Some(FaultKind::WrongType));
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(result.recovery_attempts.len(), 1);
    assert_eq!(result.recovery_attempts[0].strategy, Strategy::PatternAutoCorrect);
    assert_eq!(result.final_output.unwrap()["totalAmount"], json!(49.98));
}

#[test]
fn test_numeric_identifier_is_coerced_and_reformatted() {
    let schema = Schema::new(
        "ids",
        vec![
            FieldConstraint::required("id"),
            FieldConstraint::pattern("id", r"^ORD-\d{6}$"),
        ],
    )
    .unwrap();
    let result = ValidationPipeline::default()
        .run(&generate(&schema, Some(FaultKind::WrongType)).unwrap(), &schema);

    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(result.recovery_attempts.len(), 1);
    assert!(result.recovery_attempts[0].success);
    assert_eq!(result.final_output, Some(json!({"id": "ORD-012345"})));
}

#[test]
fn test_extra_fields_only_warn() {
    let result = run(Some(FaultKind::ExtraFields));
    assert!(result.valid);
    let fields: Vec<&str> = result.warnings.iter().map(|w| w.field.as_str()).collect();
    assert_eq!(fields, vec!["unexpectedField", "_debug"]);

    let quiet = ValidationPipeline::new(PipelineOptions {
        warn_on_extra_fields: false,
        today: NaiveDate::from_ymd_opt(2024, 6, 1),
        ..PipelineOptions::default()
    });
    let schema = order_request().unwrap();
    let result = quiet.run(&generate(&schema, Some(FaultKind::ExtraFields)).unwrap(), &schema);
    assert!(result.valid);
    assert!(result.warnings.is_empty());
}

#[test]
fn test_garbage_identifier_fails_after_one_attempt() {
    let result = run(Some(FaultKind::InvalidValues));
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].field, "orderId");
    assert_eq!(result.errors[0].constraint, ErrorKind::Pattern);
    assert_eq!(result.errors[0].value, json!("???"));
    assert_eq!(result.recovery_attempts.len(), 1);
    assert!(!result.recovery_attempts[0].success);
}

#[test]
fn test_every_fault_yields_a_result() {
    let schema = order_request().unwrap();
    let pipeline = ValidationPipeline::default();
    for fault in FaultKind::ALL {
        let result = pipeline.run(&generate(&schema, Some(fault)).unwrap(), &schema);
        assert_eq!(result.valid, result.errors.is_empty(), "fault {:?}", fault);
        assert_eq!(result.metadata["schema"], json!("order_request"));
    }
}

// ── Custom schemas ──────────────────────────────────────────────────────────

#[test]
fn test_harness_works_for_json_defined_schemas() {
    let mut registry = SchemaRegistry::new();
    let text = json!({
        "name": "ticket",
        "constraints": [
            {"path": "ticketId", "kind": {"type": "required"}},
            {"path": "ticketId", "kind": {"type": "pattern", "regex": "TCK-\\d{4}"}},
            {"path": "priority", "kind": {"type": "one_of", "values": ["LOW", "HIGH"]}},
            {"path": "priority", "kind": {"type": "required"}, "default": "LOW"},
            {"path": "estimate", "kind": {"type": "range", "min": 1, "max": 39}}
        ]
    })
    .to_string();
    let schema: Schema = registry.register_json(&text).unwrap().clone();

    let doc = generate_value(&schema, None).unwrap();
    assert_eq!(doc, json!({"ticketId": "TCK-0001", "priority": "LOW", "estimate": 20}));

    let pipeline = ValidationPipeline::default();
    let result = pipeline.run(&generate(&schema, Some(FaultKind::InvalidValues)).unwrap(), &schema);
    assert!(!result.valid);
    assert_eq!(result.errors[0].field, "ticketId");

    let payload = generate(&schema, Some(FaultKind::MissingRequiredField)).unwrap();
    let result = pipeline.run(&payload, &schema);
    assert_eq!(result.errors[0].field, "ticketId");
}

#[test]
fn test_fractional_and_email_fields_generate_valid_payloads() {
    let schema = Schema::new(
        "survey",
        vec![
            FieldConstraint::required("ratio"),
            FieldConstraint::range("ratio", Some(0.1), Some(0.9)),
            FieldConstraint::required("email"),
            FieldConstraint::pattern("email", r"^[a-z.]+@[a-z]+\.[a-z]{2,}$"),
        ],
    )
    .unwrap();
    let result = ValidationPipeline::default().run(&generate(&schema, None).unwrap(), &schema);
    assert!(result.valid, "{:?}", result.errors);
    assert!(result.recovery_attempts.is_empty());
}

#[test]
fn test_pattern_without_example_is_reported() {
    let plate = FieldConstraint::pattern("plate", r"^[A-Z]{2}-\d{3}-[A-Z]$");
    let schema = Schema::new("plates", vec![plate]).unwrap();
    let err = generate(&schema, None).unwrap_err();
    assert!(matches!(err, MockError::MissingExample { ref path, .. } if path == "plate"));
}

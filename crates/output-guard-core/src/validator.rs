//! Constraint validation. Checks a parsed candidate against a [`Schema`].
//!
//! Constraints are evaluated in declaration order and violations are
//! reported in that same order, so results are stable across runs. Nothing
//! here panics or returns an error for bad data: a value of the wrong JSON
//! type is itself reported as a violation with constraint id `type`.
//!
//! Advisory checks (typical ranges, undeclared fields) are kept apart in
//! [`ConstraintValidator::advise`] and never block a run.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;

use crate::catalog::{json_type_name, parse_iso_date, ErrorKind, ExpectedType};
use crate::path::{join_path, resolve, split_path};
use crate::result::{ValidationError, ValidationWarning};
use crate::schema::{ConstraintKind, FieldConstraint, Schema};

const TYPICAL_RANGE_MESSAGE: &str =
    "{field} value {value} is outside the typical range [{min}, {max}]";

/// Checks candidate values against one schema.
pub struct ConstraintValidator<'s> {
    schema: &'s Schema,
    today: NaiveDate,
}

/// Shared state for one traversal.
struct Pass {
    errors: Vec<ValidationError>,
    /// Fields that already have a `type` violation; reported once each.
    mistyped: HashSet<String>,
}

impl<'s> ConstraintValidator<'s> {
    pub fn new(schema: &'s Schema, today: NaiveDate) -> Self {
        Self { schema, today }
    }

    /// Validate `value`; an empty result means every constraint holds.
    pub fn validate(&self, value: &Value) -> Vec<ValidationError> {
        let mut pass = Pass {
            errors: Vec::new(),
            mistyped: HashSet::new(),
        };
        self.validate_set(value, self.schema.constraints(), "", &mut pass);
        pass.errors
    }

    /// Violations of a single constraint applied at the concrete field path
    /// `field`, with `candidate` standing in for the current value there.
    ///
    /// Used by recovery to decide whether a proposed value resolves an error.
    pub fn check_field(
        &self,
        candidate: Option<&Value>,
        constraint: &FieldConstraint,
        field: &str,
    ) -> Vec<ValidationError> {
        let mut pass = Pass {
            errors: Vec::new(),
            mistyped: HashSet::new(),
        };
        self.check_value(candidate, constraint, field, &mut pass);
        pass.errors
    }

    /// Violations reported on `field` itself by every constraint that
    /// applies there, with `candidate` standing in for its value.
    ///
    /// An element path of a `nested many` array (`items.0`) is checked as
    /// one element, so only its object shape matters at that level.
    pub fn check_at(&self, candidate: Option<&Value>, field: &str) -> Vec<ValidationError> {
        let element = split_path(field)
            .last()
            .is_some_and(|s| s.parse::<usize>().is_ok());
        let mut pass = Pass {
            errors: Vec::new(),
            mistyped: HashSet::new(),
        };
        for c in self.schema.constraints_at(field) {
            match (&c.kind, candidate) {
                (ConstraintKind::Nested { constraints, many: true }, Some(item)) if element => {
                    self.check_nested_object(item, constraints, field, &mut pass)
                }
                _ => self.check_value(candidate, c, field, &mut pass),
            }
        }
        pass.errors.retain(|e| e.field == field);
        pass.errors
    }

    fn validate_set(
        &self,
        value: &Value,
        constraints: &[FieldConstraint],
        prefix: &str,
        pass: &mut Pass,
    ) {
        for constraint in constraints {
            let field = join_path(prefix, &constraint.path);
            let resolved = resolve(value, &constraint.path);
            self.check_value(resolved, constraint, &field, pass);
        }
    }

    fn check_value(
        &self,
        resolved: Option<&Value>,
        c: &FieldConstraint,
        field: &str,
        pass: &mut Pass,
    ) {
        let present = resolved.filter(|v| !v.is_null());

        let Some(value) = present else {
            if matches!(c.kind, ConstraintKind::Required) {
                pass.errors.push(ValidationError {
                    field: field.to_string(),
                    message: c.render_message(field, None, ErrorKind::Required.default_message()),
                    value: Value::Null,
                    constraint: ErrorKind::Required,
                });
            }
            return;
        };

        match &c.kind {
            ConstraintKind::Required => {
                if value.as_str().is_some_and(|s| s.trim().is_empty()) {
                    pass.errors.push(ValidationError {
                        field: field.to_string(),
                        message: c.render_message(field, Some(value), "must not be blank"),
                        value: value.clone(),
                        constraint: ErrorKind::Required,
                    });
                }
            }
            ConstraintKind::Pattern { regex } => {
                let Some(s) = self.expect_str(value, field, pass) else {
                    return;
                };
                let matched = match self.schema.regex(regex) {
                    Some(re) => re.is_match(s),
                    None => {
                        tracing::warn!(
                            field,
                            pattern = %regex,
                            "pattern missing from schema cache"
                        );
                        true
                    }
                };
                if !matched {
                    self.violation(c, field, value, ErrorKind::Pattern, pass);
                }
            }
            ConstraintKind::Range { min, max } => {
                let Some(n) = value.as_f64() else {
                    self.type_error(field, value, ExpectedType::Number, pass);
                    return;
                };
                if !within(n, *min, *max) {
                    self.violation(c, field, value, ErrorKind::Range, pass);
                }
            }
            ConstraintKind::Size { min, max } => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(a) => a.len(),
                    Value::Object(o) => o.len(),
                    _ => {
                        self.type_error(field, value, ExpectedType::String, pass);
                        return;
                    }
                };
                if min.is_some_and(|m| len < m) || max.is_some_and(|m| len > m) {
                    self.violation(c, field, value, ErrorKind::Size, pass);
                }
            }
            ConstraintKind::OneOf { values } => {
                let Some(s) = self.expect_str(value, field, pass) else {
                    return;
                };
                if !values.iter().any(|v| v == s) {
                    let fallback = format!("{{field}} must be one of [{}]", values.join(", "));
                    pass.errors.push(ValidationError {
                        field: field.to_string(),
                        message: c.render_message(field, Some(value), &fallback),
                        value: value.clone(),
                        constraint: ErrorKind::OneOf,
                    });
                }
            }
            ConstraintKind::PastOrPresent => {
                let Some(s) = self.expect_str(value, field, pass) else {
                    return;
                };
                match parse_iso_date(s) {
                    Some(date) if date <= self.today => {}
                    Some(_) => self.violation(c, field, value, ErrorKind::PastOrPresent, pass),
                    None => pass.errors.push(ValidationError {
                        field: field.to_string(),
                        message: c.render_message(
                            field,
                            Some(value),
                            "{field} must be an ISO-8601 date",
                        ),
                        value: value.clone(),
                        constraint: ErrorKind::PastOrPresent,
                    }),
                }
            }
            ConstraintKind::Nested { constraints, many } => {
                if *many {
                    let Some(items) = value.as_array() else {
                        self.type_error(field, value, ExpectedType::Array, pass);
                        return;
                    };
                    for (i, item) in items.iter().enumerate() {
                        let item_path = join_path(field, &i.to_string());
                        self.check_nested_object(item, constraints, &item_path, pass);
                    }
                } else {
                    self.check_nested_object(value, constraints, field, pass);
                }
            }
            ConstraintKind::Typical { .. } => {}
        }
    }

    fn check_nested_object(
        &self,
        value: &Value,
        constraints: &[FieldConstraint],
        field: &str,
        pass: &mut Pass,
    ) {
        if !value.is_object() {
            self.type_error(field, value, ExpectedType::Object, pass);
            return;
        }
        self.validate_set(value, constraints, field, pass);
    }

    fn expect_str<'v>(&self, value: &'v Value, field: &str, pass: &mut Pass) -> Option<&'v str> {
        let s = value.as_str();
        if s.is_none() {
            self.type_error(field, value, ExpectedType::String, pass);
        }
        s
    }

    fn violation(
        &self,
        c: &FieldConstraint,
        field: &str,
        value: &Value,
        kind: ErrorKind,
        pass: &mut Pass,
    ) {
        pass.errors.push(ValidationError {
            field: field.to_string(),
            message: c.render_message(field, Some(value), kind.default_message()),
            value: value.clone(),
            constraint: kind,
        });
    }

    fn type_error(&self, field: &str, value: &Value, expected: ExpectedType, pass: &mut Pass) {
        if !pass.mistyped.insert(field.to_string()) {
            return;
        }
        pass.errors.push(ValidationError {
            field: field.to_string(),
            message: format!("expected {}, got {}", expected.name(), json_type_name(value)),
            value: value.clone(),
            constraint: ErrorKind::Type,
        });
    }

    // -----------------------------------------------------------------------
    // Advisory checks
    // -----------------------------------------------------------------------

    /// Non-blocking warnings: values outside `typical` ranges and, when
    /// `extra_fields` is set, object keys no constraint declares.
    pub fn advise(&self, value: &Value, extra_fields: bool) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        self.advise_set(value, self.schema.constraints(), "", extra_fields, &mut warnings);
        warnings
    }

    fn advise_set(
        &self,
        value: &Value,
        constraints: &[FieldConstraint],
        prefix: &str,
        extra_fields: bool,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        if extra_fields {
            if let Some(obj) = value.as_object() {
                let declared: HashSet<&str> = constraints
                    .iter()
                    .filter_map(|c| split_path(&c.path).first().copied())
                    .collect();
                for key in obj.keys().filter(|k| !declared.contains(k.as_str())) {
                    warnings.push(ValidationWarning {
                        field: join_path(prefix, key),
                        message: format!("unexpected field '{}' is not part of the schema", key),
                        suggestion: "remove the field or declare it in the schema".to_string(),
                    });
                }
            }
        }

        for c in constraints {
            let field = join_path(prefix, &c.path);
            let Some(resolved) = resolve(value, &c.path) else {
                continue;
            };
            match &c.kind {
                ConstraintKind::Typical { min, max } => {
                    if let Some(n) = resolved.as_f64() {
                        if !within(n, *min, *max) {
                            warnings.push(ValidationWarning {
                                message: c.render_message(
                                    &field,
                                    Some(resolved),
                                    TYPICAL_RANGE_MESSAGE,
                                ),
                                field,
                                suggestion: "double-check the value with the source".to_string(),
                            });
                        }
                    }
                }
                ConstraintKind::Nested { constraints: inner, many: true } => {
                    for (i, item) in resolved.as_array().into_iter().flatten().enumerate() {
                        let item_path = join_path(&field, &i.to_string());
                        self.advise_set(item, inner, &item_path, extra_fields, warnings);
                    }
                }
                ConstraintKind::Nested { constraints: inner, many: false } => {
                    self.advise_set(resolved, inner, &field, extra_fields, warnings);
                }
                _ => {}
            }
        }
    }
}

fn within(n: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn schema() -> Schema {
        Schema::new(
            "test",
            vec![
                FieldConstraint::required("id"),
                FieldConstraint::pattern("id", r"ORD-\d{6}"),
                FieldConstraint::range("total", Some(0.01), Some(100.0)),
                FieldConstraint::typical("total", Some(1.0), Some(50.0)),
                FieldConstraint::size("name", Some(2), Some(5)),
                FieldConstraint::one_of("status", ["NEW", "DONE"]),
                FieldConstraint::past_or_present("date"),
                FieldConstraint::nested(
                    "items",
                    vec![
                        FieldConstraint::required("sku"),
                        FieldConstraint::range("qty", Some(1.0), Some(10.0)),
                    ],
                    true,
                ),
            ],
        )
        .unwrap()
    }

    fn kinds(errors: &[ValidationError]) -> Vec<(&str, ErrorKind)> {
        errors.iter().map(|e| (e.field.as_str(), e.constraint)).collect()
    }

    #[test]
    fn test_valid_value_has_no_errors() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let data = json!({
            "id": "ORD-123456", "total": 100.0, "name": "abc", "status": "NEW",
            "date": "2024-06-01", "items": [{"sku": "A", "qty": 1}]
        });
        assert_eq!(v.validate(&data), Vec::new());
    }

    #[test]
    fn test_optional_constraints_skip_missing_fields() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let errors = v.validate(&json!({"id": "ORD-123456"}));
        assert_eq!(errors, Vec::new());
    }

    #[test]
    fn test_violations_reported_in_declaration_order() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let data = json!({
            "id": "ORDER1", "total": 0, "name": "toolong", "status": "new",
            "date": "2030-01-01", "items": [{"qty": 11}]
        });
        assert_eq!(
            kinds(&v.validate(&data)),
            vec![
                ("id", ErrorKind::Pattern),
                ("total", ErrorKind::Range),
                ("name", ErrorKind::Size),
                ("status", ErrorKind::OneOf),
                ("date", ErrorKind::PastOrPresent),
                ("items.0.sku", ErrorKind::Required),
                ("items.0.qty", ErrorKind::Range),
            ]
        );
    }

    #[test]
    fn test_missing_and_blank_required() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let missing = v.validate(&json!({}));
        assert_eq!(missing[0].message, "field required");
        assert_eq!(missing[0].value, Value::Null);
        let blank = v.validate(&json!({"id": "  "}));
        assert_eq!(kinds(&blank), vec![("id", ErrorKind::Required), ("id", ErrorKind::Pattern)]);
    }

    #[test]
    fn test_type_mismatch_reported_once_per_field() {
        let schema = Schema::new(
            "t",
            vec![
                FieldConstraint::size("code", Some(1), Some(3)),
                FieldConstraint::pattern("code", "[A-Z]+"),
                FieldConstraint::range("qty", None, None),
            ],
        )
        .unwrap();
        let v = ConstraintValidator::new(&schema, today());
        let errors = v.validate(&json!({"code": 12, "qty": "5"}));
        assert_eq!(kinds(&errors), vec![("code", ErrorKind::Type), ("qty", ErrorKind::Type)]);
        assert_eq!(errors[1].message, "expected number, got string");
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        assert!(v.validate(&json!({"id": "ORD-000001", "total": 0.01})).is_empty());
        assert!(v.validate(&json!({"id": "ORD-000001", "total": 100})).is_empty());
        assert_eq!(v.validate(&json!({"id": "ORD-000001", "total": 100.5})).len(), 1);
    }

    #[test]
    fn test_nested_many_requires_array_of_objects() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let errors = v.validate(&json!({"id": "ORD-000001", "items": {"sku": "A"}}));
        assert_eq!(kinds(&errors), vec![("items", ErrorKind::Type)]);
        let errors = v.validate(&json!({"id": "ORD-000001", "items": ["A"]}));
        assert_eq!(kinds(&errors), vec![("items.0", ErrorKind::Type)]);
    }

    #[test]
    fn test_unparseable_date() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let errors = v.validate(&json!({"id": "ORD-000001", "date": "last week"}));
        assert_eq!(errors[0].constraint, ErrorKind::PastOrPresent);
        assert_eq!(errors[0].message, "date must be an ISO-8601 date");
    }

    #[test]
    fn test_check_field_single_constraint() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let c = schema.find_constraint("items.0.qty", ErrorKind::Range).unwrap();
        assert!(v.check_field(Some(&json!(3)), c, "items.0.qty").is_empty());
        assert_eq!(v.check_field(Some(&json!(30)), c, "items.0.qty")[0].field, "items.0.qty");
    }

    #[test]
    fn test_advise_typical_and_extra_fields() {
        let schema = schema();
        let v = ConstraintValidator::new(&schema, today());
        let data = json!({
            "id": "ORD-000001",
            "total": 99,
            "debug": true,
            "items": [{"sku": "A", "color": "red"}]
        });
        let warnings = v.advise(&data, true);
        let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["debug", "total", "items.0.color"]);
        assert!(v.advise(&data, false).iter().all(|w| w.field == "total"));
        assert!(v.validate(&data).is_empty(), "advisories never become errors");
    }
}

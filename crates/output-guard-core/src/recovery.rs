//! Recovery engine: ordered strategies that try to resolve violations.
//!
//! For every error the strategies below are tried in this fixed order,
//! skipping the ones that do not apply, until one succeeds:
//!
//! | Strategy | Applies when | Effect |
//! |----------|--------------|--------|
//! | `pattern_auto_correct` | the error is not `required` | reformat the value |
//! | `default_fill` | a required value is missing | write the declared default |
//! | `partial_accept` | the constraint is non-critical | demote the error to a warning |
//!
//! Auto-correct covers IDs, emails, dates, enum case and JSON type.
//!
//! Each tried strategy leaves one [`RecoveryAttempt`], failed ones included,
//! so every violation that reaches recovery has at least one attempt.
//! Corrections are only accepted after re-checking them against the
//! violated constraint. A type coercion is re-checked against every
//! constraint on its field and may be reformatted in the same attempt.
//! Numeric or free-text business data (amounts, quantities, names) is never
//! rewritten.

use chrono::NaiveDate;
use serde_json::Value;

use crate::catalog::{
    coerce_type, correct_email, correct_id, id_pattern, json_type_name, match_choice,
    normalize_date, ErrorKind, ExpectedType, Strategy,
};
use crate::config::RecoveryOptions;
use crate::path::{resolve, set, split_path};
use crate::result::{RecoveryAttempt, ValidationError, ValidationWarning};
use crate::schema::{ConstraintKind, FieldConstraint, Schema};
use crate::validator::ConstraintValidator;

/// What recovery did to a candidate value.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// The candidate after every successful correction was applied.
    pub value: Value,
    /// One entry per strategy tried, in order.
    pub attempts: Vec<RecoveryAttempt>,
    /// Warnings raised by default-fill and partial-accept.
    pub warnings: Vec<ValidationWarning>,
    /// Violations demoted to warnings by partial-accept.
    pub accepted: Vec<ValidationError>,
    /// Violations no strategy resolved.
    pub unresolved: Vec<ValidationError>,
}

/// Applies recovery strategies for one schema.
pub struct RecoveryEngine<'s> {
    schema: &'s Schema,
    validator: ConstraintValidator<'s>,
    options: RecoveryOptions,
    today: NaiveDate,
}

impl<'s> RecoveryEngine<'s> {
    pub fn new(schema: &'s Schema, options: RecoveryOptions, today: NaiveDate) -> Self {
        Self {
            schema,
            validator: ConstraintValidator::new(schema, today),
            options,
            today,
        }
    }

    /// Try to resolve `errors` on `value`.
    pub fn recover(&self, mut value: Value, errors: &[ValidationError]) -> RecoveryOutcome {
        let mut outcome = RecoveryOutcome {
            value: Value::Null,
            attempts: Vec::new(),
            warnings: Vec::new(),
            accepted: Vec::new(),
            unresolved: Vec::new(),
        };

        for error in errors {
            let Some(constraint) = self.schema.find_constraint(&error.field, error.constraint)
            else {
                tracing::debug!(
                    field = %error.field,
                    constraint = %error.constraint,
                    "no constraint found for error"
                );
                outcome.attempts.push(RecoveryAttempt {
                    strategy: Strategy::PatternAutoCorrect,
                    success: false,
                    description: format!("{}: no constraint declares this field", error.field),
                    result: None,
                });
                outcome.unresolved.push(error.clone());
                continue;
            };

            // An earlier correction may already have fixed this one.
            if self.resolves(resolve(&value, &error.field), constraint, error) {
                tracing::debug!(
                    field = %error.field,
                    "error already resolved by an earlier correction"
                );
                continue;
            }

            if !self.recover_one(&mut value, error, constraint, &mut outcome) {
                outcome.unresolved.push(error.clone());
            }
        }

        outcome.value = value;
        outcome
    }

    /// Run the strategy chain for one error. Returns whether it was resolved.
    fn recover_one(
        &self,
        value: &mut Value,
        error: &ValidationError,
        constraint: &FieldConstraint,
        outcome: &mut RecoveryOutcome,
    ) -> bool {
        let current = resolve(value, &error.field).cloned();
        let missing = match &current {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };

        // 1. pattern auto-correct
        if error.constraint != ErrorKind::Required {
            let attempt = match current.as_ref() {
                Some(current) if !missing => self.auto_correct(value, current, constraint, error),
                _ => RecoveryAttempt {
                    strategy: Strategy::PatternAutoCorrect,
                    success: false,
                    description: format!("{}: value is blank; nothing to reformat", error.field),
                    result: None,
                },
            };
            let success = attempt.success;
            tracing::debug!(field = %error.field, success, "pattern auto-correct");
            outcome.attempts.push(attempt);
            if success {
                return true;
            }
        }

        // 2. default fill
        if missing && error.constraint == ErrorKind::Required {
            let mut filled = None;
            if let Some(d) = &constraint.default {
                if set(value, &error.field, d.clone()) {
                    filled = Some(d);
                }
            }
            let success = filled.is_some();
            outcome.attempts.push(RecoveryAttempt {
                strategy: Strategy::DefaultFill,
                success,
                description: match filled {
                    Some(d) => format!("{}: missing; filled with default {}", error.field, d),
                    None => format!("{}: missing and no default is configured", error.field),
                },
                result: filled.cloned(),
            });
            tracing::debug!(field = %error.field, success, "default fill");
            if let Some(d) = filled {
                outcome.warnings.push(ValidationWarning {
                    field: error.field.clone(),
                    message: format!("field was missing; default {} applied", d),
                    suggestion: ErrorKind::Required.suggestion().to_string(),
                });
                return true;
            }
        }

        // 3. partial accept
        if !constraint.critical && self.options.partial_accept {
            outcome.attempts.push(RecoveryAttempt {
                strategy: Strategy::PartialAccept,
                success: true,
                description: format!(
                    "{}: non-critical violation kept as-is ({})",
                    error.field, error.message
                ),
                result: Some(resolve(value, &error.field).cloned().unwrap_or(Value::Null)),
            });
            outcome.warnings.push(ValidationWarning {
                field: error.field.clone(),
                message: error.message.clone(),
                suggestion: error.constraint.suggestion().to_string(),
            });
            outcome.accepted.push(error.clone());
            tracing::debug!(field = %error.field, "partial accept");
            return true;
        }

        false
    }

    fn auto_correct(
        &self,
        value: &mut Value,
        current: &Value,
        constraint: &FieldConstraint,
        error: &ValidationError,
    ) -> RecoveryAttempt {
        let failed = |description: String| RecoveryAttempt {
            strategy: Strategy::PatternAutoCorrect,
            success: false,
            description,
            result: None,
        };

        let candidate = match self.propose(current, constraint, error) {
            Ok(candidate) => candidate,
            Err(reason) => return failed(format!("{}: {}", error.field, reason)),
        };
        let (candidate, remaining) = if error.constraint == ErrorKind::Type {
            let candidate = self.refine(candidate, &error.field);
            let remaining = self
                .validator
                .check_at(Some(&candidate), &error.field)
                .first()
                .map(|e| e.constraint);
            (candidate, remaining)
        } else if self.resolves(Some(&candidate), constraint, error) {
            (candidate, None)
        } else {
            (candidate, Some(error.constraint))
        };
        if let Some(kind) = remaining {
            return failed(format!(
                "{}: correction {} still violates {}",
                error.field, candidate, kind
            ));
        }
        if !set(value, &error.field, candidate.clone()) {
            return failed(format!("{}: corrected value could not be written back", error.field));
        }
        RecoveryAttempt {
            strategy: Strategy::PatternAutoCorrect,
            success: true,
            description: format!("{}: reformatted {} to {}", error.field, current, candidate),
            result: Some(candidate),
        }
    }

    /// Whether `candidate` no longer shows the error's kind of violation.
    fn resolves(
        &self,
        candidate: Option<&Value>,
        constraint: &FieldConstraint,
        error: &ValidationError,
    ) -> bool {
        if error.constraint == ErrorKind::Type {
            return self
                .validator
                .check_at(candidate, &error.field)
                .iter()
                .all(|e| e.constraint != ErrorKind::Type);
        }
        self.validator
            .check_field(candidate, constraint, &error.field)
            .iter()
            .all(|e| e.field != error.field || e.constraint != error.constraint)
    }

    /// Reformat a type-coerced value for the other constraints on `field`
    /// it still violates. Corrections that do not resolve are dropped.
    fn refine(&self, mut candidate: Value, field: &str) -> Value {
        for error in self.validator.check_at(Some(&candidate), field) {
            if error.constraint == ErrorKind::Type {
                continue;
            }
            let Some(constraint) = self.schema.find_constraint(field, error.constraint) else {
                continue;
            };
            if let Ok(fixed) = self.propose(&candidate, constraint, &error) {
                if self.resolves(Some(&fixed), constraint, &error) {
                    candidate = fixed;
                }
            }
        }
        candidate
    }

    /// Propose a reformatted value, or explain why none exists.
    fn propose(
        &self,
        current: &Value,
        constraint: &FieldConstraint,
        error: &ValidationError,
    ) -> Result<Value, String> {
        match (&constraint.kind, error.constraint) {
            (_, ErrorKind::Type) => {
                let expected = self.expected_type(&error.field);
                coerce_type(current, expected).ok_or_else(|| {
                    format!(
                        "no lossless conversion from {} to {}",
                        json_type_name(current),
                        expected.name()
                    )
                })
            }
            (ConstraintKind::Pattern { regex }, ErrorKind::Pattern) => {
                let s = current.as_str().unwrap_or_default();
                self.pattern_candidates(s, regex)
                    .into_iter()
                    .find(|c| self.schema.regex(regex).is_some_and(|re| re.is_match(c)))
                    .map(Value::String)
                    .ok_or_else(|| format!("no format correction matches pattern {}", regex))
            }
            (ConstraintKind::PastOrPresent, ErrorKind::PastOrPresent) => {
                let s = current.as_str().unwrap_or_default();
                normalize_date(s, self.today, self.options.clamp_future_dates)
                    .map(Value::String)
                    .ok_or_else(|| format!("'{}' is not a recognisable date", s))
            }
            (ConstraintKind::OneOf { values }, ErrorKind::OneOf) => {
                let s = current.as_str().unwrap_or_default();
                match_choice(s, values)
                    .map(|v| Value::String(v.to_string()))
                    .ok_or_else(|| format!("'{}' does not match any allowed value", s))
            }
            (_, kind) => Err(format!("{} violations are never auto-corrected", kind)),
        }
    }

    fn pattern_candidates(&self, s: &str, regex: &str) -> Vec<String> {
        let trimmed = s.trim();
        let mut candidates = vec![trimmed.to_string()];
        if let Some((prefix, width)) = id_pattern(regex) {
            candidates.extend(correct_id(trimmed, &prefix, width));
        }
        candidates.extend(correct_email(trimmed));
        candidates.push(trimmed.to_uppercase());
        candidates.push(trimmed.to_lowercase());
        candidates
    }

    /// JSON type the constraints at `field` expect.
    fn expected_type(&self, field: &str) -> ExpectedType {
        if split_path(field).last().is_some_and(|s| s.parse::<usize>().is_ok()) {
            return ExpectedType::Object;
        }
        let at = self.schema.constraints_at(field);
        let has = |pred: fn(&ConstraintKind) -> bool| at.iter().any(|c| pred(&c.kind));
        if has(|k| matches!(k, ConstraintKind::Nested { many: true, .. })) {
            ExpectedType::Array
        } else if has(|k| matches!(k, ConstraintKind::Range { .. })) {
            ExpectedType::Number
        } else if has(|k| matches!(k, ConstraintKind::Nested { many: false, .. })) {
            ExpectedType::Object
        } else {
            ExpectedType::String
        }
    }
}

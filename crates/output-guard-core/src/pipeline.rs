//! Validation pipeline. Drives a candidate text through every stage and
//! assembles the [`ValidationResult`].
//!
//! ```text
//! Received ──repair──▶ Parsed ──validate──▶ ConstraintChecked ──recover──▶ Recovered
//!    │                                           │                           │
//!    │ unrepairable                              │ no errors                 │ re-validate
//!    ▼                                           ▼                           ▼
//!  Failed ◀──────── errors remain ───────── ReChecked ◀──────────────────────┘
//!                                                │
//!                                                └── no errors ──▶ Done
//! ```
//!
//! A run performs no I/O and never fails: every outcome, including
//! unparseable input, is described by the returned result.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{json, Value};

use crate::catalog::ErrorKind;
use crate::config::PipelineOptions;
use crate::recovery::RecoveryEngine;
use crate::repair::{repair, RepairOutcome};
use crate::result::{Stage, ValidationError, ValidationResult};
use crate::schema::Schema;
use crate::validator::ConstraintValidator;

/// Field name reported on errors that concern the whole document.
pub const ROOT_FIELD: &str = "$";

/// Orchestrates repair, validation and recovery.
///
/// Holds only options, so one pipeline can serve any number of concurrent
/// runs against any number of schemas.
#[derive(Debug, Clone, Default)]
pub struct ValidationPipeline {
    options: PipelineOptions,
}

impl ValidationPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Validate `raw` against `schema`.
    ///
    /// Deterministic for identical inputs and options, apart from the
    /// result timestamp (and "today" when no date is configured).
    pub fn run(&self, raw: &str, schema: &Schema) -> ValidationResult {
        let today = self.options.today.unwrap_or_else(|| Utc::now().date_naive());
        let mut metadata = BTreeMap::new();
        metadata.insert("schema".to_string(), json!(schema.name()));

        let mut stage = Stage::Received;
        tracing::debug!(schema = schema.name(), bytes = raw.len(), "validation run received");

        let repaired = repair(raw);
        metadata.insert(
            "repairAttempts".to_string(),
            serde_json::to_value(&repaired.attempts).unwrap_or_default(),
        );
        let value = match (&repaired.value, repaired.strategy) {
            (Some(value), Some(strategy)) => {
                metadata.insert("repairStrategy".to_string(), json!(strategy.as_str()));
                value.clone()
            }
            _ => return syntax_failure(raw, &repaired, metadata),
        };
        stage = advance(stage, Stage::Parsed);

        let validator = ConstraintValidator::new(schema, today);
        let errors = validator.validate(&value);
        stage = advance(stage, Stage::ConstraintChecked);
        tracing::debug!(errors = errors.len(), "constraint check finished");

        let mut warnings = Vec::new();
        let mut attempts = Vec::new();
        let mut accepted = Vec::new();

        let (value, remaining) = if errors.is_empty() {
            (value, errors)
        } else {
            let value = if self.options.recovery.enabled {
                let engine = RecoveryEngine::new(schema, self.options.recovery.clone(), today);
                let outcome = engine.recover(value, &errors);
                stage = advance(stage, Stage::Recovered);
                attempts = outcome.attempts;
                warnings = outcome.warnings;
                accepted = outcome.accepted;
                outcome.value
            } else {
                tracing::debug!("recovery disabled; re-checking unchanged value");
                value
            };

            let mut remaining = validator.validate(&value);
            remaining.retain(|e| {
                !accepted
                    .iter()
                    .any(|a| a.field == e.field && a.constraint == e.constraint)
            });
            (value, remaining)
        };
        stage = advance(stage, Stage::ReChecked);

        warnings.extend(validator.advise(&value, self.options.warn_on_extra_fields));

        let valid = remaining.is_empty();
        stage = advance(stage, if valid { Stage::Done } else { Stage::Failed });
        metadata.insert("stage".to_string(), json!(stage.as_str()));
        if !valid {
            metadata.insert("failedAt".to_string(), json!(Stage::ReChecked.as_str()));
            let mut fields: Vec<&str> = remaining.iter().map(|e| e.field.as_str()).collect();
            fields.dedup();
            metadata.insert("unrecoveredFields".to_string(), json!(fields));
        }

        tracing::debug!(
            valid,
            errors = remaining.len(),
            warnings = warnings.len(),
            attempts = attempts.len(),
            "validation run finished"
        );

        ValidationResult {
            valid,
            timestamp: Utc::now(),
            errors: remaining,
            warnings,
            recovery_attempts: attempts,
            final_output: Some(value),
            metadata,
        }
    }
}

fn advance(from: Stage, to: Stage) -> Stage {
    tracing::debug!(from = from.as_str(), to = to.as_str(), "stage transition");
    to
}

/// Terminal result for text that no repair strategy could parse.
fn syntax_failure(
    raw: &str,
    repaired: &RepairOutcome,
    mut metadata: BTreeMap<String, Value>,
) -> ValidationResult {
    advance(Stage::Received, Stage::Failed);
    metadata.insert("stage".to_string(), json!(Stage::Failed.as_str()));
    metadata.insert("failedAt".to_string(), json!(Stage::Received.as_str()));

    let message = match repaired.last_error() {
        Some(detail) => format!("{}: {}", ErrorKind::JsonSyntax.default_message(), detail),
        None => ErrorKind::JsonSyntax.default_message().to_string(),
    };
    tracing::debug!(%message, "validation run failed to parse");

    ValidationResult {
        valid: false,
        timestamp: Utc::now(),
        errors: vec![ValidationError {
            field: ROOT_FIELD.to_string(),
            message,
            value: Value::String(raw.to_string()),
            constraint: ErrorKind::JsonSyntax,
        }],
        warnings: Vec::new(),
        recovery_attempts: Vec::new(),
        final_output: None,
        metadata,
    }
}

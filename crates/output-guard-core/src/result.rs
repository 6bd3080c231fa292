//! Result model returned by a validation run.
//!
//! Field names on the wire are camelCase and stable; an HTTP layer can echo
//! a [`ValidationResult`] as-is for both accepted and rejected responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{ErrorKind, Strategy};

/// A hard constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted data path of the offending field (e.g. `items.0.quantity`).
    pub field: String,
    pub message: String,
    /// The offending value, `null` when the field was missing.
    pub value: Value,
    pub constraint: ErrorKind,
}

/// A non-blocking observation about the candidate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: String,
}

/// One recovery strategy invocation and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub strategy: Strategy,
    pub success: bool,
    pub description: String,
    /// The value the strategy produced, present only on success.
    pub result: Option<Value>,
}

/// Pipeline state, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Parsed,
    ConstraintChecked,
    Recovered,
    ReChecked,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Parsed => "parsed",
            Stage::ConstraintChecked => "constraint_checked",
            Stage::Recovered => "recovered",
            Stage::ReChecked => "re_checked",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

/// Terminal artifact of a validation run.
///
/// `valid == true` implies `errors` is empty and `final_output` is present.
/// `valid == false` implies `errors` is non-empty; `final_output` is `None`
/// only when the text could not be parsed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub recovery_attempts: Vec<RecoveryAttempt>,
    pub final_output: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl ValidationResult {
    /// Errors with the given constraint id.
    pub fn errors_of(&self, kind: ErrorKind) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.constraint == kind)
    }

    /// The stage the run ended in, as recorded in the metadata.
    pub fn stage(&self) -> Option<&str> {
        self.metadata.get("stage").and_then(Value::as_str)
    }
}

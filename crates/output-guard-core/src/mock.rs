//! Mock response harness. Stands in for a live model in tests.
//!
//! [`generate`] builds a payload that satisfies a schema and, optionally,
//! injects exactly one class of defect into it. Everything is a pure
//! function over `serde_json::Value`, so the same fault always lands on the
//! same field.
//!
//! Values come from declared examples and defaults first. Otherwise they are
//! synthesized from the constraints. A pattern that is neither an ID shape
//! nor matched by one of a few stock strings needs an `example`, and a
//! schema lacking one is rejected with [`MockError::MissingExample`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::catalog::id_pattern;
use crate::error::MockError;
use crate::path::{join_path, remove, resolve, set};
use crate::schema::{ConstraintKind, FieldConstraint, Schema};

/// Stock strings tried against patterns that are not ID shapes.
const STOCK_STRINGS: &[&str] = &[
    "sample",
    "user@example.com",
    "ABC",
    "abc",
    "12345",
    "2024-01-15",
    "https://example.com",
];

/// A deliberately injected defect class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Text truncated mid-document; no repair can recover it.
    MalformedJson,
    /// The first required field is removed.
    MissingRequiredField,
    /// The first numeric field is sent as a string (or the first patterned
    /// string as a number).
    WrongType,
    /// Undeclared top-level fields are added.
    ExtraFields,
    /// The first patterned field holds a value with no salvageable format.
    InvalidValues,
}

impl FaultKind {
    pub const ALL: [FaultKind; 5] = [
        FaultKind::MalformedJson,
        FaultKind::MissingRequiredField,
        FaultKind::WrongType,
        FaultKind::ExtraFields,
        FaultKind::InvalidValues,
    ];
}

/// Generate a payload for `schema`, optionally with one injected fault.
pub fn generate(schema: &Schema, fault: Option<FaultKind>) -> Result<String, MockError> {
    let value = generate_value(schema, fault)?;
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    Ok(match fault {
        Some(FaultKind::MalformedJson) => truncate_after_last_colon(&text),
        _ => text,
    })
}

/// The document behind [`generate`], before serialization.
///
/// [`FaultKind::MalformedJson`] is a text-level fault, so the document
/// returned for it is the valid one.
pub fn generate_value(schema: &Schema, fault: Option<FaultKind>) -> Result<Value, MockError> {
    let constraints = schema.constraints();
    let mut doc = build_object(schema, constraints, "")?;
    match fault {
        None | Some(FaultKind::MalformedJson) => {}
        Some(FaultKind::MissingRequiredField) => {
            if let Some(c) = first_of(constraints, |k| matches!(k, ConstraintKind::Required)) {
                remove(&mut doc, &c.path);
            }
        }
        Some(FaultKind::WrongType) => {
            if let Some(c) = first_of(constraints, |k| matches!(k, ConstraintKind::Range { .. })) {
                let text = resolve(&doc, &c.path).map(number_text).unwrap_or_default();
                set(&mut doc, &c.path, Value::String(text));
            } else if let Some(c) = first_of(constraints, is_pattern) {
                set(&mut doc, &c.path, json!(12345));
            }
        }
        Some(FaultKind::ExtraFields) => {
            if let Some(obj) = doc.as_object_mut() {
                obj.insert("unexpectedField".to_string(), json!("not in schema"));
                obj.insert("_debug".to_string(), json!({"model": "mock", "tokens": 42}));
            }
        }
        Some(FaultKind::InvalidValues) => {
            if let Some(c) = first_of(constraints, is_pattern) {
                set(&mut doc, &c.path, json!("???"));
            }
        }
    }
    Ok(doc)
}

fn first_of(
    constraints: &[FieldConstraint],
    pred: fn(&ConstraintKind) -> bool,
) -> Option<&FieldConstraint> {
    constraints.iter().find(|c| pred(&c.kind))
}

fn is_pattern(kind: &ConstraintKind) -> bool {
    matches!(kind, ConstraintKind::Pattern { .. })
}

fn number_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_after_last_colon(text: &str) -> String {
    match text.rfind(':') {
        Some(pos) => text[..=pos].to_string(),
        None => text.chars().take(text.chars().count() / 2).collect(),
    }
}

// ---------------------------------------------------------------------------
// Valid document synthesis
// ---------------------------------------------------------------------------

fn build_object(
    schema: &Schema,
    constraints: &[FieldConstraint],
    prefix: &str,
) -> Result<Value, MockError> {
    let mut doc = Value::Object(Map::new());
    let mut seen: Vec<&str> = Vec::new();
    for c in constraints {
        if seen.contains(&c.path.as_str()) {
            continue;
        }
        seen.push(&c.path);
        let value = sample_for(schema, constraints, &c.path, prefix)?;
        set(&mut doc, &c.path, value);
    }
    Ok(doc)
}

/// Sample value for a path: the first declared example or default, else one
/// synthesized from the constraints on that path.
fn sample_for(
    schema: &Schema,
    constraints: &[FieldConstraint],
    path: &str,
    prefix: &str,
) -> Result<Value, MockError> {
    let mut on_path: Vec<&FieldConstraint> =
        constraints.iter().filter(|c| c.path == path).collect();
    if let Some(example) = on_path.iter().find_map(|c| c.example.clone()) {
        return Ok(example);
    }
    if let Some(default) = on_path.iter().find_map(|c| c.default.clone()) {
        return Ok(default);
    }

    // Shape first, then the narrowest value constraints.
    on_path.sort_by_key(|c| synthesis_rank(&c.kind));
    for c in on_path {
        if let Some(value) = synthesize(schema, c, prefix)? {
            return Ok(value);
        }
    }
    Ok(json!("sample"))
}

fn synthesis_rank(kind: &ConstraintKind) -> u8 {
    match kind {
        ConstraintKind::Nested { .. } => 0,
        ConstraintKind::OneOf { .. } => 1,
        ConstraintKind::Pattern { .. } => 2,
        ConstraintKind::PastOrPresent => 3,
        ConstraintKind::Range { .. } => 4,
        ConstraintKind::Size { .. } => 5,
        ConstraintKind::Required | ConstraintKind::Typical { .. } => 6,
    }
}

fn synthesize(
    schema: &Schema,
    c: &FieldConstraint,
    prefix: &str,
) -> Result<Option<Value>, MockError> {
    let value = match &c.kind {
        ConstraintKind::Required | ConstraintKind::Typical { .. } => return Ok(None),
        ConstraintKind::Pattern { regex } => {
            let sample = match id_pattern(regex) {
                Some((id_prefix, width)) => format!("{}-{}1", id_prefix, "0".repeat(width - 1)),
                None => STOCK_STRINGS
                    .iter()
                    .find(|s| schema.regex(regex).is_some_and(|re| re.is_match(s)))
                    .map(|s| s.to_string())
                    .ok_or_else(|| MockError::MissingExample {
                        path: join_path(prefix, &c.path),
                        pattern: regex.clone(),
                    })?,
            };
            Value::String(sample)
        }
        ConstraintKind::Range { min, max } => {
            let n = match (min, max) {
                (Some(min), Some(max)) => (min + max) / 2.0,
                (Some(min), None) => min.max(1.0),
                (None, Some(max)) => max.min(1.0),
                (None, None) => 1.0,
            };
            let rounded = n.round();
            let fits = !min.is_some_and(|m| rounded < m) && !max.is_some_and(|m| rounded > m);
            if fits {
                json!(rounded as i64)
            } else {
                json!(n)
            }
        }
        ConstraintKind::Size { min, max } => {
            let len = min.unwrap_or(1).max(1).min(max.unwrap_or(usize::MAX));
            Value::String("x".repeat(len))
        }
        ConstraintKind::OneOf { values } => match values.first() {
            Some(v) => Value::String(v.clone()),
            None => return Ok(None),
        },
        ConstraintKind::Nested { constraints, many } => {
            let field = join_path(prefix, &c.path);
            if *many {
                let item = build_object(schema, constraints, &join_path(&field, "0"))?;
                Value::Array(vec![item])
            } else {
                build_object(schema, constraints, &field)?
            }
        }
        ConstraintKind::PastOrPresent => json!("2024-01-15"),
    };
    Ok(Some(value))
}

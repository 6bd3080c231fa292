//! Data-driven constraint sets.
//!
//! A [`Schema`] is an ordered list of [`FieldConstraint`]s describing one
//! target shape. Constraints are plain data so they can be inspected,
//! serialized and loaded from files. Building a `Schema` checks the list
//! for configuration mistakes and pre-compiles every regex once; afterwards
//! the schema is read-only and may be shared across threads.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "name": "order_request",
//!   "constraints": [
//!     { "path": "orderId", "kind": { "type": "required" } },
//!     { "path": "orderId", "kind": { "type": "pattern", "regex": "^ORD-\\d{6}$" } },
//!     { "path": "status", "kind": { "type": "required" }, "default": "PENDING" }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ErrorKind;
use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Constraint model
// ---------------------------------------------------------------------------

/// One declarative rule a field's value must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraint {
    /// Dotted path relative to the object this constraint set applies to.
    pub path: String,
    pub kind: ConstraintKind,
    /// Message template. Supports `{field}`, `{min}`, `{max}` and `{value}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Substituted by the default-fill recovery strategy when the field is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Non-critical violations may be demoted to warnings by partial-accept.
    #[serde(default = "default_critical", skip_serializing_if = "is_true")]
    pub critical: bool,
    /// Sample value used by the mock response harness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

fn default_critical() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

/// The check a [`FieldConstraint`] applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Present, non-null and, for strings, not blank.
    Required,
    /// The whole string value must match `regex`.
    Pattern { regex: String },
    /// Inclusive numeric range.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Inclusive bounds on string length (chars) or collection cardinality.
    Size {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },
    /// Value must be one of the listed strings.
    OneOf { values: Vec<String> },
    /// Sub-object (or, with `many`, every element of an array) validated
    /// against a nested constraint set.
    Nested {
        constraints: Vec<FieldConstraint>,
        #[serde(default)]
        many: bool,
    },
    /// ISO-8601 date or datetime that is not in the future.
    PastOrPresent,
    /// Advisory numeric range: values outside only produce warnings.
    Typical {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
}

impl ConstraintKind {
    /// The error kind reported when this constraint is violated.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ConstraintKind::Required => ErrorKind::Required,
            ConstraintKind::Pattern { .. } => ErrorKind::Pattern,
            ConstraintKind::Range { .. } | ConstraintKind::Typical { .. } => ErrorKind::Range,
            ConstraintKind::Size { .. } => ErrorKind::Size,
            ConstraintKind::OneOf { .. } => ErrorKind::OneOf,
            ConstraintKind::Nested { .. } => ErrorKind::Type,
            ConstraintKind::PastOrPresent => ErrorKind::PastOrPresent,
        }
    }

    /// Whether a value of the wrong JSON type is reported against this kind.
    pub fn checks_type(&self) -> bool {
        !matches!(self, ConstraintKind::Required | ConstraintKind::Typical { .. })
    }
}

impl FieldConstraint {
    pub fn new(path: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            path: path.into(),
            kind,
            message: None,
            default: None,
            critical: true,
            example: None,
        }
    }

    pub fn required(path: impl Into<String>) -> Self {
        Self::new(path, ConstraintKind::Required)
    }

    pub fn pattern(path: impl Into<String>, regex: impl Into<String>) -> Self {
        Self::new(path, ConstraintKind::Pattern { regex: regex.into() })
    }

    pub fn range(path: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(path, ConstraintKind::Range { min, max })
    }

    pub fn size(path: impl Into<String>, min: Option<usize>, max: Option<usize>) -> Self {
        Self::new(path, ConstraintKind::Size { min, max })
    }

    pub fn one_of<S: Into<String>>(
        path: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(
            path,
            ConstraintKind::OneOf {
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn nested(path: impl Into<String>, constraints: Vec<FieldConstraint>, many: bool) -> Self {
        Self::new(path, ConstraintKind::Nested { constraints, many })
    }

    pub fn past_or_present(path: impl Into<String>) -> Self {
        Self::new(path, ConstraintKind::PastOrPresent)
    }

    pub fn typical(path: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(path, ConstraintKind::Typical { min, max })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    /// Render the message template, falling back to `fallback`.
    pub(crate) fn render_message(
        &self,
        field: &str,
        value: Option<&Value>,
        fallback: &str,
    ) -> String {
        let template = self.message.as_deref().unwrap_or(fallback);
        let (min, max) = match &self.kind {
            ConstraintKind::Range { min, max } | ConstraintKind::Typical { min, max } => {
                (min.map(|m| m.to_string()), max.map(|m| m.to_string()))
            }
            ConstraintKind::Size { min, max } => {
                (min.map(|m| m.to_string()), max.map(|m| m.to_string()))
            }
            _ => (None, None),
        };
        let value = match value {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => "null".to_string(),
        };
        template
            .replace("{field}", field)
            .replace("{min}", min.as_deref().unwrap_or("-inf"))
            .replace("{max}", max.as_deref().unwrap_or("inf"))
            .replace("{value}", &value)
    }
}

// ---------------------------------------------------------------------------
// Compiled schema
// ---------------------------------------------------------------------------

/// Serializable form of a [`Schema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDef {
    pub name: String,
    pub constraints: Vec<FieldConstraint>,
}

/// A checked, compiled constraint set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    name: String,
    constraints: Vec<FieldConstraint>,
    regex_cache: HashMap<String, Regex>,
}

impl Schema {
    /// Check the constraint list and compile every pattern.
    pub fn new(
        name: impl Into<String>,
        constraints: Vec<FieldConstraint>,
    ) -> Result<Self, SchemaError> {
        let mut regex_cache = HashMap::new();
        check_constraints(&constraints, "", &mut regex_cache)?;
        Ok(Self {
            name: name.into(),
            constraints,
            regex_cache,
        })
    }

    /// Parse a schema definition from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let def: SchemaDef = serde_json::from_str(text)?;
        Self::try_from(def)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraints(&self) -> &[FieldConstraint] {
        &self.constraints
    }

    /// Anchored regex compiled for `pattern`. Every pattern reachable from
    /// this schema is compiled in [`Schema::new`].
    pub(crate) fn regex(&self, pattern: &str) -> Option<&Regex> {
        self.regex_cache.get(pattern)
    }

    /// Every constraint that applies to a concrete field path, in
    /// declaration order.
    ///
    /// `field` is the dotted data path reported on an error; array indices
    /// introduced by `nested many` constraints are skipped while descending.
    /// An element path such as `items.0` yields the `nested many` constraint
    /// on `items`.
    pub fn constraints_at(&self, field: &str) -> Vec<&FieldConstraint> {
        let mut out = Vec::new();
        collect_at(&self.constraints, field, &mut out);
        out
    }

    /// Find the constraint that produced an error at a concrete field path.
    ///
    /// For [`ErrorKind::Type`] the first type-checking constraint on the
    /// path is returned, matching the order the validator reports them in.
    pub fn find_constraint(&self, field: &str, kind: ErrorKind) -> Option<&FieldConstraint> {
        self.constraints_at(field).into_iter().find(|c| match kind {
            ErrorKind::Type => c.kind.checks_type(),
            other => {
                c.kind.error_kind() == other && !matches!(c.kind, ConstraintKind::Typical { .. })
            }
        })
    }
}

impl TryFrom<SchemaDef> for Schema {
    type Error = SchemaError;

    fn try_from(def: SchemaDef) -> Result<Self, Self::Error> {
        Schema::new(def.name, def.constraints)
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        SchemaDef {
            name: schema.name,
            constraints: schema.constraints,
        }
    }
}

/// Wrap a user pattern so it must match the whole value.
fn anchor(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

fn check_constraints(
    constraints: &[FieldConstraint],
    parent: &str,
    regex_cache: &mut HashMap<String, Regex>,
) -> Result<(), SchemaError> {
    for (index, c) in constraints.iter().enumerate() {
        if crate::path::split_path(&c.path).is_empty() {
            return Err(SchemaError::EmptyPath { index });
        }
        let full = crate::path::join_path(parent, &c.path);
        match &c.kind {
            ConstraintKind::Pattern { regex } => {
                if !regex_cache.contains_key(regex) {
                    let compiled =
                        Regex::new(&anchor(regex)).map_err(|e| SchemaError::InvalidPattern {
                            path: full.clone(),
                            message: e.to_string(),
                        })?;
                    regex_cache.insert(regex.clone(), compiled);
                }
            }
            ConstraintKind::Range { min: Some(min), max: Some(max) }
            | ConstraintKind::Typical { min: Some(min), max: Some(max) } => {
                if min > max || min.is_nan() || max.is_nan() {
                    return Err(SchemaError::InvalidBounds {
                        path: full,
                        min: *min,
                        max: *max,
                    });
                }
            }
            ConstraintKind::Size { min: Some(min), max: Some(max) } => {
                if min > max {
                    return Err(SchemaError::InvalidBounds {
                        path: full,
                        min: *min as f64,
                        max: *max as f64,
                    });
                }
            }
            ConstraintKind::OneOf { values } if values.is_empty() => {
                return Err(SchemaError::EmptyChoices { path: full });
            }
            ConstraintKind::Nested { constraints, .. } => {
                check_constraints(constraints, &full, regex_cache)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn collect_at<'s>(
    constraints: &'s [FieldConstraint],
    field: &str,
    out: &mut Vec<&'s FieldConstraint>,
) {
    out.extend(constraints.iter().filter(|c| c.path == field));

    // Descend into nested sets whose path prefixes the field.
    for c in constraints {
        let ConstraintKind::Nested { constraints: inner, many } = &c.kind else {
            continue;
        };
        let Some(rest) = field
            .strip_prefix(c.path.as_str())
            .and_then(|r| r.strip_prefix('.'))
        else {
            continue;
        };
        let rest = if *many {
            match rest.split_once('.') {
                Some((index, tail)) if index.parse::<usize>().is_ok() => tail,
                // An element of the array itself is governed by the set.
                None if rest.parse::<usize>().is_ok() => {
                    out.push(c);
                    continue;
                }
                _ => continue,
            }
        } else {
            rest
        };
        collect_at(inner, rest, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items_schema() -> Schema {
        Schema::new(
            "order",
            vec![
                FieldConstraint::required("id"),
                FieldConstraint::pattern("id", r"ORD-\d{6}"),
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
        .expect("schema should build")
    }

    #[test]
    fn test_patterns_are_anchored() {
        let schema = items_schema();
        let re = schema.regex(r"ORD-\d{6}").expect("pattern should be compiled");
        assert!(re.is_match("ORD-123456"));
        assert!(!re.is_match("xORD-123456"));
        assert!(!re.is_match("ORD-1234567"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let err =
            Schema::new("bad", vec![FieldConstraint::pattern("id", "(unclosed")]).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { ref path, .. } if path == "id"));
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        let err = Schema::new(
            "bad",
            vec![FieldConstraint::nested(
                "items",
                vec![FieldConstraint::range("qty", Some(5.0), Some(1.0))],
                true,
            )],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidBounds { ref path, .. } if path == "items.qty"));
    }

    #[test]
    fn test_empty_choices_and_empty_path_are_rejected() {
        let empty: Vec<String> = Vec::new();
        assert!(matches!(
            Schema::new("bad", vec![FieldConstraint::one_of("status", empty)]),
            Err(SchemaError::EmptyChoices { .. })
        ));
        assert!(matches!(
            Schema::new("bad", vec![FieldConstraint::required("")]),
            Err(SchemaError::EmptyPath { index: 0 })
        ));
    }

    #[test]
    fn test_find_constraint_descends_into_nested_many() {
        let schema = items_schema();
        let found = schema
            .find_constraint("items.3.qty", ErrorKind::Range)
            .expect("nested constraint should be found");
        assert_eq!(found.path, "qty");
        assert!(schema.find_constraint("items.qty", ErrorKind::Range).is_none());
        let typed = schema.find_constraint("id", ErrorKind::Type).unwrap();
        assert!(matches!(typed.kind, ConstraintKind::Pattern { .. }));
    }

    #[test]
    fn test_element_path_maps_to_nested_many_set() {
        let schema = items_schema();
        let found = schema
            .find_constraint("items.0", ErrorKind::Type)
            .expect("element type error should map to its set");
        assert_eq!(found.path, "items");
        assert!(matches!(found.kind, ConstraintKind::Nested { many: true, .. }));
        assert!(schema.find_constraint("items.x", ErrorKind::Type).is_none());
    }

    #[test]
    fn test_serde_round_trip_recompiles() {
        let schema = items_schema();
        let text = serde_json::to_string(&schema).unwrap();
        assert!(text.contains("\"type\":\"pattern\""));
        let back: Schema = serde_json::from_str(&text).unwrap();
        assert_eq!(back.constraints(), schema.constraints());
        assert!(back.regex(r"ORD-\d{6}").is_some());
    }

    #[test]
    fn test_deserialize_runs_checks() {
        let text = json!({
            "name": "bad",
            "constraints": [{"path": "id", "kind": {"type": "pattern", "regex": "["}}]
        })
        .to_string();
        assert!(Schema::from_json(&text).is_err());
        assert!(serde_json::from_str::<Schema>(&text).is_err());
    }

    #[test]
    fn test_render_message_placeholders() {
        let c = FieldConstraint::range("qty", Some(1.0), Some(10.0))
            .with_message("{field} must be within [{min}, {max}], got {value}");
        assert_eq!(
            c.render_message("items.0.qty", Some(&json!(42)), "unused"),
            "items.0.qty must be within [1, 10], got 42"
        );
    }
}

//! Error catalog: the vocabulary of violations and the fix heuristics used
//! to repair them.
//!
//! Every heuristic here is a pure function that proposes a reformatted value.
//! None of them invent content: an ID is rebuilt only from digits already
//! present, an email only from the words already written, and so on. The
//! recovery engine decides whether a proposal is accepted by re-checking it
//! against the constraint.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Identifier of the violated constraint, as reported on a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The candidate text could not be turned into JSON at all.
    JsonSyntax,
    Required,
    /// The value has the wrong JSON type for its constraint.
    Type,
    Pattern,
    Range,
    Size,
    OneOf,
    PastOrPresent,
}

impl ErrorKind {
    pub fn id(self) -> &'static str {
        match self {
            ErrorKind::JsonSyntax => "json_syntax",
            ErrorKind::Required => "required",
            ErrorKind::Type => "type",
            ErrorKind::Pattern => "pattern",
            ErrorKind::Range => "range",
            ErrorKind::Size => "size",
            ErrorKind::OneOf => "one_of",
            ErrorKind::PastOrPresent => "past_or_present",
        }
    }

    /// Default message template used when a constraint declares none.
    pub(crate) fn default_message(self) -> &'static str {
        match self {
            ErrorKind::JsonSyntax => "response is not valid JSON",
            ErrorKind::Required => "field required",
            ErrorKind::Type => "wrong type",
            ErrorKind::Pattern => "{field} does not match the required format",
            ErrorKind::Range => "{field} must be between {min} and {max}",
            ErrorKind::Size => "{field} size must be between {min} and {max}",
            ErrorKind::OneOf => "{field} is not an allowed value",
            ErrorKind::PastOrPresent => "{field} must be a date in the past or present",
        }
    }

    /// Advice attached to a warning when a violation of this kind is
    /// accepted or left for a human to look at.
    pub fn suggestion(self) -> &'static str {
        match self {
            ErrorKind::JsonSyntax => "ask the model to answer with a single JSON object only",
            ErrorKind::Required => "supply the field or configure a default for it",
            ErrorKind::Type => "check the field's JSON type against the schema",
            ErrorKind::Pattern => "reformat the value to the documented pattern",
            ErrorKind::Range => "verify the value; numeric data is never auto-corrected",
            ErrorKind::Size => "shorten or extend the value to the allowed size",
            ErrorKind::OneOf => "use one of the enumerated values",
            ErrorKind::PastOrPresent => "use an ISO-8601 date that is not in the future",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Identifier of a recovery strategy, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PatternAutoCorrect,
    DefaultFill,
    PartialAccept,
}

/// JSON type a constraint expects, used to steer type coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    String,
    Number,
    Array,
    Object,
}

impl ExpectedType {
    pub fn name(self) -> &'static str {
        match self {
            ExpectedType::String => "string",
            ExpectedType::Number => "number",
            ExpectedType::Array => "array",
            ExpectedType::Object => "object",
        }
    }
}

/// Return the JSON type name for a value.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// ID heuristics
// ---------------------------------------------------------------------------

fn id_pattern_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^\^?([A-Za-z][A-Za-z0-9_]*)-\\d\{(\d+)\}\$?$").expect("static regex")
    })
}

/// Recognise an ID pattern of the form `PREFIX-\d{N}` and return `(PREFIX, N)`.
pub fn id_pattern(pattern: &str) -> Option<(String, usize)> {
    let caps = id_pattern_shape().captures(pattern)?;
    let width = caps[2].parse::<usize>().ok().filter(|w| *w > 0 && *w <= 32)?;
    Some((caps[1].to_string(), width))
}

/// Rebuild an ID as `PREFIX-` followed by exactly `width` digits.
///
/// Digits are taken from the value as written, left-padded with zeros, or
/// truncated to the rightmost `width` digits. Values without any digit are
/// not correctable.
pub fn correct_id(value: &str, prefix: &str, width: usize) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits = if digits.len() > width {
        &digits[digits.len() - width..]
    } else {
        digits.as_str()
    };
    Some(format!("{}-{:0>width$}", prefix, digits, width = width))
}

// ---------------------------------------------------------------------------
// Email heuristics
// ---------------------------------------------------------------------------

fn email_words() -> &'static [(Regex, &'static str)] {
    static WORDS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    WORDS.get_or_init(|| {
        vec![
            (Regex::new(r"(?i)\s*[\[\(\{]\s*at\s*[\]\)\}]\s*").expect("static regex"), "@"),
            (Regex::new(r"(?i)\s+at\s+").expect("static regex"), "@"),
            (Regex::new(r"(?i)\s*[\[\(\{]\s*dot\s*[\]\)\}]\s*").expect("static regex"), "."),
            (Regex::new(r"(?i)\s+dot\s+").expect("static regex"), "."),
        ]
    })
}

/// Rewrite `jane dot doe at example dot com` style phrases into an address.
///
/// Returns `None` when no rewrite changed anything.
pub fn correct_email(value: &str) -> Option<String> {
    let mut out = value.trim().to_string();
    for (re, replacement) in email_words() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    let out: String = out.chars().filter(|c| !c.is_whitespace()).collect();
    let out = out.to_lowercase();
    (out != value && out.contains('@')).then_some(out)
}

// ---------------------------------------------------------------------------
// Date heuristics
// ---------------------------------------------------------------------------

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse an ISO-8601 date or datetime. This is the strict form accepted by
/// the past-or-present check.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Parse a free-text date in any of the commonly seen shapes.
pub fn parse_loose_date(value: &str) -> Option<NaiveDate> {
    if let Some(date) = parse_iso_date(value) {
        return Some(date);
    }
    // Strip ordinal suffixes ("March 3rd, 2024") before trying named formats.
    let cleaned = ordinal_suffix().replace_all(value.trim(), "$1");
    let cleaned = cleaned.as_ref();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(cleaned, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn ordinal_suffix() -> &'static Regex {
    static ORDINAL: OnceLock<Regex> = OnceLock::new();
    ORDINAL.get_or_init(|| Regex::new(r"(\d)(?:st|nd|rd|th)\b").expect("static regex"))
}

/// Normalize a free-text date to `YYYY-MM-DD`, clamping dates after `today`
/// to `today` when `clamp_future` is set.
pub fn normalize_date(value: &str, today: NaiveDate, clamp_future: bool) -> Option<String> {
    let date = parse_loose_date(value)?;
    let date = if clamp_future && date > today { today } else { date };
    Some(date.format("%Y-%m-%d").to_string())
}

// ---------------------------------------------------------------------------
// Amount and type coercion
// ---------------------------------------------------------------------------

/// Parse a human-written amount such as `"$1,234.50"`, `"42"` or `"EUR 9.99"`.
///
/// Only presentation characters are removed (currency symbols and codes,
/// thousands separators, surrounding whitespace); the digits are kept as
/// written.
pub fn parse_amount(value: &str) -> Option<f64> {
    let decoration = |c: char| c.is_ascii_alphabetic() || "$€£¥".contains(c) || c.is_whitespace();
    let stripped: String = value
        .trim()
        .trim_start_matches(decoration)
        .trim_end_matches(decoration)
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    let numeric = |c: char| c.is_ascii_digit() || c == '.' || c == '-';
    if stripped.is_empty() || !stripped.chars().all(numeric) {
        return None;
    }
    stripped.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Propose a value of the expected JSON type, or `None` when no lossless
/// conversion exists.
///
/// | Got | Expected | Result |
/// |-----|----------|--------|
/// | number, boolean | string | its text |
/// | string | number | [`parse_amount`] |
/// | object | array | one-element array |
pub fn coerce_type(value: &Value, expected: ExpectedType) -> Option<Value> {
    match (expected, value) {
        (ExpectedType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ExpectedType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ExpectedType::Number, Value::String(s)) => {
            let n = parse_amount(s)?;
            let number = if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Number::from(n as i64)
            } else {
                Number::from_f64(n)?
            };
            Some(Value::Number(number))
        }
        (ExpectedType::Array, Value::Object(_)) => Some(Value::Array(vec![value.clone()])),
        _ => None,
    }
}

/// Case- and whitespace-insensitive lookup in an enumerated set.
pub fn match_choice<'a>(value: &str, choices: &'a [String]) -> Option<&'a str> {
    let wanted = value.trim();
    choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(wanted))
        .map(String::as_str)
}

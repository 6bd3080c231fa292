//! JSON repair: turns almost-JSON model output into parseable JSON.
//!
//! Three strategies run in order, each followed by a strict `serde_json`
//! parse, stopping at the first that yields a value:
//!
//! 1. **strict**: the text as-is.
//! 2. **extract**: the first complete balanced `{...}` / `[...]` span, so
//!    prose and markdown fences around the payload are dropped.
//! 3. **normalize**: the extracted span (or the whole text) with relaxed
//!    syntax rewritten: single-quoted strings, trailing commas, bare keys,
//!    and `True` / `False` / `None` literals.
//!
//! Repair never panics and never returns an error: failure is reported in
//! the [`RepairOutcome`] together with every attempt made.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Repair strategy identifier, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    Strict,
    Extract,
    Normalize,
}

impl RepairStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairStrategy::Strict => "strict",
            RepairStrategy::Extract => "extract",
            RepairStrategy::Normalize => "normalize",
        }
    }
}

/// One repair step and its parse outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub strategy: RepairStrategy,
    pub success: bool,
    /// Parse error (or reason the step could not run) on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of [`repair`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub success: bool,
    /// Text that parsed, or the original text when nothing did.
    pub repaired_text: String,
    /// The parsed value on success.
    pub value: Option<Value>,
    /// Strategy that produced the value.
    pub strategy: Option<RepairStrategy>,
    pub attempts: Vec<RepairAttempt>,
}

impl RepairOutcome {
    /// The last parse error, for diagnostics.
    pub fn last_error(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| a.error.as_deref())
    }

    fn failed(text: &str, attempts: Vec<RepairAttempt>) -> Self {
        Self {
            success: false,
            repaired_text: text.to_string(),
            value: None,
            strategy: None,
            attempts,
        }
    }
}

/// Attempt to turn `text` into a JSON value.
pub fn repair(text: &str) -> RepairOutcome {
    let mut attempts = Vec::with_capacity(3);

    if text.trim().is_empty() {
        attempts.push(RepairAttempt {
            strategy: RepairStrategy::Strict,
            success: false,
            error: Some("empty input".to_string()),
        });
        return RepairOutcome::failed(text, attempts);
    }

    if let Some(value) = try_parse(text, RepairStrategy::Strict, &mut attempts) {
        return succeeded(text.to_string(), value, RepairStrategy::Strict, attempts);
    }

    let span = extract_balanced(text);
    match span {
        Some(span) => {
            if let Some(value) = try_parse(span, RepairStrategy::Extract, &mut attempts) {
                return succeeded(span.to_string(), value, RepairStrategy::Extract, attempts);
            }
        }
        None => attempts.push(RepairAttempt {
            strategy: RepairStrategy::Extract,
            success: false,
            error: Some("no balanced JSON object or array found".to_string()),
        }),
    }

    let normalized = normalize(span.unwrap_or(text));
    if let Some(value) = try_parse(&normalized, RepairStrategy::Normalize, &mut attempts) {
        return succeeded(normalized, value, RepairStrategy::Normalize, attempts);
    }

    tracing::debug!(attempts = attempts.len(), "json repair failed");
    RepairOutcome::failed(text, attempts)
}

fn try_parse(
    text: &str,
    strategy: RepairStrategy,
    attempts: &mut Vec<RepairAttempt>,
) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            attempts.push(RepairAttempt {
                strategy,
                success: true,
                error: None,
            });
            Some(value)
        }
        Err(e) => {
            attempts.push(RepairAttempt {
                strategy,
                success: false,
                error: Some(e.to_string()),
            });
            None
        }
    }
}

fn succeeded(
    text: String,
    value: Value,
    strategy: RepairStrategy,
    attempts: Vec<RepairAttempt>,
) -> RepairOutcome {
    tracing::debug!(strategy = strategy.as_str(), "json repair succeeded");
    RepairOutcome {
        success: true,
        repaired_text: text,
        value: Some(value),
        strategy: Some(strategy),
        attempts,
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Return the first complete balanced `{...}` or `[...]` span.
///
/// Brackets inside single- or double-quoted string literals do not count.
/// An opener that closes on the wrong bracket is abandoned and the search
/// resumes after that bracket. An opener still open at the end of the text
/// means the document is truncated, so nothing is extracted.
pub fn extract_balanced(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(rel) = text[from..].find(|c: char| c == '{' || c == '[') {
        let start = from + rel;
        match scan_balanced(text, start) {
            Scan::Closed(end) => return Some(&text[start..end]),
            Scan::Mismatched(at) => from = at + 1,
            Scan::Unterminated => return None,
        }
    }
    None
}

/// How the bracket run starting at an opener ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Byte offset just past the matching close.
    Closed(usize),
    /// Byte offset of a closing bracket that does not match.
    Mismatched(usize),
    Unterminated,
}

fn scan_balanced(text: &str, start: usize) -> Scan {
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return Scan::Mismatched(start + offset);
                }
                if stack.is_empty() {
                    return Scan::Closed(start + offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    Scan::Unterminated
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Double,
    Single,
}

/// Rewrite relaxed JSON syntax into strict JSON.
pub fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut mode = Mode::Normal;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match mode {
            Mode::Double => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    mode = Mode::Normal;
                }
            }
            Mode::Single => {
                if escaped {
                    if c != '\'' {
                        out.push('\\');
                    }
                    out.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '\'' {
                    out.push('"');
                    mode = Mode::Normal;
                } else if c == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(c);
                }
            }
            Mode::Normal => match c {
                '"' => {
                    out.push(c);
                    mode = Mode::Double;
                }
                '\'' => {
                    out.push('"');
                    mode = Mode::Single;
                }
                ',' => {
                    if !matches!(next_significant(&chars, i + 1), Some('}') | Some(']')) {
                        out.push(c);
                    }
                }
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    let end = identifier_end(&chars, i);
                    let ident: String = chars[i..end].iter().collect();
                    let key_position = matches!(last_significant(&out), Some('{') | Some(','));
                    if key_position && next_significant(&chars, end) == Some(':') {
                        out.push('"');
                        out.push_str(&ident);
                        out.push('"');
                    } else {
                        out.push_str(match ident.as_str() {
                            "True" => "true",
                            "False" => "false",
                            "None" => "null",
                            other => other,
                        });
                    }
                    i = end;
                    continue;
                }
                _ => out.push(c),
            },
        }
        i += 1;
    }
    out
}

fn identifier_end(chars: &[char], start: usize) -> usize {
    let mut end = start;
    while chars
        .get(end)
        .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '-'))
    {
        end += 1;
    }
    end
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars.get(from..)?.iter().copied().find(|c| !c.is_whitespace())
}

fn last_significant(out: &str) -> Option<char> {
    out.chars().rev().find(|c| !c.is_whitespace())
}

//! Interpretation of the generator's `--json` output.

use serde_json::Value;
use thiserror::Error;

/// The generator ran, but its stdout is not the JSON document it promised.
///
/// Never fatal: callers keep the raw text next to the error note.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("generator produced no output")]
    Empty,
    #[error("generator output is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Parse a whole stdout buffer as one JSON document.
pub fn parse_json_document(stdout: &str) -> Result<Value, ParseError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    serde_json::from_str(trimmed).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// Parsed document, or the raw text with a parse note.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub value: Option<Value>,
    pub raw_output: Option<String>,
    pub parse_error: Option<String>,
}

impl ParsedOutput {
    pub fn from_stdout(stdout: &str) -> Self {
        match parse_json_document(stdout) {
            Ok(value) => Self {
                value: Some(value),
                raw_output: None,
                parse_error: None,
            },
            Err(e) => {
                tracing::debug!(error = %e, "keeping raw generator output");
                Self {
                    value: None,
                    raw_output: Some(stdout.to_string()),
                    parse_error: Some(e.to_string()),
                }
            }
        }
    }

    /// Field of a parsed object, or `Value::Null`.
    pub fn field(&self, name: &str) -> Value {
        self.value
            .as_ref()
            .and_then(|v| v.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Array field of a parsed object, empty when missing or not an array.
    pub fn list(&self, name: &str) -> Vec<Value> {
        match self.field(name) {
            Value::Array(items) => items,
            _ => Vec::new(),
        }
    }
}

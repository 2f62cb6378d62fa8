//! Tolerant parsing of the stored test-case payload.

use serde_json::Value;

use super::HarnessError;
use crate::sandbox::TestCase;

/// Parse the candidate's test cases.
///
/// Accepts an array of cases, or a string containing one (parse-if-string).
/// `null` and blank strings mean "no cases". Anything else is
/// [`HarnessError::InvalidTestCases`].
pub fn parse_test_cases(raw: &Value) -> Result<Vec<TestCase>, HarnessError> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Vec::new()),
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text)
                .map_err(|e| HarnessError::InvalidTestCases(format!("malformed JSON: {e}")))?;
            if parsed.is_string() {
                return Err(HarnessError::InvalidTestCases(
                    "doubly encoded test cases".into(),
                ));
            }
            parse_test_cases(&parsed)
        }
        Value::Array(_) => serde_json::from_value(raw.clone())
            .map_err(|e| HarnessError::InvalidTestCases(e.to_string())),
        other => Err(HarnessError::InvalidTestCases(format!(
            "expected an array of test cases, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Structured response parser
//!
//! Turns raw generative output into a validated typed record. Model output
//! is treated as untrusted input: enclosing fences are stripped, the body
//! must be a JSON object, every required key must be present, and every
//! value must satisfy the schema. Nothing is defaulted, clamped or coerced.

use crate::error::ParseFailure;
use crate::schema::{self, fields, AnalysisResult, Fragment, ResonanceType, Triad};
use serde_json::{Map, Value};

/// A record that can be validated out of a generic JSON object
///
/// Implement this trait to teach the parser a new response shape.
pub trait StructuredRecord: Sized {
    /// Keys that must be present and non-null, in reporting order
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Type- and range-check the fields of `record`
    ///
    /// Called only after every required key was found.
    fn from_record(record: &Map<String, Value>) -> Result<Self, ParseFailure>;
}

impl StructuredRecord for Triad {
    const REQUIRED_FIELDS: &'static [&'static str] =
        &[fields::FRAGMENT_A, fields::FRAGMENT_B, fields::FRAGMENT_C];

    fn from_record(record: &Map<String, Value>) -> Result<Self, ParseFailure> {
        Ok(Triad::new(
            Fragment::new(required_text(record, fields::FRAGMENT_A)?),
            Fragment::new(required_text(record, fields::FRAGMENT_B)?),
            Fragment::new(required_text(record, fields::FRAGMENT_C)?),
        ))
    }
}

impl StructuredRecord for AnalysisResult {
    const REQUIRED_FIELDS: &'static [&'static str] = &[
        fields::INFLUENCE_DESCRIPTION,
        fields::RESULTING_TYPE,
        fields::RESULTING_STRENGTH,
    ];

    fn from_record(record: &Map<String, Value>) -> Result<Self, ParseFailure> {
        let description = required_text(record, fields::INFLUENCE_DESCRIPTION)?;
        let resulting_type = required_resonance_type(record, fields::RESULTING_TYPE)?;
        let strength = required_unit_interval(record, fields::RESULTING_STRENGTH)?;
        AnalysisResult::new(description, resulting_type, strength)
    }
}

/// Parse raw model output into `T`
///
/// # Errors
/// - `ParseFailure::Malformed` if the body is not a JSON object
/// - `ParseFailure::MissingField` for the first absent or null required key
/// - `ParseFailure::InvalidValue` if a value violates the schema
pub fn parse_structured<T: StructuredRecord>(raw: &str) -> Result<T, ParseFailure> {
    let body = strip_formatting(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ParseFailure::malformed(format!("not valid JSON: {e}")))?;
    parse_value(&value)
}

/// Validate an already-decoded JSON value as `T`
///
/// # Errors
/// Same as [`parse_structured`], minus JSON syntax errors.
pub fn parse_value<T: StructuredRecord>(value: &Value) -> Result<T, ParseFailure> {
    let Value::Object(record) = value else {
        return Err(ParseFailure::malformed(format!(
            "expected a JSON object, found {}",
            type_name(value)
        )));
    };

    for &field in T::REQUIRED_FIELDS {
        lookup(record, field)?;
    }

    T::from_record(record)
}

/// Remove surrounding whitespace and a markdown code fence, if present
///
/// Handles both the multi-line form (```` ```json\n{...}\n``` ````) and the
/// single-line form (```` ```{...}``` ````).
#[must_use]
pub fn strip_formatting(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (`json`, `JSON`, ...)
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn lookup<'a>(record: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, ParseFailure> {
    match record.get(field) {
        None | Some(Value::Null) => Err(ParseFailure::MissingField { field }),
        Some(value) => Ok(value),
    }
}

fn required_text(record: &Map<String, Value>, field: &'static str) -> Result<String, ParseFailure> {
    match lookup(record, field)? {
        Value::String(text) if text.trim().is_empty() => {
            Err(ParseFailure::invalid(field, "must not be blank"))
        }
        Value::String(text) => Ok(text.clone()),
        other => Err(ParseFailure::invalid(
            field,
            format!("expected a string, found {}", type_name(other)),
        )),
    }
}

fn required_resonance_type(
    record: &Map<String, Value>,
    field: &'static str,
) -> Result<ResonanceType, ParseFailure> {
    match lookup(record, field)? {
        Value::String(token) => token
            .parse()
            .map_err(|e: schema::UnknownResonanceType| ParseFailure::invalid(field, e.to_string())),
        other => Err(ParseFailure::invalid(
            field,
            format!("expected a string, found {}", type_name(other)),
        )),
    }
}

fn required_unit_interval(record: &Map<String, Value>, field: &'static str) -> Result<f64, ParseFailure> {
    let value = lookup(record, field)?;
    let Some(number) = value.as_f64() else {
        return Err(ParseFailure::invalid(
            field,
            format!("expected a number, found {}", type_name(value)),
        ));
    };
    schema::check_strength(number)?;
    Ok(number)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    const LABEL: &str = r#"{
        "influence_description": "C turns the quiet into something tangible.",
        "resulting_type": "CONTRAST",
        "resulting_strength": 0.4
    }"#;

    #[test]
    fn strip_plain_body() {
        assert_eq!(strip_formatting("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fenced_body() {
        assert_eq!(strip_formatting("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_formatting("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
        assert_eq!(strip_formatting("```json {\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_formatting("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn parses_label() {
        let label: AnalysisResult = parse_structured(LABEL).unwrap();
        assert_eq!(label.resulting_type(), ResonanceType::Contrast);
        assert_eq!(label.resulting_strength(), 0.4);
        assert_eq!(
            label.influence_description(),
            "C turns the quiet into something tangible."
        );
    }

    #[test]
    fn parses_fenced_label() {
        let fenced = format!("```json\n{LABEL}\n```");
        assert!(parse_structured::<AnalysisResult>(&fenced).is_ok());
    }

    #[test]
    fn parses_triad() {
        let triad: Triad =
            parse_structured(r#"{"fragment_a": "x", "fragment_b": "y", "fragment_c": "z"}"#).unwrap();
        assert_eq!(triad, Triad::new("x", "y", "z"));
    }

    #[test]
    fn integer_strength_is_a_number() {
        let raw = r#"{"influence_description": "d", "resulting_type": "ECHO", "resulting_strength": 1}"#;
        let label: AnalysisResult = parse_structured(raw).unwrap();
        assert_eq!(label.resulting_strength(), 1.0);
    }

    #[test]
    fn ignores_unknown_keys() {
        let raw = r#"{"influence_description": "d", "resulting_type": "ECHO", "resulting_strength": 0.2, "notes": "x"}"#;
        assert!(parse_structured::<AnalysisResult>(raw).is_ok());
    }

    #[test]
    fn malformed_inputs() {
        for raw in ["", "C bridges A and B.", "{\"resulting_type\":", "[1, 2, 3]", "\"CONTRAST\""] {
            let err = parse_structured::<AnalysisResult>(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Malformed, "input: {raw:?}");
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let raw = r#"{"influence_description": null, "resulting_type": "ECHO", "resulting_strength": 0.2}"#;
        assert_eq!(
            parse_structured::<AnalysisResult>(raw).unwrap_err(),
            ParseFailure::MissingField {
                field: fields::INFLUENCE_DESCRIPTION
            }
        );
    }

    #[test]
    fn missing_fields_reported_before_invalid_values() {
        let raw = r#"{"influence_description": "", "resulting_type": "NOPE"}"#;
        assert_eq!(
            parse_structured::<AnalysisResult>(raw).unwrap_err(),
            ParseFailure::MissingField {
                field: fields::RESULTING_STRENGTH
            }
        );
    }

    #[test]
    fn string_strength_is_not_coerced() {
        let raw = r#"{"influence_description": "d", "resulting_type": "ECHO", "resulting_strength": "0.4"}"#;
        let err = parse_structured::<AnalysisResult>(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(err.field(), Some(fields::RESULTING_STRENGTH));
    }

    #[test]
    fn lowercase_type_is_not_coerced() {
        let raw = r#"{"influence_description": "d", "resulting_type": "echo", "resulting_strength": 0.4}"#;
        let err = parse_structured::<AnalysisResult>(raw).unwrap_err();
        assert_eq!(err.field(), Some(fields::RESULTING_TYPE));
    }

    #[test]
    fn blank_fragment_is_invalid() {
        let raw = r#"{"fragment_a": "x", "fragment_b": "  ", "fragment_c": "z"}"#;
        assert_eq!(
            parse_structured::<Triad>(raw).unwrap_err(),
            ParseFailure::invalid(fields::FRAGMENT_B, "must not be blank")
        );
    }

    #[test]
    fn non_string_fragment_is_invalid() {
        let raw = r#"{"fragment_a": "x", "fragment_b": 7, "fragment_c": "z"}"#;
        let err = parse_structured::<Triad>(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn parse_value_rejects_non_objects() {
        let err = parse_value::<AnalysisResult>(&Value::Bool(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }
}

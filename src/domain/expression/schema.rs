//! JSON schema validation for workflow outputs
//!
//! Covers the schema subset used by response schemas: `type` (with the
//! integer/number distinction), `properties`, `required`, `items` and
//! `enum`. Diagnostics name the violated path so callers can surface
//! actionable errors.

use serde_json::Value;

use crate::domain::DomainError;

/// Validate `data` against a JSON schema.
///
/// Returns the first violation found, with its path in the diagnostic.
pub fn validate_schema(data: &Value, schema: &Value) -> Result<(), DomainError> {
    validate_at(data, schema, "$")
}

fn validate_at(data: &Value, schema: &Value, path: &str) -> Result<(), DomainError> {
    let schema = match schema {
        Value::Object(map) => map,
        // A non-object schema (e.g. `true`) matches anything
        _ => return Ok(()),
    };

    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(data, expected) {
            return Err(DomainError::schema_validation(format!(
                "{}: expected {}, got {}",
                path,
                expected,
                actual_type(data)
            )));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(data) {
            return Err(DomainError::schema_validation(format!(
                "{}: value is not one of the allowed values",
                path
            )));
        }
    }

    if let Value::Object(object) = data {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    return Err(DomainError::schema_validation(format!(
                        "{}: missing required property '{}'",
                        path, name
                    )));
                }
            }
        }

        if let Some(Value::Object(properties)) = schema.get("properties") {
            for (name, property_schema) in properties {
                if let Some(value) = object.get(name) {
                    validate_at(value, property_schema, &format!("{}.{}", path, name))?;
                }
            }
        }
    }

    if let Value::Array(items) = data {
        if let Some(item_schema) = schema.get("items") {
            for (index, item) in items.iter().enumerate() {
                validate_at(item, item_schema, &format!("{}[{}]", path, index))?;
            }
        }
    }

    Ok(())
}

fn type_matches(data: &Value, expected: &str) -> bool {
    match expected {
        "object" => data.is_object(),
        "array" => data.is_array(),
        "string" => data.is_string(),
        "boolean" => data.is_boolean(),
        "null" => data.is_null(),
        "number" => data.is_number(),
        "integer" => match data {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false),
            _ => false,
        },
        _ => true,
    }
}

fn actual_type(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

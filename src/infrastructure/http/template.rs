//! `{name}` placeholder substitution
//!
//! URL paths, headers, query params and bodies are string templates.
//! Placeholders resolve from the per-call input first, then from
//! credentials; dotted names descend into nested input objects. A
//! placeholder with no value fails the call with a binding error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::workflow::Credentials;
use crate::domain::DomainError;

/// Placeholder syntax: `{name}` with dots for nested access. JSON braces
/// never match because quotes and colons are not name characters.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-zA-Z0-9_][a-zA-Z0-9_.-]*)\}").unwrap());

/// Substitute every placeholder in `template`.
pub fn render_template(
    template: &str,
    input: &Value,
    credentials: &Credentials,
) -> Result<String, DomainError> {
    let mut result = String::with_capacity(template.len());
    let mut last_end = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let full = caps.get(0).unwrap();
        let name = caps.get(1).unwrap().as_str();

        let replacement = resolve(name, input, credentials).ok_or_else(|| {
            DomainError::binding(format!("placeholder '{}' has no value", name))
        })?;

        result.push_str(&template[last_end..full.start()]);
        result.push_str(&replacement);
        last_end = full.end();
    }

    result.push_str(&template[last_end..]);
    Ok(result)
}

/// True if the template contains any placeholder
pub fn has_placeholders(template: &str) -> bool {
    PLACEHOLDER.is_match(template)
}

fn resolve(name: &str, input: &Value, credentials: &Credentials) -> Option<String> {
    if let Some(value) = lookup_path(input, name) {
        return Some(value_to_string(value));
    }

    credentials.get(name).cloned()
}

fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(part)?,
            Value::Array(items) => {
                let index: usize = part.parse().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

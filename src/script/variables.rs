//! `${name}` substitution over step text fields.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("VARIABLE_RE is valid"));

/// Script variables keyed by name
pub type Variables = HashMap<String, Value>;

/// Replace every `${name}` with the variable's string form.
///
/// String values are inserted without quotes; other JSON values use their
/// JSON rendering. Unknown names are left as written.
pub fn substitute(text: &str, variables: &Variables) -> String {
    if variables.is_empty() || !text.contains("${") {
        return text.to_string();
    }
    VARIABLE_RE
        .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

pub fn substitute_opt(text: Option<&str>, variables: &Variables) -> Option<String> {
    text.map(|t| substitute(t, variables))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! `${VAR}` / `${VAR:default}` interpolation through configuration documents.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn token_regex() -> Option<&'static Regex> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::([^}]*))?\}").ok())
        .as_ref()
}

/// Interpolate tokens from the process environment.
pub fn expand_env(value: &Value) -> Value {
    expand_env_with(value, &|name| std::env::var(name).ok())
}

/// Interpolate tokens using `lookup`.
///
/// Strings in arrays and nested objects are expanded; keys are not. A
/// variable that is unset or empty takes its default, or the empty string
/// when there is none.
pub fn expand_env_with<F>(value: &Value, lookup: &F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => Value::String(expand_str(s, lookup)),
        Value::Array(items) => Value::Array(items.iter().map(|v| expand_env_with(v, lookup)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand_env_with(v, lookup)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Interpolate tokens in a single string.
pub fn expand_str<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Some(re) = token_regex() else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &Captures<'_>| {
        lookup(&caps[1])
            .filter(|v| !v.is_empty())
            .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
            .unwrap_or_default()
    })
    .into_owned()
}

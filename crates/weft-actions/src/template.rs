//! `${key}` placeholder resolution for step parameters.
//!
//! Before an action runs, string parameters are resolved against the step
//! context. A string that is exactly one placeholder (`"${fetch}"`) is
//! replaced by the context value itself, preserving structure; placeholders
//! embedded in longer strings are spliced in as text. Unknown keys are left
//! untouched so the failure surfaces where the value is consumed.

use weft_core::types::StepContext;

/// Resolve placeholders in a parameter value, recursively.
pub fn interpolate(value: &serde_json::Value, context: &StepContext) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => interpolate_str(s, context),
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items.iter().map(|v| interpolate(v, context)).collect(),
        ),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn interpolate_str(input: &str, context: &StepContext) -> serde_json::Value {
    // Whole-string placeholder keeps the value's JSON structure
    if let Some(key) = whole_placeholder(input) {
        if let Some(value) = context.get(key) {
            return value.clone();
        }
        return serde_json::Value::String(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut key = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                key.push(c);
            }
            match context.get(&key) {
                Some(serde_json::Value::String(s)) => result.push_str(s),
                Some(other) => result.push_str(&other.to_string()),
                None => {
                    result.push_str(&format!("${{{}}}", key));
                }
            }
        } else {
            result.push(c);
        }
    }

    serde_json::Value::String(result)
}

fn whole_placeholder(input: &str) -> Option<&str> {
    let inner = input.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains('}') || inner.contains("${") {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context() -> StepContext {
        let mut ctx = HashMap::new();
        ctx.insert("query".into(), serde_json::json!("rust async"));
        ctx.insert("fetch".into(), serde_json::json!({"docs": [1, 2]}));
        ctx.insert("count".into(), serde_json::json!(5));
        ctx
    }

    #[test]
    fn test_whole_placeholder_keeps_structure() {
        let resolved = interpolate(&serde_json::json!("${fetch}"), &context());
        assert_eq!(resolved, serde_json::json!({"docs": [1, 2]}));
    }

    #[test]
    fn test_embedded_placeholder_splices_text() {
        let resolved = interpolate(&serde_json::json!("Searching for: ${query}"), &context());
        assert_eq!(resolved, serde_json::json!("Searching for: rust async"));
    }

    #[test]
    fn test_non_string_value_rendered_as_json() {
        let resolved = interpolate(&serde_json::json!("got ${count} results"), &context());
        assert_eq!(resolved, serde_json::json!("got 5 results"));
    }

    #[test]
    fn test_unknown_key_left_untouched() {
        let resolved = interpolate(&serde_json::json!("${missing} and ${query}"), &context());
        assert_eq!(resolved, serde_json::json!("${missing} and rust async"));
    }

    #[test]
    fn test_recurses_into_objects_and_arrays() {
        let params = serde_json::json!({
            "prompt": "about ${query}",
            "inputs": ["${fetch}", "literal"],
        });
        let resolved = interpolate(&params, &context());

        assert_eq!(resolved["prompt"], serde_json::json!("about rust async"));
        assert_eq!(resolved["inputs"][0], serde_json::json!({"docs": [1, 2]}));
        assert_eq!(resolved["inputs"][1], serde_json::json!("literal"));
    }

    #[test]
    fn test_numbers_pass_through() {
        let resolved = interpolate(&serde_json::json!(42), &context());
        assert_eq!(resolved, serde_json::json!(42));
    }
}

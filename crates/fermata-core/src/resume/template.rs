//! API resume response template resolution.
//!
//! A trigger-style wait block may declare a response template returned to the
//! API caller instead of the raw execution result. String leaves carry
//! `<api.field>` placeholders resolved against the resume payload and
//! `<execution.*>` placeholders resolved against contextual values.

use serde_json::{Map, Value};

/// Contextual values available to `<execution.*>` placeholders.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub execution_id: String,
    pub resume_url: String,
}

/// Resolve a template body against the resume payload and context.
///
/// A string leaf that is exactly one placeholder substitutes the raw JSON
/// value (so `"<api.amount>"` stays a number); placeholders embedded in
/// longer strings substitute their string rendering. Unknown placeholders
/// are left as-is.
pub fn resolve(body: &Value, payload: &Map<String, Value>, ctx: &TemplateContext) -> Value {
    match body {
        Value::String(s) => resolve_string(s, payload, ctx),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve(v, payload, ctx)).collect())
        }
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), resolve(v, payload, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, payload: &Map<String, Value>, ctx: &TemplateContext) -> Value {
    // Whole-string placeholder keeps the payload value's JSON type.
    if let Some(value) = lookup(whole_placeholder(s), payload, ctx) {
        return value;
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        match after.find('>') {
            Some(end) => {
                let name = &after[1..end];
                match lookup(Some(name), payload, ctx) {
                    Some(value) => out.push_str(&render(&value)),
                    None => out.push_str(&after[..=end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(after);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

fn whole_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('<')?.strip_suffix('>')?;
    if inner.contains('<') || inner.contains('>') {
        return None;
    }
    Some(inner)
}

fn lookup(name: Option<&str>, payload: &Map<String, Value>, ctx: &TemplateContext) -> Option<Value> {
    let name = name?;
    if let Some(field) = name.strip_prefix("api.") {
        return payload.get(field).cloned();
    }
    match name {
        "execution.id" => Some(Value::String(ctx.execution_id.clone())),
        "execution.resume_url" => Some(Value::String(ctx.resume_url.clone())),
        _ => None,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

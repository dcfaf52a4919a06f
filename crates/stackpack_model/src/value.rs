//! Plain nested-value helpers shared by every container.
//!
//! Template content is kept as [`serde_yaml::Value`] so that ordering and
//! short-form intrinsic tags (`!Ref`, `!GetAtt`, ...) survive a round trip.
//! The first level of every item is an [`IndexMap`] keyed by string so that
//! removal can preserve insertion order.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::error::{ModelError, ModelResult};

/// First-level body of a dict-like section item.
pub type Body = IndexMap<String, Value>;

/// Truthiness of a plain value: null, `false`, zero, empty strings and empty
/// collections are false; everything else, including tagged values, is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(_) => true,
    }
}

/// The key as a string, if it is one.
///
/// Numeric and boolean keys are refused so they are never written back as
/// strings.
pub fn key_to_string(key: &Value) -> Option<String> {
    key.as_str().map(str::to_string)
}

/// Convert a YAML mapping into a string-keyed body.
pub fn mapping_to_body(mapping: Mapping, context: &str) -> ModelResult<Body> {
    let mut body = Body::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = key_to_string(&key)
            .ok_or_else(|| ModelError::NotAMapping(format!("{context} (non-string key)")))?;
        body.insert(key, value);
    }
    Ok(body)
}

/// Convert a body back into a plain YAML mapping value.
pub fn body_to_value(body: &Body) -> Value {
    let mut mapping = Mapping::with_capacity(body.len());
    for (key, value) in body {
        mapping.insert(Value::String(key.clone()), value.clone());
    }
    Value::Mapping(mapping)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Mapping(map) => map.get_mut(segment),
        Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get_mut(i)),
        _ => None,
    }
}

/// Resolve a dotted property path (`Properties.Layers.0`) against a value.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |current, segment| child(current, segment))
}

pub fn lookup_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    segments(path).try_fold(root, |current, segment| child_mut(current, segment))
}

/// Resolve a dotted property path against an item body.
pub fn lookup_in_body<'a>(body: &'a Body, path: &str) -> Option<&'a Value> {
    let mut parts = segments(path);
    let first = body.get(parts.next()?)?;
    parts.try_fold(first, |current, segment| child(current, segment))
}

/// Replace the value at `path` inside `body`.
///
/// Every segment of the path, including the last one, must already exist.
/// Returns `Ok(false)` when the current value already equals `value`.
pub fn set_in_body(body: &mut Body, path: &str, value: Value) -> ModelResult<bool> {
    let invalid = |reason: &str| ModelError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = segments(path);
    let first = parts.next().ok_or_else(|| invalid("empty path"))?;
    let mut current = body
        .get_mut(first)
        .ok_or_else(|| invalid(&format!("missing key '{first}'")))?;
    for segment in parts {
        current =
            child_mut(current, segment).ok_or_else(|| invalid(&format!("missing segment '{segment}'")))?;
    }

    if *current == value {
        return Ok(false);
    }
    *current = value;
    Ok(true)
}

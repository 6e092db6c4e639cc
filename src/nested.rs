// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Helpers for schema-agnostic JSON documents.
//!
//! Backing services, workloads and CRDs are handled as `serde_json::Value`
//! documents. These helpers walk dot-separated paths with an explicit
//! distinction between a missing field (tolerated by most callers) and a field
//! of the wrong type (always an error), merge documents and flatten them into
//! `_`-joined keys.

use crate::binding_errors::PathError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How arrays are combined by [`merge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Source values replace destination values, arrays included.
    Override,
    /// Source arrays are appended to destination arrays; scalars are replaced.
    AppendArrays,
}

/// Split a dot-separated path into its segments.
///
/// Surrounding braces and a leading dot are ignored, so `{.status.url}`,
/// `.status.url` and `status.url` are equivalent.
#[must_use]
pub fn split_path(path: &str) -> Vec<&str> {
    path.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split('.')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Walk `path` in `root`.
///
/// # Errors
///
/// Returns [`PathError::NotFound`] when a segment is missing and
/// [`PathError::WrongType`] when an intermediate value is a scalar.
pub fn get<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    let mut current = root;
    let mut walked = String::new();

    for segment in split_path(path) {
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(segment);

        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(|| PathError::NotFound {
                path: walked.clone(),
            })?,
            Value::Array(items) => {
                let index: usize = segment.parse().map_err(|_| PathError::WrongType {
                    path: walked.clone(),
                    expected: "an array index",
                })?;
                items.get(index).ok_or_else(|| PathError::NotFound {
                    path: walked.clone(),
                })?
            }
            Value::Null => {
                return Err(PathError::NotFound {
                    path: walked.clone(),
                })
            }
            _ => {
                return Err(PathError::WrongType {
                    path: walked.clone(),
                    expected: "an object",
                })
            }
        };
    }

    Ok(current)
}

/// Like [`get`], but a missing field yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`PathError::WrongType`] when an intermediate value is a scalar.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Result<Option<&'a Value>, PathError> {
    match get(root, path) {
        Ok(value) => Ok(Some(value)),
        Err(PathError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Mutable walk of `path`; missing fields yield `None`.
pub fn get_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in split_path(path) {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set `value` at `path`, creating intermediate objects as needed.
///
/// Intermediate scalars are replaced by objects. An empty path replaces the root.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let segments = split_path(path);
    set_segments(root, &segments, value);
}

/// Set `value` at the given path segments, creating intermediate objects as needed.
pub fn set_segments<S: AsRef<str>>(root: &mut Value, segments: &[S], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        current = ensure_object(current)
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert(last.as_ref().to_string(), value);
}

/// Remove the value at `path`, returning it if present.
pub fn remove(root: &mut Value, path: &str) -> Option<Value> {
    let segments = split_path(path);
    let (last, parents) = segments.split_last()?;
    let parent = get_mut(root, &parents.join("."))?;
    parent.as_object_mut()?.remove(*last)
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

/// Deep-merge `src` into `dst`.
///
/// Objects are merged key by key. Arrays are replaced or appended according to
/// `strategy`. Any other source value replaces the destination value.
pub fn merge(dst: &mut Value, src: Value, strategy: MergeStrategy) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (key, src_value) in src_map {
                match dst_map.get_mut(&key) {
                    Some(dst_value) => merge(dst_value, src_value, strategy),
                    None => {
                        dst_map.insert(key, src_value);
                    }
                }
            }
        }
        (Value::Array(dst_items), Value::Array(src_items))
            if strategy == MergeStrategy::AppendArrays =>
        {
            dst_items.extend(src_items);
        }
        (dst, src) => *dst = src,
    }
}

/// Natural string form of a scalar: strings verbatim, numbers and booleans
/// formatted, null as the empty string. Composite values are rendered as JSON.
#[must_use]
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Flatten a document into `_`-joined keys.
///
/// Object keys and array indexes become key segments; empty `prefixes` are
/// skipped. Leaves are converted with [`scalar_to_string`].
///
/// ```
/// use service_binding_operator::nested::flatten;
/// use serde_json::json;
///
/// let flat = flatten(&json!({"status": {"hosts": ["a", "b"]}}), &["db"]);
/// assert_eq!(flat["db_status_hosts_0"], "a");
/// assert_eq!(flat["db_status_hosts_1"], "b");
/// ```
#[must_use]
pub fn flatten<S: AsRef<str>>(value: &Value, prefixes: &[S]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let path: Vec<String> = prefixes
        .iter()
        .map(|p| p.as_ref().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    flatten_into(value, path, &mut out);
    out
}

fn flatten_into(value: &Value, path: Vec<String>, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let mut child_path = path.clone();
                child_path.push(key.clone());
                flatten_into(child, child_path, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let mut child_path = path.clone();
                child_path.push(index.to_string());
                flatten_into(child, child_path, out);
            }
        }
        leaf => {
            out.insert(path.join("_"), scalar_to_string(leaf));
        }
    }
}

#[cfg(test)]
#[path = "nested_tests.rs"]
mod nested_tests;

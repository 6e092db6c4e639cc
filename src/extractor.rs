// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Value extraction for binding directives.
//!
//! Given a parsed [`BindingInfo`] and the backing-service object it was found on,
//! the extractor resolves the referenced field, dereferences a Secret or
//! ConfigMap when the directive says so, and returns the result twice:
//!
//! - `data`: the env contribution, later flattened into binding keys
//! - `raw_data`: the same values nested at the original reference path, merged
//!   into the service object copy used by custom variable templates
//!
//! Missing fields are tolerated: an attribute resolves to an empty string and an
//! object reference contributes nothing. A referenced Secret or ConfigMap that
//! does not exist is an error.

use crate::annotations::{AnnotationForm, BindAs, BindingInfo, ObjectType};
use crate::binding_errors::BindingError;
use crate::constants::{KIND_CONFIG_MAP, KIND_SECRET};
use crate::nested::{self, scalar_to_string};
use crate::resources::{config_map_resource, secret_resource, ResourceClient};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Output of a single directive.
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    /// Env contribution, a nested object.
    pub data: Value,
    /// Values nested at the directive's reference path.
    pub raw_data: Value,
    /// Secret values that are not valid UTF-8, keyed by their flattened path
    /// in `data`. `data` only holds a lossy rendering of them.
    pub binary_data: BTreeMap<String, Vec<u8>>,
    pub bind_as: BindAs,
}

impl Extraction {
    fn empty(bind_as: BindAs) -> Self {
        Self {
            data: json!({}),
            raw_data: json!({}),
            binary_data: BTreeMap::new(),
            bind_as,
        }
    }
}

/// Run a directive against `object`.
///
/// `namespace` is where referenced Secrets and ConfigMaps are looked up.
///
/// # Errors
///
/// - [`BindingError::Path`] when the reference path crosses a non-object value
/// - [`BindingError::NotFound`] when a referenced Secret or ConfigMap is missing
/// - [`BindingError::KeyNotFound`] when an explicitly requested key is absent
/// - [`BindingError::Decode`] when a Secret value is not valid base64
pub async fn extract(
    client: &dyn ResourceClient,
    info: &BindingInfo,
    object: &Value,
    namespace: &str,
) -> Result<Extraction, BindingError> {
    match info.object_type {
        ObjectType::Attribute => extract_attribute(info, object),
        ObjectType::Secret | ObjectType::ConfigMap => {
            extract_object(client, info, object, namespace).await
        }
    }
}

/// Strip a leading `status.` or `spec.` segment.
#[must_use]
pub fn strip_root(path: &str) -> &str {
    path.strip_prefix("status.")
        .or_else(|| path.strip_prefix("spec."))
        .unwrap_or(path)
}

fn extract_attribute(info: &BindingInfo, object: &Value) -> Result<Extraction, BindingError> {
    let input_path = match info.form {
        AnnotationForm::Legacy if info.has_subfield() => {
            format!("{}.{}", info.resource_reference_path, info.source_path)
        }
        _ => info.resource_reference_path.clone(),
    };

    let value = match nested::lookup(object, &input_path)? {
        Some(value) => value.clone(),
        None => {
            debug!(path = %input_path, "Attribute not present, binding empty value");
            Value::String(String::new())
        }
    };

    let output_path = match info.form {
        AnnotationForm::Legacy => strip_root(&input_path).to_string(),
        AnnotationForm::Structured => info.exposed_key().to_string(),
    };

    // Legacy output paths keep their nesting (`dbConnection.host`); a structured
    // sourceKey is a single key even if it contains dots.
    let mut data = json!({});
    match info.form {
        AnnotationForm::Legacy => nested::set(&mut data, &output_path, value.clone()),
        AnnotationForm::Structured => {
            nested::set_segments(&mut data, &[output_path.as_str()], value.clone());
        }
    }

    let mut raw_data = json!({});
    nested::set(&mut raw_data, &input_path, value);

    Ok(Extraction {
        data,
        raw_data,
        binary_data: BTreeMap::new(),
        bind_as: info.bind_as,
    })
}

async fn extract_object(
    client: &dyn ResourceClient,
    info: &BindingInfo,
    object: &Value,
    namespace: &str,
) -> Result<Extraction, BindingError> {
    let reference = nested::lookup(object, &info.resource_reference_path)?
        .map(scalar_to_string)
        .unwrap_or_default();
    if reference.is_empty() {
        debug!(
            path = %info.resource_reference_path,
            "Object reference not present, skipping"
        );
        return Ok(Extraction::empty(info.bind_as));
    }

    let entries = read_object_data(client, info.object_type, namespace, &reference).await?;
    let (kind, group_key) = match info.object_type {
        ObjectType::ConfigMap => (KIND_CONFIG_MAP, "configmap"),
        _ => (KIND_SECRET, "secret"),
    };
    let key_not_found = |key: &str| BindingError::KeyNotFound {
        key: key.to_string(),
        kind: kind.to_string(),
        name: reference.clone(),
    };

    let selected: BTreeMap<String, Vec<u8>> = match info.form {
        AnnotationForm::Legacy if info.has_subfield() => {
            let value = entries
                .get(&info.source_path)
                .ok_or_else(|| key_not_found(&info.source_path))?;
            BTreeMap::from([(info.source_path.clone(), value.clone())])
        }
        AnnotationForm::Legacy => entries,
        AnnotationForm::Structured => match &info.source_key {
            Some(key) => {
                let value = entries.get(key).ok_or_else(|| key_not_found(key))?;
                BTreeMap::from([(key.clone(), value.clone())])
            }
            None => match entries.get(&info.name) {
                Some(value) => BTreeMap::from([(info.name.clone(), value.clone())]),
                None => entries,
            },
        },
    };

    let text = text_entries(&selected);
    let binary = binary_entries(&selected);
    let (data, binary_data) = match info.form {
        AnnotationForm::Legacy => (
            Value::Object(single(group_key, Value::Object(text.clone()))),
            binary
                .into_iter()
                .map(|(key, bytes)| (format!("{group_key}_{key}"), bytes))
                .collect(),
        ),
        AnnotationForm::Structured => (Value::Object(text.clone()), binary),
    };

    let mut raw_data = json!({});
    nested::set(
        &mut raw_data,
        &info.resource_reference_path,
        Value::Object(text),
    );

    Ok(Extraction {
        data,
        raw_data,
        binary_data,
        bind_as: info.bind_as,
    })
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Read the `data` of a Secret or ConfigMap.
///
/// Secret values are base64-decoded.
///
/// # Errors
///
/// Returns [`BindingError::NotFound`] if the object does not exist and
/// [`BindingError::Decode`] for invalid Secret values.
pub async fn read_object_data(
    client: &dyn ResourceClient,
    object_type: ObjectType,
    namespace: &str,
    name: &str,
) -> Result<BTreeMap<String, Vec<u8>>, BindingError> {
    let resource = match object_type {
        ObjectType::ConfigMap => config_map_resource(),
        _ => secret_resource(),
    };
    let object = client.get(&resource, Some(namespace), name).await?;
    let decode = object_type == ObjectType::Secret;
    data_entries(&object, decode, name)
}

/// Entries of an object's `data` as bytes, base64-decoding them when `decode` is set.
///
/// # Errors
///
/// Returns [`BindingError::Decode`] for values that are not valid base64.
pub fn data_entries(
    object: &Value,
    decode: bool,
    name: &str,
) -> Result<BTreeMap<String, Vec<u8>>, BindingError> {
    let mut entries = BTreeMap::new();
    let Some(data) = object["data"].as_object() else {
        return Ok(entries);
    };

    for (key, value) in data {
        let raw = scalar_to_string(value);
        let bytes = if decode {
            STANDARD
                .decode(raw.as_bytes())
                .map_err(|source| BindingError::Decode {
                    key: key.clone(),
                    name: name.to_string(),
                    source,
                })?
        } else {
            raw.into_bytes()
        };
        entries.insert(key.clone(), bytes);
    }

    Ok(entries)
}

/// Text rendering of data entries; invalid UTF-8 is replaced.
#[must_use]
pub fn text_entries(entries: &BTreeMap<String, Vec<u8>>) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, bytes)| {
            (
                key.clone(),
                Value::String(String::from_utf8_lossy(bytes).into_owned()),
            )
        })
        .collect()
}

/// The entries whose bytes are not valid UTF-8.
#[must_use]
pub fn binary_entries(entries: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, Vec<u8>> {
    entries
        .iter()
        .filter(|(_, bytes)| std::str::from_utf8(bytes).is_err())
        .map(|(key, bytes)| (key.clone(), bytes.clone()))
        .collect()
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod extractor_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Intermediary Secret/ConfigMap management.
//!
//! The merged binding data is stored in an object named like the
//! `ServiceBinding`, in its namespace, controller-owned by it. Applications
//! reference that object through `envFrom` and volumes.

use crate::binding_errors::BindingError;
use crate::crd::{IntermediaryKind, ServiceBinding};
use crate::envvars::BindingData;
use crate::labels::{
    BINDING_NAMESPACE_ANNOTATION, BINDING_NAME_ANNOTATION, K8S_MANAGED_BY, K8S_PART_OF,
    MANAGED_BY_SERVICE_BINDING, PART_OF_SERVICE_BINDING_OPERATOR,
};
use crate::metrics;
use crate::resources::{config_map_resource, secret_resource, ResourceClient};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::ApiResource;
use kube::ResourceExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// API resource of the intermediary kind.
#[must_use]
pub fn intermediary_resource(kind: IntermediaryKind) -> ApiResource {
    match kind {
        IntermediaryKind::Secret => secret_resource(),
        IntermediaryKind::ConfigMap => config_map_resource(),
    }
}

/// Build the intermediary object for `binding` holding `data`.
///
/// # Errors
///
/// Returns [`BindingError::Serialization`] if the object cannot be serialized.
pub fn build_intermediary(binding: &ServiceBinding, data: &BindingData) -> Result<Value, BindingError> {
    let namespace = binding.namespace().unwrap_or_default();
    let name = binding.name_any();

    let metadata = ObjectMeta {
        name: Some(name.clone()),
        namespace: Some(namespace.clone()),
        labels: Some(BTreeMap::from([
            (K8S_MANAGED_BY.to_string(), MANAGED_BY_SERVICE_BINDING.to_string()),
            (
                K8S_PART_OF.to_string(),
                PART_OF_SERVICE_BINDING_OPERATOR.to_string(),
            ),
        ])),
        annotations: Some(BTreeMap::from([
            (BINDING_NAMESPACE_ANNOTATION.to_string(), namespace),
            (BINDING_NAME_ANNOTATION.to_string(), name),
        ])),
        owner_references: Some(vec![binding.owner_reference()]),
        ..Default::default()
    };

    let mut object = match binding.spec.intermediary_kind {
        IntermediaryKind::Secret => serde_json::to_value(Secret {
            metadata,
            data: Some(
                data.env_vars
                    .iter()
                    .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                    .collect(),
            ),
            ..Default::default()
        })?,
        IntermediaryKind::ConfigMap => {
            // ConfigMap `data` only holds UTF-8; other values go to `binaryData`.
            let mut text = BTreeMap::new();
            let mut binary = BTreeMap::new();
            for (key, value) in &data.env_vars {
                match String::from_utf8(value.clone()) {
                    Ok(value) => {
                        text.insert(key.clone(), value);
                    }
                    Err(e) => {
                        binary.insert(key.clone(), ByteString(e.into_bytes()));
                    }
                }
            }
            serde_json::to_value(ConfigMap {
                metadata,
                data: Some(text),
                binary_data: (!binary.is_empty()).then_some(binary),
                ..Default::default()
            })?
        }
    };

    object["apiVersion"] = json!("v1");
    object["kind"] = json!(binding.spec.intermediary_kind.kind());
    Ok(object)
}

/// Create the intermediary object, or update it when its data changed.
///
/// Returns the object as stored by the API server.
///
/// # Errors
///
/// Returns API errors, including [`BindingError::Conflict`] when the object
/// changed between read and update.
pub async fn commit(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
    data: &BindingData,
) -> Result<Value, BindingError> {
    let resource = intermediary_resource(binding.spec.intermediary_kind);
    let namespace = binding.namespace().unwrap_or_default();
    let name = binding.name_any();
    let desired = build_intermediary(binding, data)?;

    match client.create(&resource, &namespace, &desired).await {
        Ok(created) => {
            info!(
                kind = %resource.kind,
                namespace = %namespace,
                name = %name,
                keys = data.env_vars.len(),
                "Created intermediary object"
            );
            metrics::record_resource_created(&resource.kind);
            return Ok(created);
        }
        Err(BindingError::AlreadyExists { .. }) => {}
        Err(e) => return Err(e),
    }

    let mut existing = client.get(&resource, Some(&namespace), &name).await?;
    if payload_of(&existing) == payload_of(&desired) {
        debug!(
            kind = %resource.kind,
            namespace = %namespace,
            name = %name,
            "Intermediary object up to date"
        );
        return Ok(existing);
    }

    existing["data"] = field_of(&desired, "data");
    match desired.get("binaryData") {
        Some(binary) => existing["binaryData"] = binary.clone(),
        None => {
            if let Some(map) = existing.as_object_mut() {
                map.remove("binaryData");
            }
        }
    }
    existing["metadata"]["labels"] = desired["metadata"]["labels"].clone();
    existing["metadata"]["annotations"] = desired["metadata"]["annotations"].clone();
    existing["metadata"]["ownerReferences"] = desired["metadata"]["ownerReferences"].clone();

    let updated = client.update(&resource, &namespace, &existing).await?;
    info!(
        kind = %resource.kind,
        namespace = %namespace,
        name = %name,
        keys = data.env_vars.len(),
        "Updated intermediary object"
    );
    metrics::record_resource_updated(&resource.kind);
    Ok(updated)
}

/// Delete the intermediary object of `binding`. A missing object is not an error.
///
/// # Errors
///
/// Returns API errors other than not-found.
pub async fn delete_intermediary(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
) -> Result<(), BindingError> {
    let resource = intermediary_resource(binding.spec.intermediary_kind);
    let namespace = binding.namespace().unwrap_or_default();
    let name = binding.name_any();
    match client.delete(&resource, &namespace, &name).await {
        Ok(()) => {
            info!(kind = %resource.kind, namespace = %namespace, name = %name, "Deleted intermediary object");
            metrics::record_resource_deleted(&resource.kind);
            Ok(())
        }
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

fn field_of(object: &Value, field: &str) -> Value {
    match object.get(field) {
        Some(Value::Null) | None => json!({}),
        Some(data) => data.clone(),
    }
}

/// The stored key/value payload: `data` and, for ConfigMaps, `binaryData`.
fn payload_of(object: &Value) -> (Value, Value) {
    (field_of(object, "data"), field_of(object, "binaryData"))
}

#[cfg(test)]
#[path = "intermediary_tests.rs"]
mod intermediary_tests;

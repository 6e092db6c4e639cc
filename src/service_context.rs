// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service context builder.
//!
//! Turns each [`RelatedResource`] of a [`Plan`] into a [`ServiceContext`]: the
//! binding data contributed by the backing service, ready to be materialized
//! into keys.
//!
//! Directives are layered with later sources winning on equal keys:
//!
//! 1. OLM descriptors from the `CRDDescription`
//! 2. annotations on the CRD
//! 3. annotations on the custom resource itself
//!
//! With owned-resource detection enabled, every ConfigMap, Secret, Service and
//! Route owned by the custom resource contributes a context of its own.

use crate::annotations::{self, BindAs};
use crate::binding_errors::{AnnotationError, BindingError};
use crate::extractor::{self, binary_entries, data_entries, text_entries};
use crate::nested::{self, flatten, MergeStrategy};
use crate::planner::{descriptor_annotations, Plan, RelatedResource};
use crate::resources::{
    config_map_resource, object_gvk, object_name, object_uid, route_resource, secret_resource,
    service_resource, ResourceClient,
};
use kube::api::ApiResource;
use kube::core::GroupVersionKind;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Binding data contributed by one backing-service object.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceContext {
    /// Copy of the object with extracted values merged in, used by templates.
    pub service: Value,
    pub gvk: GroupVersionKind,
    pub name: String,
    pub namespace: String,
    /// Nested env contribution, flattened into keys by the materializer.
    pub env_vars: Value,
    /// Raw bytes of Secret values that are not valid UTF-8, keyed by their
    /// unprefixed flattened path in `env_vars`.
    pub binary_data: BTreeMap<String, Vec<u8>>,
    /// Flattened (unprefixed) keys that are also projected as files.
    pub volume_keys: Vec<String>,
    /// `None` prefixes keys with the kind; `Some("")` removes the prefix.
    pub env_var_prefix: Option<String>,
    pub id: Option<String>,
}

/// Kinds inspected for owned binding resources, and where their value lives.
struct OwnedKind {
    resource: fn() -> ApiResource,
    source: OwnedSource,
}

enum OwnedSource {
    /// The whole `data` map.
    Data { decode: bool },
    /// A single field exposed under `key`.
    Field { path: &'static str, key: &'static str },
}

const OWNED_KINDS: [OwnedKind; 4] = [
    OwnedKind {
        resource: config_map_resource,
        source: OwnedSource::Data { decode: false },
    },
    OwnedKind {
        resource: secret_resource,
        source: OwnedSource::Data { decode: true },
    },
    OwnedKind {
        resource: service_resource,
        source: OwnedSource::Field {
            path: "spec.clusterIP",
            key: "clusterIP",
        },
    },
    OwnedKind {
        resource: route_resource,
        source: OwnedSource::Field {
            path: "spec.host",
            key: "host",
        },
    },
];

/// Build the contexts of every related resource of `plan`, in selector order.
///
/// # Errors
///
/// Propagates extractor errors (missing referenced objects, wrong-type paths,
/// invalid directives) and API errors listing owned resources.
pub async fn build_service_contexts(
    client: &dyn ResourceClient,
    plan: &Plan,
    detect_binding_resources: bool,
) -> Result<Vec<ServiceContext>, BindingError> {
    let mut contexts = Vec::new();

    for related in &plan.related_resources {
        contexts.push(build_service_context(client, related).await?);

        if detect_binding_resources {
            contexts.extend(owned_resource_contexts(client, related).await?);
        }
    }

    Ok(contexts)
}

/// Layered binding directives for a related resource.
#[must_use]
pub fn collect_directives(related: &RelatedResource) -> BTreeMap<String, String> {
    let mut directives = BTreeMap::new();
    if let Some(description) = &related.crd_description {
        directives.extend(descriptor_annotations(description));
    }
    if let Some(crd) = &related.crd {
        directives.extend(object_annotations(crd));
    }
    directives.extend(object_annotations(&related.service));
    directives
}

fn object_annotations(object: &Value) -> BTreeMap<String, String> {
    object["metadata"]["annotations"]
        .as_object()
        .map(|annotations| {
            annotations
                .iter()
                .filter(|(k, _)| annotations::is_binding_annotation(k))
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Build the context of a single related resource.
///
/// # Errors
///
/// Returns extractor errors and non-soft annotation errors.
pub async fn build_service_context(
    client: &dyn ResourceClient,
    related: &RelatedResource,
) -> Result<ServiceContext, BindingError> {
    let mut service = related.service.clone();
    let mut env_vars = json!({});
    let mut binary_data: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut volume_keys = Vec::new();

    for (key, value) in collect_directives(related) {
        let info = match annotations::parse(&key, &value) {
            Ok(info) => info,
            Err(AnnotationError::InvalidPrefix { .. }) => continue,
            Err(e) => {
                let err = BindingError::from(e);
                if err.is_soft() {
                    warn!(annotation = %key, error = %err, "Skipping binding directive");
                    continue;
                }
                return Err(err);
            }
        };

        let extraction =
            extractor::extract(client, &info, &related.service, &related.namespace).await?;

        let paths = flatten(&extraction.data, &[] as &[&str]);
        binary_data.retain(|path, _| !paths.contains_key(path));
        binary_data.extend(extraction.binary_data);
        if extraction.bind_as == BindAs::VolumeMount {
            volume_keys.extend(paths.into_keys());
        }
        nested::merge(&mut service, extraction.raw_data, MergeStrategy::Override);
        nested::merge(&mut env_vars, extraction.data, MergeStrategy::AppendArrays);
    }

    volume_keys.sort();
    volume_keys.dedup();

    debug!(
        service = %object_name(&related.service),
        kind = %related.gvk.kind,
        volume_keys = volume_keys.len(),
        "Built service context"
    );

    Ok(ServiceContext {
        service,
        gvk: related.gvk.clone(),
        name: object_name(&related.service).to_string(),
        namespace: related.namespace.clone(),
        env_vars,
        binary_data,
        volume_keys,
        env_var_prefix: related.selector.env_var_prefix.clone(),
        id: related.selector.id.clone(),
    })
}

/// Contexts for the ConfigMaps, Secrets, Services and Routes owned by a related resource.
///
/// Kinds the cluster does not serve are skipped. Owned contexts inherit the
/// selector's prefix, or the parent's kind when the selector sets none.
///
/// # Errors
///
/// Returns API errors other than not-found, and Secret decode errors.
pub async fn owned_resource_contexts(
    client: &dyn ResourceClient,
    related: &RelatedResource,
) -> Result<Vec<ServiceContext>, BindingError> {
    let owner_uid = object_uid(&related.service);
    let prefix = related
        .selector
        .env_var_prefix
        .clone()
        .unwrap_or_else(|| related.gvk.kind.clone());
    let mut contexts = Vec::new();

    for owned_kind in &OWNED_KINDS {
        let resource = (owned_kind.resource)();
        let objects = match client
            .list(&resource, Some(&related.namespace), None)
            .await
        {
            Ok(objects) => objects,
            Err(e) if e.is_not_found() => {
                debug!(plural = %resource.plural, "Bindable resource kind not served, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };

        for object in objects.iter().filter(|o| is_owned_by(o, owner_uid)) {
            let name = object_name(object).to_string();
            let (env_vars, binary_data) = match owned_kind.source {
                OwnedSource::Data { decode } => {
                    let entries = data_entries(object, decode, &name)?;
                    (
                        Value::Object(text_entries(&entries)),
                        binary_entries(&entries),
                    )
                }
                OwnedSource::Field { path, key } => {
                    let mut map = Map::new();
                    if let Some(value) = nested::lookup(object, path)? {
                        map.insert(key.to_string(), value.clone());
                    }
                    (Value::Object(map), BTreeMap::new())
                }
            };

            debug!(
                owner = %object_name(&related.service),
                plural = %resource.plural,
                name = %name,
                "Found owned binding resource"
            );

            contexts.push(ServiceContext {
                service: object.clone(),
                gvk: object_gvk(object),
                name,
                namespace: related.namespace.clone(),
                env_vars,
                binary_data,
                volume_keys: Vec::new(),
                env_var_prefix: Some(prefix.clone()),
                id: None,
            });
        }
    }

    Ok(contexts)
}

fn is_owned_by(object: &Value, uid: &str) -> bool {
    !uid.is_empty()
        && object["metadata"]["ownerReferences"]
            .as_array()
            .is_some_and(|owners| owners.iter().any(|o| o["uid"].as_str() == Some(uid)))
}

#[cfg(test)]
#[path = "service_context_tests.rs"]
mod service_context_tests;

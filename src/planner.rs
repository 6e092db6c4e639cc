// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Binding planner.
//!
//! Resolves every backing-service selector of a `ServiceBinding` into a
//! [`RelatedResource`]: the custom resource itself, its CRD (when readable) and
//! the OLM `CRDDescription` describing it (when a `ClusterServiceVersion` in
//! the namespace owns the CRD).
//!
//! OLM descriptors are an alternate source of binding directives. They are
//! converted into legacy annotations by [`descriptor_annotations`] so the
//! service context builder can treat every source the same way.

use crate::binding_errors::BindingError;
use crate::constants::{BINDING_VALUE_PREFIX, LEGACY_ANNOTATION_PREFIX, OLM_DESCRIPTOR_PREFIX};
use crate::crd::{BackingServiceSelector, ServiceBinding};
use crate::resources::{crd_resource, csv_resource, ResourceClient};
use kube::api::ApiResource;
use kube::core::GroupVersionKind;
use kube::ResourceExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// A single OLM spec or status descriptor.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Field path relative to `spec` or `status`.
    pub path: String,

    #[serde(default, rename = "x-descriptors")]
    pub x_descriptors: Vec<String>,
}

/// OLM description of an owned CRD, from a `ClusterServiceVersion`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrdDescription {
    /// CRD name (`<plural>.<group>`).
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub spec_descriptors: Vec<Descriptor>,
    #[serde(default)]
    pub status_descriptors: Vec<Descriptor>,
}

/// A resolved backing-service selector.
#[derive(Clone, Debug)]
pub struct RelatedResource {
    pub selector: BackingServiceSelector,
    /// Namespace the service was read from.
    pub namespace: String,
    pub gvk: GroupVersionKind,
    /// The API resource serving `gvk`.
    pub resource: ApiResource,
    /// The backing-service custom resource.
    pub service: Value,
    /// The service's CRD, when readable.
    pub crd: Option<Value>,
    pub crd_description: Option<CrdDescription>,
}

/// Everything needed to collect binding data for one `ServiceBinding`.
#[derive(Clone, Debug)]
pub struct Plan {
    pub namespace: String,
    pub name: String,
    pub related_resources: Vec<RelatedResource>,
}

/// Identity of a fetched service within a single planning pass.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    id: Option<String>,
    api_version: String,
    kind: String,
    namespace: String,
    name: String,
}

/// Resolve the backing services of `binding`.
///
/// # Errors
///
/// - [`BindingError::EmptyServices`] when the binding has no service selectors
/// - [`BindingError::NotFound`] when a selected service does not exist
/// - any other API error reading services, CRDs or `ClusterServiceVersion`s
pub async fn plan(client: &dyn ResourceClient, binding: &ServiceBinding) -> Result<Plan, BindingError> {
    let namespace = binding.namespace().unwrap_or_default();
    let name = binding.name_any();

    if binding.spec.services.is_empty() {
        return Err(BindingError::EmptyServices);
    }

    let mut services: HashMap<CacheKey, Value> = HashMap::new();
    let mut crds: HashMap<String, (Option<Value>, Option<CrdDescription>)> = HashMap::new();
    let mut related_resources = Vec::with_capacity(binding.spec.services.len());

    for selector in &binding.spec.services {
        let service_namespace = selector
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| namespace.clone());
        let gvk = selector.gvk();

        let key = CacheKey {
            id: selector.id.clone(),
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
            namespace: service_namespace.clone(),
            name: selector.resource_ref.clone(),
        };
        let resource = client.resolve_kind(&gvk).await?;
        let service = match services.get(&key) {
            Some(service) => service.clone(),
            None => {
                let service = client
                    .get(&resource, Some(&service_namespace), &selector.resource_ref)
                    .await?;
                services.insert(key, service.clone());
                service
            }
        };

        let crd_key = format!("{}/{}/{}", service_namespace, gvk.api_version(), gvk.kind);
        let (crd, crd_description) = match crds.get(&crd_key) {
            Some(found) => found.clone(),
            None => {
                let found = (
                    find_crd(client, &resource).await?,
                    find_crd_description(client, &service_namespace, &gvk).await?,
                );
                crds.insert(crd_key, found.clone());
                found
            }
        };

        debug!(
            service = %selector.resource_ref,
            namespace = %service_namespace,
            kind = %gvk.kind,
            has_crd = crd.is_some(),
            has_crd_description = crd_description.is_some(),
            "Resolved backing service"
        );

        related_resources.push(RelatedResource {
            selector: selector.clone(),
            namespace: service_namespace,
            gvk,
            resource,
            service,
            crd,
            crd_description,
        });
    }

    info!(
        namespace = %namespace,
        name = %name,
        services = related_resources.len(),
        "Planned service binding"
    );

    Ok(Plan {
        namespace,
        name,
        related_resources,
    })
}

/// Read the CRD serving `resource`.
///
/// The CRD is named `<plural>.<group>`; when no CRD has that name, the one
/// declaring the same group and kind is used. Core kinds have no CRD, and a
/// missing or unreadable CRD yields `None`.
///
/// # Errors
///
/// Returns any API error other than not-found and forbidden.
pub async fn find_crd(
    client: &dyn ResourceClient,
    resource: &ApiResource,
) -> Result<Option<Value>, BindingError> {
    if resource.group.is_empty() {
        return Ok(None);
    }

    let crd_name = format!("{}.{}", resource.plural, resource.group);
    let lookup = match client.get(&crd_resource(), None, &crd_name).await {
        Ok(crd) => return Ok(Some(crd)),
        Err(e) if e.is_not_found() => client.list(&crd_resource(), None, None).await,
        Err(e) => Err(e),
    };

    match lookup {
        Ok(crds) => Ok(crds.into_iter().find(|crd| {
            crd["spec"]["group"].as_str() == Some(resource.group.as_str())
                && crd["spec"]["names"]["kind"].as_str() == Some(resource.kind.as_str())
        })),
        Err(e) if e.is_not_found() || e.is_forbidden() => {
            debug!(crd = %crd_name, error = %e, "CRD not readable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Find the `CRDDescription` for `gvk` among the `ClusterServiceVersion`s of `namespace`.
///
/// The first owned entry whose kind matches case-insensitively wins; its
/// version must match too when the entry declares one. When OLM is not
/// installed the lookup yields `None`.
///
/// # Errors
///
/// Returns any API error other than not-found and forbidden.
pub async fn find_crd_description(
    client: &dyn ResourceClient,
    namespace: &str,
    gvk: &GroupVersionKind,
) -> Result<Option<CrdDescription>, BindingError> {
    let csvs = match client.list(&csv_resource(), Some(namespace), None).await {
        Ok(csvs) => csvs,
        Err(e) if e.is_not_found() || e.is_forbidden() => {
            debug!(namespace, error = %e, "ClusterServiceVersions not available");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    for csv in &csvs {
        let Some(owned) = csv["spec"]["customresourcedefinitions"]["owned"].as_array() else {
            continue;
        };
        for entry in owned {
            let description: CrdDescription = serde_json::from_value(entry.clone())?;
            let kind_matches = description.kind.eq_ignore_ascii_case(&gvk.kind);
            let version_matches =
                description.version.is_empty() || description.version == gvk.version;
            if kind_matches && version_matches {
                return Ok(Some(description));
            }
        }
    }

    Ok(None)
}

/// Convert the binding descriptors of a `CRDDescription` into legacy annotations.
///
/// `urn:alm:descriptor:servicebindingrequest:secret:<key>` on `status.<path>`
/// becomes `servicebindingoperator.redhat.io/status.<path>-<key>` with the value
/// `binding:env:object:secret`. Descriptors already in the `binding:...` form
/// are attached to `<root>.<path>` as they are.
#[must_use]
pub fn descriptor_annotations(description: &CrdDescription) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();

    let roots = [
        ("spec", &description.spec_descriptors),
        ("status", &description.status_descriptors),
    ];
    for (root, descriptors) in roots {
        for descriptor in descriptors {
            let field = format!("{root}.{}", descriptor.path.trim_start_matches('.'));
            for x_descriptor in &descriptor.x_descriptors {
                if let Some((name, value)) = convert_descriptor(&field, x_descriptor) {
                    annotations.insert(format!("{LEGACY_ANNOTATION_PREFIX}/{name}"), value);
                }
            }
        }
    }

    annotations
}

fn convert_descriptor(field: &str, x_descriptor: &str) -> Option<(String, String)> {
    if let Some(rest) = x_descriptor
        .strip_prefix(OLM_DESCRIPTOR_PREFIX)
        .and_then(|rest| rest.strip_prefix(':'))
    {
        let (kind, key) = match rest.split_once(':') {
            Some((kind, key)) => (kind, Some(key).filter(|k| !k.is_empty())),
            None => (rest, None),
        };
        if kind != "secret" && kind != "configmap" {
            return None;
        }
        let value = format!("{BINDING_VALUE_PREFIX}:env:object:{kind}");
        return Some(match key {
            Some(key) => (format!("{field}-{key}"), value),
            None => (field.to_string(), value),
        });
    }

    if x_descriptor.starts_with(&format!("{BINDING_VALUE_PREFIX}:")) {
        return Some(match split_trailing_key(x_descriptor) {
            (value, Some(key)) => (format!("{field}-{key}"), value.to_string()),
            (value, None) => (field.to_string(), value.to_string()),
        });
    }

    None
}

/// Split `binding:...:secret:<key>` into the handler and the key.
fn split_trailing_key(value: &str) -> (&str, Option<&str>) {
    match value.rsplit_once(':') {
        Some((handler, key)) if handler.ends_with(":secret") || handler.ends_with(":configmap") => {
            (handler, Some(key))
        }
        _ => (value, None),
    }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod planner_tests;

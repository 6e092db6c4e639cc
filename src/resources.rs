// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Schema-agnostic access to cluster resources.
//!
//! The binding pipeline reads and writes arbitrary kinds: backing-service custom
//! resources, workloads of any shape, CRDs and `ClusterServiceVersion`s. All of
//! them are handled as JSON documents addressed by a [`kube::api::ApiResource`]
//! (group, version, plural) through the [`ResourceClient`] capability.
//!
//! [`KubeResourceClient`] implements it on top of `Api<DynamicObject>`. API
//! errors are mapped into [`BindingError`] so callers can tell not-found and
//! conflicts apart from everything else. Reads retry transient API errors.
//!
//! Backing services are selected by kind, but the API is addressed by plural.
//! [`ResourceClient::resolve_kind`] asks API discovery for the plural the CRD
//! author chose.

use crate::binding_errors::BindingError;
use crate::constants::{
    APIEXTENSIONS_API_GROUP, APIEXTENSIONS_API_VERSION, KIND_CLUSTER_SERVICE_VERSION,
    KIND_CONFIG_MAP, KIND_CUSTOM_RESOURCE_DEFINITION, KIND_ROUTE, KIND_SECRET, KIND_SERVICE,
    OLM_API_GROUP, OLM_API_VERSION, OLM_CSV_PLURAL, ROUTE_API_GROUP, ROUTE_API_VERSION,
};
use crate::reconcilers::retry::retry_api_call;
use async_trait::async_trait;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::core::GroupVersionKind;
use kube::{discovery, Client};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Result type for resource operations.
pub type Result<T, E = BindingError> = std::result::Result<T, E>;

/// CRUD capability over JSON documents of any kind.
///
/// `namespace` is `None` for cluster-scoped resources (and for cluster-wide lists).
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch a single object.
    async fn get(&self, resource: &ApiResource, namespace: Option<&str>, name: &str)
        -> Result<Value>;

    /// List objects, optionally filtered by a `k=v,...` label selector.
    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>>;

    /// Create an object. Fails with [`BindingError::AlreadyExists`] if present.
    async fn create(&self, resource: &ApiResource, namespace: &str, object: &Value)
        -> Result<Value>;

    /// Replace an object. Fails with [`BindingError::Conflict`] on a stale resource version.
    async fn update(&self, resource: &ApiResource, namespace: &str, object: &Value)
        -> Result<Value>;

    /// Apply a JSON merge patch to an object.
    async fn patch(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value>;

    /// Apply a JSON merge patch to an object's status subresource.
    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value>;

    /// Delete an object.
    async fn delete(&self, resource: &ApiResource, namespace: &str, name: &str) -> Result<()>;

    /// Resolve a kind to the API resource serving it.
    ///
    /// Kinds unknown to discovery resolve through [`ApiResource::from_gvk`].
    async fn resolve_kind(&self, gvk: &GroupVersionKind) -> Result<ApiResource>;
}

/// [`ResourceClient`] backed by a live Kubernetes API server.
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
    /// Discovered API resources by `apiVersion/kind`.
    kinds: Arc<RwLock<HashMap<String, ApiResource>>>,
}

impl KubeResourceClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            kinds: Arc::default(),
        }
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value> {
        debug!(plural = %resource.plural, namespace = ?namespace, name, "Getting object");
        let api = &self.api(resource, namespace);
        let ns = namespace.unwrap_or_default();
        let object = retry_api_call(
            || async move {
                api.get(name)
                    .await
                    .map_err(|e| map_kube_error(e, resource, ns, name))
            },
            "get object",
        )
        .await?;
        Ok(serde_json::to_value(object)?)
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        debug!(
            plural = %resource.plural,
            namespace = ?namespace,
            label_selector = ?label_selector,
            "Listing objects"
        );
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let api = &self.api(resource, namespace);
        let params = &params;
        let ns = namespace.unwrap_or_default();
        let list = retry_api_call(
            || async move {
                api.list(params)
                    .await
                    .map_err(|e| map_kube_error(e, resource, ns, ""))
            },
            "list objects",
        )
        .await?;

        // List items omit their type meta; the list kind is `<Kind>List`.
        let item_kind = list
            .types
            .kind
            .strip_suffix("List")
            .unwrap_or_default()
            .to_string();
        list.items
            .into_iter()
            .map(|item| {
                let mut value = serde_json::to_value(item)?;
                fill_type_meta(&mut value, resource, &item_kind);
                Ok(value)
            })
            .collect()
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        object: &Value,
    ) -> Result<Value> {
        let dynamic: DynamicObject = serde_json::from_value(object.clone())?;
        let name = object_name(object);
        debug!(plural = %resource.plural, namespace, name, "Creating object");
        let created = self
            .api(resource, Some(namespace))
            .create(&PostParams::default(), &dynamic)
            .await
            .map_err(|e| map_kube_error(e, resource, namespace, name))?;
        Ok(serde_json::to_value(created)?)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        namespace: &str,
        object: &Value,
    ) -> Result<Value> {
        let dynamic: DynamicObject = serde_json::from_value(object.clone())?;
        let name = object_name(object);
        debug!(plural = %resource.plural, namespace, name, "Replacing object");
        let updated = self
            .api(resource, Some(namespace))
            .replace(name, &PostParams::default(), &dynamic)
            .await
            .map_err(|e| map_kube_error(e, resource, namespace, name))?;
        Ok(serde_json::to_value(updated)?)
    }

    async fn patch(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        debug!(plural = %resource.plural, namespace, name, "Patching object");
        let patched = self
            .api(resource, Some(namespace))
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_kube_error(e, resource, namespace, name))?;
        Ok(serde_json::to_value(patched)?)
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        debug!(plural = %resource.plural, namespace, name, "Patching status");
        let patched = self
            .api(resource, Some(namespace))
            .patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_kube_error(e, resource, namespace, name))?;
        Ok(serde_json::to_value(patched)?)
    }

    async fn delete(&self, resource: &ApiResource, namespace: &str, name: &str) -> Result<()> {
        debug!(plural = %resource.plural, namespace, name, "Deleting object");
        self.api(resource, Some(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, resource, namespace, name))?;
        Ok(())
    }

    async fn resolve_kind(&self, gvk: &GroupVersionKind) -> Result<ApiResource> {
        let cache_key = format!("{}/{}", gvk.api_version(), gvk.kind);
        if let Some(resource) = self
            .kinds
            .read()
            .ok()
            .and_then(|kinds| kinds.get(&cache_key).cloned())
        {
            return Ok(resource);
        }

        match discovery::pinned_kind(&self.client, gvk).await {
            Ok((resource, _capabilities)) => {
                debug!(kind = %gvk.kind, plural = %resource.plural, "Discovered API resource");
                if let Ok(mut kinds) = self.kinds.write() {
                    kinds.insert(cache_key, resource.clone());
                }
                Ok(resource)
            }
            Err(e) => {
                debug!(kind = %gvk.kind, error = %e, "Kind not discovered, deriving plural");
                Ok(ApiResource::from_gvk(gvk))
            }
        }
    }
}

/// Map a kube API error onto the pipeline's error taxonomy.
///
/// 404 becomes [`BindingError::NotFound`]; 409 becomes [`BindingError::AlreadyExists`]
/// or [`BindingError::Conflict`] depending on the API reason.
#[must_use]
pub fn map_kube_error(
    err: kube::Error,
    resource: &ApiResource,
    namespace: &str,
    name: &str,
) -> BindingError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => BindingError::NotFound {
            kind: resource.plural.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            BindingError::AlreadyExists {
                kind: resource.plural.clone(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(ae) if ae.code == 409 => BindingError::Conflict {
            kind: resource.plural.clone(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: ae.message,
        },
        other => BindingError::Kube(other),
    }
}

/// Name of a document (`metadata.name`), or the empty string.
#[must_use]
pub fn object_name(object: &Value) -> &str {
    object["metadata"]["name"].as_str().unwrap_or_default()
}

/// UID of a document (`metadata.uid`), or the empty string.
#[must_use]
pub fn object_uid(object: &Value) -> &str {
    object["metadata"]["uid"].as_str().unwrap_or_default()
}

/// Group/version/kind of a document from its `apiVersion` and `kind`.
#[must_use]
pub fn object_gvk(object: &Value) -> GroupVersionKind {
    let api_version = object["apiVersion"].as_str().unwrap_or_default();
    let kind = object["kind"].as_str().unwrap_or_default();
    let (group, version) = split_api_version(api_version);
    GroupVersionKind::gvk(group, version, kind)
}

/// Split `group/version` (or a bare core `version`) into its parts.
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

fn fill_type_meta(object: &mut Value, resource: &ApiResource, item_kind: &str) {
    let kind = if resource.kind.is_empty() {
        item_kind
    } else {
        resource.kind.as_str()
    };
    if let Some(map) = object.as_object_mut() {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(resource.api_version.clone()));
        if !kind.is_empty() {
            map.entry("kind")
                .or_insert_with(|| Value::String(kind.to_string()));
        }
    }
}

/// API resource for a group/version/plural whose kind is unknown.
#[must_use]
pub fn resource_for_gvr(group: &str, version: &str, plural: &str) -> ApiResource {
    let gvk = GroupVersionKind::gvk(group, version, "");
    ApiResource::from_gvk_with_plural(&gvk, plural)
}

/// Core `v1` Secrets.
#[must_use]
pub fn secret_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk("", "v1", KIND_SECRET), "secrets")
}

/// Core `v1` ConfigMaps.
#[must_use]
pub fn config_map_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("", "v1", KIND_CONFIG_MAP),
        "configmaps",
    )
}

/// Core `v1` Services.
#[must_use]
pub fn service_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk("", "v1", KIND_SERVICE), "services")
}

/// `OpenShift` Routes.
#[must_use]
pub fn route_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(ROUTE_API_GROUP, ROUTE_API_VERSION, KIND_ROUTE),
        "routes",
    )
}

/// OLM `ClusterServiceVersion`s.
#[must_use]
pub fn csv_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(OLM_API_GROUP, OLM_API_VERSION, KIND_CLUSTER_SERVICE_VERSION),
        OLM_CSV_PLURAL,
    )
}

/// `apiextensions.k8s.io/v1` `CustomResourceDefinition`s.
#[must_use]
pub fn crd_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(
            APIEXTENSIONS_API_GROUP,
            APIEXTENSIONS_API_VERSION,
            KIND_CUSTOM_RESOURCE_DEFINITION,
        ),
        "customresourcedefinitions",
    )
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;

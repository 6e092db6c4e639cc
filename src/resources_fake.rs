// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ResourceClient`] used by unit tests.
//!
//! Objects are keyed by plural, namespace and name. Every write bumps a
//! `metadata.resourceVersion` counter, updates with a stale version fail with
//! a conflict, and each call is recorded so tests can assert how many writes
//! a code path performed. Kinds resolve to the API resources objects were
//! inserted under.

use crate::binding_errors::BindingError;
use crate::resources::{object_name, Result, ResourceClient};
use async_trait::async_trait;
use kube::api::ApiResource;
use kube::core::GroupVersionKind;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

type Key = (String, String, String);

/// A recorded client call: operation name and `plural/namespace/name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub target: String,
}

#[derive(Default)]
pub struct FakeResourceClient {
    objects: Mutex<BTreeMap<Key, Value>>,
    calls: Mutex<Vec<Call>>,
    unserved: Mutex<BTreeSet<String>>,
    kinds: Mutex<Vec<ApiResource>>,
    version: Mutex<u64>,
}

impl FakeResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object; `apiVersion` and `kind` are filled from `resource` when absent.
    pub fn insert(&self, resource: &ApiResource, object: Value) {
        let mut object = object;
        if let Some(map) = object.as_object_mut() {
            map.entry("apiVersion")
                .or_insert_with(|| json!(resource.api_version));
            if !resource.kind.is_empty() {
                map.entry("kind").or_insert_with(|| json!(resource.kind));
            }
        }
        if !resource.kind.is_empty() {
            let mut kinds = self.kinds.lock().unwrap();
            if !kinds
                .iter()
                .any(|r| r.api_version == resource.api_version && r.kind == resource.kind)
            {
                kinds.push(resource.clone());
            }
        }
        let version = self.next_version();
        object["metadata"]["resourceVersion"] = json!(version);
        let key = key(resource, namespace_of(&object), object_name(&object));
        self.objects.lock().unwrap().insert(key, object);
    }

    /// Make every call against `plural` fail with not-found, as for an unserved API.
    pub fn mark_unserved(&self, plural: &str) {
        self.unserved.lock().unwrap().insert(plural.to_string());
    }

    /// Current copy of an object.
    pub fn object(&self, resource: &ApiResource, namespace: &str, name: &str) -> Option<Value> {
        self.objects
            .lock()
            .unwrap()
            .get(&key(resource, namespace, name))
            .cloned()
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded write calls (everything except get and list).
    pub fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.op != "get" && c.op != "list")
            .collect()
    }

    /// Number of recorded calls with the given operation name.
    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn next_version(&self) -> String {
        let mut version = self.version.lock().unwrap();
        *version += 1;
        version.to_string()
    }

    fn record(&self, op: &'static str, resource: &ApiResource, namespace: &str, name: &str) {
        self.calls.lock().unwrap().push(Call {
            op,
            target: format!("{}/{}/{}", resource.plural, namespace, name),
        });
    }

    fn check_served(&self, resource: &ApiResource, namespace: &str, name: &str) -> Result<()> {
        if self.unserved.lock().unwrap().contains(&resource.plural) {
            return Err(not_found(resource, namespace, name));
        }
        Ok(())
    }
}

fn key(resource: &ApiResource, namespace: &str, name: &str) -> Key {
    (
        resource.plural.clone(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn namespace_of(object: &Value) -> &str {
    object["metadata"]["namespace"].as_str().unwrap_or_default()
}

fn not_found(resource: &ApiResource, namespace: &str, name: &str) -> BindingError {
    BindingError::NotFound {
        kind: resource.plural.clone(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn matches_labels(object: &Value, selector: &str) -> bool {
    selector.split(',').filter(|s| !s.is_empty()).all(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        object["metadata"]["labels"][k].as_str() == Some(v)
    })
}

/// RFC 7386 JSON merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch_map) => {
            if !target.is_object() {
                *target = json!({});
            }
            if let Some(target_map) = target.as_object_mut() {
                for (k, v) in patch_map {
                    if v.is_null() {
                        target_map.remove(k);
                    } else {
                        merge_patch(target_map.entry(k.clone()).or_insert(Value::Null), v);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

#[async_trait]
impl ResourceClient for FakeResourceClient {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Value> {
        let ns = namespace.unwrap_or_default();
        self.record("get", resource, ns, name);
        self.check_served(resource, ns, name)?;
        self.object(resource, ns, name)
            .ok_or_else(|| not_found(resource, ns, name))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        let ns = namespace.unwrap_or_default();
        self.record("list", resource, ns, "");
        self.check_served(resource, ns, "")?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((plural, object_ns, _), _)| {
                *plural == resource.plural && namespace.is_none_or(|n| n == object_ns.as_str())
            })
            .map(|(_, object)| object.clone())
            .filter(|object| label_selector.is_none_or(|s| matches_labels(object, s)))
            .collect())
    }

    async fn create(
        &self,
        resource: &ApiResource,
        namespace: &str,
        object: &Value,
    ) -> Result<Value> {
        let name = object_name(object).to_string();
        self.record("create", resource, namespace, &name);
        self.check_served(resource, namespace, &name)?;
        if self.object(resource, namespace, &name).is_some() {
            return Err(BindingError::AlreadyExists {
                kind: resource.plural.clone(),
                namespace: namespace.to_string(),
                name,
            });
        }
        let mut created = object.clone();
        created["metadata"]["namespace"] = json!(namespace);
        created["metadata"]["uid"] = json!(format!("uid-{}-{name}", resource.plural));
        created["metadata"]["resourceVersion"] = json!(self.next_version());
        self.objects
            .lock()
            .unwrap()
            .insert(key(resource, namespace, &name), created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        namespace: &str,
        object: &Value,
    ) -> Result<Value> {
        let name = object_name(object).to_string();
        self.record("update", resource, namespace, &name);
        let current = self
            .object(resource, namespace, &name)
            .ok_or_else(|| not_found(resource, namespace, &name))?;
        let sent = &object["metadata"]["resourceVersion"];
        if !sent.is_null() && *sent != current["metadata"]["resourceVersion"] {
            return Err(BindingError::Conflict {
                kind: resource.plural.clone(),
                namespace: namespace.to_string(),
                name,
                message: "the object has been modified".to_string(),
            });
        }
        let mut updated = object.clone();
        updated["metadata"]["resourceVersion"] = json!(self.next_version());
        self.objects
            .lock()
            .unwrap()
            .insert(key(resource, namespace, &name), updated.clone());
        Ok(updated)
    }

    async fn patch(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        self.record("patch", resource, namespace, name);
        let mut current = self
            .object(resource, namespace, name)
            .ok_or_else(|| not_found(resource, namespace, name))?;
        merge_patch(&mut current, patch);
        current["metadata"]["resourceVersion"] = json!(self.next_version());
        self.objects
            .lock()
            .unwrap()
            .insert(key(resource, namespace, name), current.clone());
        Ok(current)
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<Value> {
        self.record("patch_status", resource, namespace, name);
        let mut current = self
            .object(resource, namespace, name)
            .ok_or_else(|| not_found(resource, namespace, name))?;
        let status_patch = json!({ "status": patch["status"].clone() });
        merge_patch(&mut current, &status_patch);
        current["metadata"]["resourceVersion"] = json!(self.next_version());
        self.objects
            .lock()
            .unwrap()
            .insert(key(resource, namespace, name), current.clone());
        Ok(current)
    }

    async fn delete(&self, resource: &ApiResource, namespace: &str, name: &str) -> Result<()> {
        self.record("delete", resource, namespace, name);
        self.objects
            .lock()
            .unwrap()
            .remove(&key(resource, namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(resource, namespace, name))
    }

    async fn resolve_kind(&self, gvk: &GroupVersionKind) -> Result<ApiResource> {
        let kinds = self.kinds.lock().unwrap();
        Ok(kinds
            .iter()
            .find(|r| r.group == gvk.group && r.version == gvk.version && r.kind == gvk.kind)
            .cloned()
            .unwrap_or_else(|| ApiResource::from_gvk(gvk)))
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Workload binder.
//!
//! Injects the intermediary Secret or ConfigMap into application workloads of
//! any shape (Deployments, StatefulSets, DaemonSets, Knative Services, custom
//! kinds with a pod template) and removes it again on unbind.
//!
//! Per container the binder maintains:
//!
//! - exactly one `envFrom` entry referencing the intermediary object
//! - the `ServiceBindingOperatorChangeTriggerEnvVar` env var, set to the
//!   intermediary's `resourceVersion` so data changes roll the pods
//! - a volume mount when keys are projected as files
//!
//! Mutations are idempotent: a workload is only written back when the
//! mutation changed it.

use crate::binding_errors::BindingError;
use crate::constants::{
    CHANGE_TRIGGER_ENV_VAR, DEFAULT_CONTAINERS_PATH, DEFAULT_MOUNT_PATH, KNATIVE_SERVING_API_GROUP,
};
use crate::crd::{ApplicationSelector, BoundApplication, IntermediaryKind, ServiceBinding};
use crate::metrics;
use crate::nested::{self, split_path};
use crate::resources::{
    object_gvk, object_name, resource_for_gvr, split_api_version, ResourceClient,
};
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::{debug, info};

/// What gets injected into a workload.
#[derive(Clone, Debug, PartialEq)]
pub struct Injection {
    /// Name of the binding, of the intermediary object and of the volume.
    pub name: String,
    pub kind: IntermediaryKind,
    pub containers_path: String,
    pub secret_path: Option<String>,
    pub mount_path: String,
    /// Keys projected as files; no volume is added when empty.
    pub volume_keys: Vec<String>,
    /// Value of the change-trigger env var.
    pub change_trigger: Option<String>,
}

impl Injection {
    /// Injection for `binding` with the given volume keys and change trigger.
    #[must_use]
    pub fn new(
        binding: &ServiceBinding,
        volume_keys: Vec<String>,
        change_trigger: Option<String>,
    ) -> Self {
        let binding_path = binding
            .spec
            .application
            .as_ref()
            .and_then(|app| app.binding_path.as_ref());

        Self {
            name: binding.name_any(),
            kind: binding.spec.intermediary_kind,
            containers_path: binding_path
                .and_then(|p| p.containers_path.clone())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTAINERS_PATH.to_string()),
            secret_path: binding_path
                .and_then(|p| p.secret_path.clone())
                .filter(|p| !p.is_empty()),
            mount_path: binding
                .spec
                .mount_path_prefix
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
            volume_keys,
            change_trigger,
        }
    }

    /// Path of the pod-level `volumes` list: a sibling of the containers list.
    #[must_use]
    pub fn volumes_path(&self) -> String {
        let segments = split_path(&self.containers_path);
        match segments.split_last() {
            Some((_, parent)) if !parent.is_empty() => format!("{}.volumes", parent.join(".")),
            _ => "volumes".to_string(),
        }
    }

    fn env_from_entry(&self) -> Value {
        match self.kind {
            IntermediaryKind::Secret => json!({"secretRef": {"name": self.name}}),
            IntermediaryKind::ConfigMap => json!({"configMapRef": {"name": self.name}}),
        }
    }

    fn volume_entry(&self) -> Value {
        let items: Vec<Value> = self
            .volume_keys
            .iter()
            .map(|key| json!({"key": key, "path": key}))
            .collect();
        match self.kind {
            IntermediaryKind::Secret => json!({
                "name": self.name,
                "secret": {"secretName": self.name, "items": items}
            }),
            IntermediaryKind::ConfigMap => json!({
                "name": self.name,
                "configMap": {"name": self.name, "items": items}
            }),
        }
    }

    fn references_intermediary(&self, env_from: &Value) -> bool {
        ["secretRef", "configMapRef"]
            .iter()
            .any(|r| env_from[*r]["name"].as_str() == Some(self.name.as_str()))
    }
}

/// Find the application workloads selected by `selector`.
///
/// A name takes priority over labels.
///
/// # Errors
///
/// - [`BindingError::EmptyApplication`] when neither a name nor labels are set
/// - [`BindingError::ApplicationNotFound`] when nothing matches
pub async fn search(
    client: &dyn ResourceClient,
    namespace: &str,
    selector: &ApplicationSelector,
) -> Result<Vec<Value>, BindingError> {
    let resource = resource_for_gvr(&selector.group, &selector.version, &selector.resource);

    if let Some(name) = selector.name() {
        return match client.get(&resource, Some(namespace), name).await {
            Ok(object) => Ok(vec![object]),
            Err(e) if e.is_not_found() => Err(BindingError::ApplicationNotFound),
            Err(e) => Err(e),
        };
    }

    let Some(query) = selector.label_query() else {
        return Err(BindingError::EmptyApplication);
    };

    let objects = match client.list(&resource, Some(namespace), Some(&query)).await {
        Ok(objects) => objects,
        Err(e) if e.is_not_found() => return Err(BindingError::ApplicationNotFound),
        Err(e) => return Err(e),
    };
    if objects.is_empty() {
        return Err(BindingError::ApplicationNotFound);
    }
    Ok(objects)
}

/// Inject the intermediary object into every selected workload.
///
/// Returns the workloads to report in status: the updated ones plus unchanged
/// ones already reported by a previous pass.
///
/// # Errors
///
/// Returns search errors, [`BindingError::ContainersNotFound`] for unsupported
/// workload shapes and API errors (including conflicts) from updates.
pub async fn bind(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
    injection: &Injection,
) -> Result<Vec<BoundApplication>, BindingError> {
    let selector = binding
        .spec
        .application
        .as_ref()
        .ok_or(BindingError::EmptyApplication)?;
    let namespace = binding.namespace().unwrap_or_default();
    let resource = resource_for_gvr(&selector.group, &selector.version, &selector.resource);
    let reported = binding
        .status
        .as_ref()
        .map(|s| s.applications.clone())
        .unwrap_or_default();

    let mut bound = Vec::new();
    for object in search(client, &namespace, selector).await? {
        let application = bound_application(&object, selector);
        let mut mutated = object.clone();
        apply_injection(&mut mutated, injection)?;

        if mutated == object {
            debug!(
                namespace = %namespace,
                name = %application.name,
                "Application already bound"
            );
            if reported.contains(&application) {
                bound.push(application);
            }
            continue;
        }

        client.update(&resource, &namespace, &mutated).await?;
        metrics::record_resource_updated(&application.kind);
        info!(
            namespace = %namespace,
            kind = %application.kind,
            name = %application.name,
            binding = %injection.name,
            "Bound application"
        );
        bound.push(application);
    }

    Ok(bound)
}

/// Remove the injected entries from every selected workload.
///
/// Missing applications and an absent selector are not errors.
///
/// # Errors
///
/// Returns API errors (including conflicts) from reads and updates.
pub async fn unbind(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
    injection: &Injection,
) -> Result<(), BindingError> {
    let Some(selector) = binding.spec.application.as_ref() else {
        return Ok(());
    };
    let namespace = binding.namespace().unwrap_or_default();
    let resource = resource_for_gvr(&selector.group, &selector.version, &selector.resource);

    let objects = match search(client, &namespace, selector).await {
        Ok(objects) => objects,
        Err(BindingError::ApplicationNotFound | BindingError::EmptyApplication) => {
            debug!(namespace = %namespace, binding = %injection.name, "No application to unbind");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for object in objects {
        let mut mutated = object.clone();
        remove_injection(&mut mutated, injection);
        if mutated == object {
            continue;
        }
        client.update(&resource, &namespace, &mutated).await?;
        metrics::record_resource_updated(object["kind"].as_str().unwrap_or(&selector.resource));
        info!(
            namespace = %namespace,
            name = %object_name(&object),
            binding = %injection.name,
            "Unbound application"
        );
    }

    Ok(())
}

/// The status entry for a workload.
#[must_use]
pub fn bound_application(object: &Value, selector: &ApplicationSelector) -> BoundApplication {
    let gvk = object_gvk(object);
    let (group, version) = if gvk.version.is_empty() {
        (selector.group.clone(), selector.version.clone())
    } else {
        (gvk.group, gvk.version)
    };
    BoundApplication {
        group,
        version,
        kind: if gvk.kind.is_empty() {
            selector.resource.clone()
        } else {
            gvk.kind
        },
        name: object_name(object).to_string(),
    }
}

/// Apply `injection` to a workload document.
///
/// # Errors
///
/// Returns [`BindingError::ContainersNotFound`] when the containers path does
/// not hold a list.
pub fn apply_injection(object: &mut Value, injection: &Injection) -> Result<(), BindingError> {
    let kind = object["kind"].as_str().unwrap_or_default().to_string();
    let name = object_name(object).to_string();

    let containers = nested::get_mut(object, &injection.containers_path)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| BindingError::ContainersNotFound {
            path: injection.containers_path.clone(),
            kind,
            name,
        })?;

    for container in containers.iter_mut() {
        inject_container(container, injection);
    }

    if !injection.volume_keys.is_empty() {
        let volumes_path = injection.volumes_path();
        let volumes = array_at(object, &volumes_path);
        upsert_by_name(volumes, &injection.name, injection.volume_entry());
    }

    if let Some(secret_path) = &injection.secret_path {
        nested::set(object, secret_path, json!(injection.name));
    }

    if is_knative_service(object) {
        nested::remove(object, "spec.template.metadata.name");
    }

    Ok(())
}

/// Remove everything [`apply_injection`] added. Unsupported shapes are left untouched.
pub fn remove_injection(object: &mut Value, injection: &Injection) {
    if let Some(containers) =
        nested::get_mut(object, &injection.containers_path).and_then(Value::as_array_mut)
    {
        for container in containers.iter_mut() {
            retain_in(container, "envFrom", |e| !injection.references_intermediary(e));
            retain_in(container, "env", |e| e["name"] != CHANGE_TRIGGER_ENV_VAR);
            retain_in(container, "volumeMounts", |m| m["name"] != injection.name.as_str());
        }
    }

    let volumes_path = injection.volumes_path();
    let segments = split_path(&volumes_path);
    if let Some((last, parent)) = segments.split_last() {
        if let Some(pod_spec) = nested::get_mut(object, &parent.join(".")) {
            retain_in(pod_spec, last, |v| v["name"] != injection.name.as_str());
        }
    }
}

fn inject_container(container: &mut Value, injection: &Injection) {
    if !container.is_object() {
        return;
    }

    // Replace any entry for this binding (including one of the other kind) in place.
    let env_from = array_at(container, "envFrom");
    let position = env_from
        .iter()
        .position(|e| injection.references_intermediary(e));
    env_from.retain(|e| !injection.references_intermediary(e));
    let entry = injection.env_from_entry();
    match position {
        Some(index) => env_from.insert(index.min(env_from.len()), entry),
        None => env_from.push(entry),
    }

    if let Some(trigger) = &injection.change_trigger {
        let env = array_at(container, "env");
        upsert_by_name(
            env,
            CHANGE_TRIGGER_ENV_VAR,
            json!({"name": CHANGE_TRIGGER_ENV_VAR, "value": trigger}),
        );
    }

    if !injection.volume_keys.is_empty() {
        let mounts = array_at(container, "volumeMounts");
        upsert_by_name(
            mounts,
            &injection.name,
            json!({"name": injection.name, "mountPath": injection.mount_path}),
        );
    }
}

/// The array at `path`, created (or replacing a non-array) when needed.
fn array_at<'a>(object: &'a mut Value, path: &str) -> &'a mut Vec<Value> {
    let present = nested::get_mut(object, path).is_some_and(|v| v.is_array());
    if !present {
        nested::set(object, path, json!([]));
    }
    match nested::get_mut(object, path) {
        Some(Value::Array(items)) => items,
        _ => unreachable!("an array was just set at this path"),
    }
}

fn upsert_by_name(items: &mut Vec<Value>, name: &str, entry: Value) {
    match items.iter_mut().find(|item| item["name"] == name) {
        Some(existing) => *existing = entry,
        None => items.push(entry),
    }
}

/// Keep the entries of `object[key]` matching `keep`; the key is dropped once empty.
fn retain_in(object: &mut Value, key: &str, keep: impl Fn(&Value) -> bool) {
    let Some(map) = object.as_object_mut() else {
        return;
    };
    let Some(Value::Array(items)) = map.get_mut(key) else {
        return;
    };
    let before = items.len();
    items.retain(|item| keep(item));
    if items.is_empty() && before > 0 {
        map.remove(key);
    }
}

fn is_knative_service(object: &Value) -> bool {
    let api_version = object["apiVersion"].as_str().unwrap_or_default();
    split_api_version(api_version).0 == KNATIVE_SERVING_API_GROUP
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod workload_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for service binding.
//!
//! This module defines the `ServiceBinding` custom resource, which expresses the
//! intent to bind one or more operator-backed services to an application workload.
//!
//! # Example: Binding a Database to a Deployment
//!
//! ```rust,no_run
//! use service_binding_operator::crd::{
//!     ApplicationSelector, BackingServiceSelector, ServiceBindingSpec,
//! };
//!
//! let spec = ServiceBindingSpec {
//!     application: Some(ApplicationSelector {
//!         group: "apps".to_string(),
//!         version: "v1".to_string(),
//!         resource: "deployments".to_string(),
//!         resource_ref: Some("nodejs-app".to_string()),
//!         ..Default::default()
//!     }),
//!     services: vec![BackingServiceSelector {
//!         group: "postgresql.example.dev".to_string(),
//!         version: "v1alpha1".to_string(),
//!         kind: "Database".to_string(),
//!         resource_ref: "db-demo".to_string(),
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! };
//! ```

use crate::constants::{KIND_CONFIG_MAP, KIND_SECRET};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::GroupVersionKind;
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: `CollectionReady` or `InjectionReady`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Label selector restricted to exact label matches.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Labels that must all be present with the given values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Render the selector in the `k=v,k2=v2` form accepted by list calls.
    #[must_use]
    pub fn to_query(&self) -> String {
        self.match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether `labels` carry every required label.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Paths in the application workload's schema where the binding is referenced.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BindingPath {
    /// Dot-separated path to the container list.
    ///
    /// Defaults to `spec.template.spec.containers`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containers_path: Option<String>,

    /// Dot-separated path to a string field that receives the intermediary object name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_path: Option<String>,
}

/// Selects the application workload(s) to bind, by name or by labels.
///
/// When both `resourceRef` and `labelSelector` are set, the name wins.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSelector {
    /// API group of the workload (empty for the core group).
    #[serde(default)]
    pub group: String,

    /// API version of the workload.
    pub version: String,

    /// Plural resource name of the workload (e.g. `deployments`).
    pub resource: String,

    /// Name of the workload.
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<String>,

    /// Label selector matching one or more workloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,

    /// Overrides for where containers and the secret name live in the workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_path: Option<BindingPath>,
}

impl ApplicationSelector {
    /// Label selector query, if the selector declares any labels.
    #[must_use]
    pub fn label_query(&self) -> Option<String> {
        self.label_selector
            .as_ref()
            .filter(|s| !s.match_labels.is_empty())
            .map(LabelSelector::to_query)
    }

    /// Name of the workload, if set and non-empty.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.resource_ref.as_deref().filter(|n| !n.is_empty())
    }
}

/// Selects a backing-service custom resource by kind and name.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackingServiceSelector {
    /// API group of the backing service.
    #[serde(default)]
    pub group: String,

    /// API version of the backing service.
    pub version: String,

    /// Kind of the backing service.
    pub kind: String,

    /// Name of the backing-service resource.
    #[serde(alias = "name")]
    pub resource_ref: String,

    /// Namespace of the backing service. Defaults to the `ServiceBinding`'s namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Identifier disambiguating selectors of the same kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Prefix for keys contributed by this service.
    ///
    /// Defaults to the kind; an explicit empty string removes the prefix.
    #[serde(default, alias = "namePrefix", skip_serializing_if = "Option::is_none")]
    pub env_var_prefix: Option<String>,
}

impl BackingServiceSelector {
    /// Group/version/kind of the selected service.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

/// A templated variable added to the binding data.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomEnvVar {
    /// Key of the variable in the intermediary object.
    pub name: String,

    /// Template rendered against the collected service data.
    pub value: String,
}

/// Kind of the intermediary object holding the binding data.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum IntermediaryKind {
    #[default]
    Secret,
    ConfigMap,
}

impl IntermediaryKind {
    /// Kubernetes kind name.
    #[must_use]
    pub fn kind(self) -> &'static str {
        match self {
            IntermediaryKind::Secret => KIND_SECRET,
            IntermediaryKind::ConfigMap => KIND_CONFIG_MAP,
        }
    }
}

/// `ServiceBinding` expresses intent to bind operator-backed services with an
/// application workload.
///
/// # Example
///
/// ```yaml
/// apiVersion: operators.coreos.com/v1alpha1
/// kind: ServiceBinding
/// metadata:
///   name: binding-request
///   namespace: service-binding-demo
/// spec:
///   application:
///     group: apps
///     version: v1
///     resource: deployments
///     resourceRef: nodejs-rest-http-crud
///   services:
///     - group: postgresql.example.dev
///       version: v1alpha1
///       kind: Database
///       resourceRef: db-demo
///       id: db
///   customEnvVar:
///     - name: JDBC_URL
///       value: 'jdbc:postgresql://{{ .db.status.dbConnectionIP }}:{{ .db.status.dbConnectionPort }}/{{ .db.status.dbName }}'
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "operators.coreos.com",
    version = "v1alpha1",
    kind = "ServiceBinding",
    plural = "servicebindings",
    shortname = "sbr",
    shortname = "sbrs",
    namespaced,
    doc = "ServiceBinding expresses intent to bind an operator-backed service with an application workload."
)]
#[kube(status = "ServiceBindingStatus")]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingSpec {
    /// Application workload(s) receiving the binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationSelector>,

    /// Backing services contributing binding data, processed in order.
    #[serde(default)]
    pub services: Vec<BackingServiceSelector>,

    /// Also bind data from Secrets, ConfigMaps, Services and Routes owned by the services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detect_binding_resources: Option<bool>,

    /// Prefix for every generated key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var_prefix: Option<String>,

    /// Extra templated variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_env_var: Vec<CustomEnvVar>,

    /// Mount path for bindings projected as files. Defaults to `/var/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path_prefix: Option<String>,

    /// Kind of the intermediary object. Defaults to `Secret`.
    #[serde(default)]
    pub intermediary_kind: IntermediaryKind,
}

/// An application workload the binding was injected into.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoundApplication {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
}

/// `ServiceBinding` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Name of the intermediary Secret or ConfigMap.
    #[serde(default)]
    pub secret: String,

    /// Always serialized so a merge patch can clear the list.
    #[serde(default)]
    pub applications: Vec<BoundApplication>,
}

impl ServiceBinding {
    /// Whether owned-resource detection is enabled.
    #[must_use]
    pub fn detect_binding_resources(&self) -> bool {
        self.spec.detect_binding_resources.unwrap_or(false)
    }

    /// Whether the finalizer marking a completed bind is present.
    #[must_use]
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// Controller owner reference pointing at this binding.
    #[must_use]
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: ServiceBinding::api_version(&()).to_string(),
            kind: ServiceBinding::kind(&()).to_string(),
            name: self.name_any(),
            uid: self.metadata.uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: None,
        }
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;

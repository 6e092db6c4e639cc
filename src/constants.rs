// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the service binding operator.
//!
//! This module contains the numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Kind name for core `Secret` resources
pub const KIND_SECRET: &str = "Secret";

/// Kind name for core `ConfigMap` resources
pub const KIND_CONFIG_MAP: &str = "ConfigMap";

/// Kind name for core `Service` resources
pub const KIND_SERVICE: &str = "Service";

/// Kind name for `OpenShift` `Route` resources
pub const KIND_ROUTE: &str = "Route";

/// Kind name for OLM `ClusterServiceVersion` resources
pub const KIND_CLUSTER_SERVICE_VERSION: &str = "ClusterServiceVersion";

/// Kind name for `CustomResourceDefinition` resources
pub const KIND_CUSTOM_RESOURCE_DEFINITION: &str = "CustomResourceDefinition";

// ============================================================================
// OLM / Third-Party API Constants
// ============================================================================

/// API group of OLM resources (`ClusterServiceVersion`)
pub const OLM_API_GROUP: &str = "operators.coreos.com";

/// API version of OLM resources
pub const OLM_API_VERSION: &str = "v1alpha1";

/// Plural resource name of `ClusterServiceVersion`
pub const OLM_CSV_PLURAL: &str = "clusterserviceversions";

/// API group of `CustomResourceDefinition`
pub const APIEXTENSIONS_API_GROUP: &str = "apiextensions.k8s.io";

/// API version of `CustomResourceDefinition`
pub const APIEXTENSIONS_API_VERSION: &str = "v1";

/// API group of `OpenShift` routes
pub const ROUTE_API_GROUP: &str = "route.openshift.io";

/// API version of `OpenShift` routes
pub const ROUTE_API_VERSION: &str = "v1";

/// API group of Knative serving
pub const KNATIVE_SERVING_API_GROUP: &str = "serving.knative.dev";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer attached to a `ServiceBinding` once an application has been bound
pub const SERVICE_BINDING_FINALIZER: &str = "finalizer.servicebinding.openshift.io";

// ============================================================================
// Binding Annotation Prefixes
// ============================================================================

/// Prefix of the legacy `<prefix>/<field>[-<subfield>]` annotation form
pub const LEGACY_ANNOTATION_PREFIX: &str = "servicebindingoperator.redhat.io";

/// Prefix of the structured `<prefix>/<name>: path=...,objectType=...` annotation form
pub const STRUCTURED_ANNOTATION_PREFIX: &str = "servicebinding.dev";

/// OLM x-descriptor prefix naming a Secret or ConfigMap key
pub const OLM_DESCRIPTOR_PREFIX: &str = "urn:alm:descriptor:servicebindingrequest";

/// Prefix shared by all binding handler values (`binding:env:attribute`, ...)
pub const BINDING_VALUE_PREFIX: &str = "binding";

// ============================================================================
// Workload Binding Defaults
// ============================================================================

/// Default location of the container list inside a workload
pub const DEFAULT_CONTAINERS_PATH: &str = "spec.template.spec.containers";

/// Default mount path for bindings projected as files
pub const DEFAULT_MOUNT_PATH: &str = "/var/data";

/// Environment variable carrying the intermediary object's resource version.
///
/// Changing it forces a rollout whenever the bound data changes.
pub const CHANGE_TRIGGER_ENV_VAR: &str = "ServiceBindingOperatorChangeTriggerEnvVar";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Fixed requeue interval for not-found and failed reconciliations (45 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 45;

/// Resync interval for bindings that reconciled successfully (5 minutes)
///
/// Backing services are not watched; the resync carries their changes into
/// the intermediary object.
pub const RESYNC_DURATION_SECS: u64 = 300;

/// Requeue interval after a conflicting update (immediate)
pub const CONFLICT_REQUEUE_DURATION_SECS: u64 = 0;

/// Tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address for the metrics and health endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Service Binding Operator for Kubernetes
//!
//! Connects applications to backing services (databases, brokers, caches)
//! without the application knowing how each service publishes its
//! connection details.
//!
//! ## Overview
//!
//! A `ServiceBinding` names one or more backing service instances and an
//! application workload. The operator:
//!
//! - Reads binding annotations from the service instance, its CRD and its
//!   OLM `ClusterServiceVersion` descriptors
//! - Extracts the referenced values (attributes, Secrets, ConfigMaps)
//! - Flattens them into environment variable names such as `DATABASE_SECRET_USER`
//! - Writes them into an intermediary Secret named after the binding
//! - Injects that Secret into the application's pod template
//!
//! ## Modules
//!
//! - [`crd`] - The `ServiceBinding` custom resource
//! - [`annotations`] - Binding annotation parser
//! - [`extractor`] - Value extraction for binding directives
//! - [`service_context`] - Per-service binding values
//! - [`planner`] - Backing service resolution
//! - [`envvars`] / [`custom_env`] - Key materialization and custom templates
//! - [`intermediary`] - The intermediary Secret or ConfigMap
//! - [`workload`] - Pod template injection and removal
//! - [`reconcilers`] - The reconciliation state machine
//!
//! ## Example
//!
//! ```rust,no_run
//! use service_binding_operator::crd::{
//!     ApplicationSelector, BackingServiceSelector, ServiceBinding, ServiceBindingSpec,
//! };
//!
//! let binding = ServiceBinding::new(
//!     "binding-request",
//!     ServiceBindingSpec {
//!         services: vec![BackingServiceSelector {
//!             group: "postgresql.example.dev".to_string(),
//!             version: "v1alpha1".to_string(),
//!             kind: "Database".to_string(),
//!             resource_ref: "db-demo".to_string(),
//!             ..Default::default()
//!         }],
//!         application: Some(ApplicationSelector {
//!             group: "apps".to_string(),
//!             version: "v1".to_string(),
//!             resource: "deployments".to_string(),
//!             resource_ref: Some("nodejs-app".to_string()),
//!             ..Default::default()
//!         }),
//!         ..Default::default()
//!     },
//! );
//! ```

pub mod annotations;
pub mod binding_errors;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod custom_env;
pub mod envvars;
pub mod extractor;
pub mod intermediary;
pub mod labels;
pub mod metrics;
pub mod nested;
pub mod planner;
pub mod reconcilers;
pub mod resources;
pub mod service_context;
pub mod status_reasons;
pub mod workload;

#[cfg(test)]
pub(crate) mod resources_fake;
#[cfg(test)]
pub(crate) mod test_fixtures;

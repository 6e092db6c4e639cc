// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation for `ServiceBinding` resources.
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - `ServiceBinding`s, their intermediary objects and the workloads they select
//! 2. **Reconcile** - Resolve backing services and build the binding data
//! 3. **Update** - Write the intermediary object and inject it into the workloads
//! 4. **Status** - Report `CollectionReady` and `InjectionReady` conditions
//!
//! # Modules
//!
//! - [`servicebinding`] - The reconciliation state machine
//! - [`status`] - Condition bookkeeping and status patches
//! - [`finalizers`] - Finalizer handling and cleanup on deletion
//! - [`mapper`] - Maps changed workloads back to the bindings selecting them
//! - [`retry`] - Retry with backoff for transient API errors
//!
//! # Example: Using the Reconciler
//!
//! ```rust,no_run
//! use service_binding_operator::crd::ServiceBinding;
//! use service_binding_operator::reconcilers::reconcile_servicebinding;
//! use service_binding_operator::resources::KubeResourceClient;
//! use std::time::Duration;
//!
//! async fn reconcile(client: kube::Client, binding: ServiceBinding) -> anyhow::Result<()> {
//!     let client = KubeResourceClient::new(client);
//!     reconcile_servicebinding(&client, &binding, Duration::from_secs(45)).await?;
//!     Ok(())
//! }
//! ```

pub mod finalizers;
pub mod mapper;
pub mod retry;
pub mod servicebinding;
pub mod status;

pub use mapper::find_bindings_for_workload;
pub use servicebinding::{reconcile_servicebinding, ReconcileOutcome};

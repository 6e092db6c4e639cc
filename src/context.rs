// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `ServiceBinding` controller.
//!
//! The controller receives an `Arc<Context>` holding:
//! - the dynamic resource client every reconciliation pass goes through
//! - the reflector store of `ServiceBinding`s used by the workload mappers
//! - the operator configuration

use crate::config::OperatorArgs;
use crate::crd::ServiceBinding;
use crate::resources::ResourceClient;
use kube::runtime::reflector::Store;
use std::sync::Arc;
use std::time::Duration;

/// Shared context passed to the controller.
#[derive(Clone)]
pub struct Context {
    /// Dynamic client for API operations
    pub client: Arc<dyn ResourceClient>,

    /// Reflector stores for cross-resource queries
    pub stores: Stores,

    /// Delay before retrying a failed or incomplete pass
    pub requeue: Duration,

    /// Delay before re-reconciling a binding that reconciled successfully
    pub resync: Duration,
}

impl Context {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, stores: Stores, args: &OperatorArgs) -> Self {
        Self {
            client,
            stores,
            requeue: args.requeue(),
            resync: args.resync(),
        }
    }
}

/// Reflector stores populated by the controller's watches.
#[derive(Clone)]
pub struct Stores {
    pub service_bindings: Store<ServiceBinding>,
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;

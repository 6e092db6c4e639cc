// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator command-line and environment configuration.
//!
//! Every flag can also be set through the environment variable named next to
//! it, which is how the operator is configured inside its Deployment.

use crate::constants::{DEFAULT_METRICS_ADDR, ERROR_REQUEUE_DURATION_SECS, RESYNC_DURATION_SECS};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Service Binding Operator
#[derive(Parser, Debug, Clone)]
#[command(name = "service-binding-operator", version, about)]
pub struct OperatorArgs {
    /// Only watch `ServiceBinding`s in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Delay before retrying a failed or incomplete reconciliation
    #[arg(long, env = "REQUEUE_SECONDS", default_value_t = ERROR_REQUEUE_DURATION_SECS)]
    pub requeue_seconds: u64,

    /// Delay before re-reading the backing services of a reconciled binding
    #[arg(long, env = "RESYNC_SECONDS", default_value_t = RESYNC_DURATION_SECS)]
    pub resync_seconds: u64,

    /// Address of the `/metrics` and `/healthz` endpoints
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Re-reconcile bindings when a Deployment, StatefulSet or DaemonSet changes
    #[arg(
        long,
        env = "WATCH_WORKLOADS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub watch_workloads: bool,
}

impl OperatorArgs {
    /// Requeue delay as a [`Duration`].
    #[must_use]
    pub fn requeue(&self) -> Duration {
        Duration::from_secs(self.requeue_seconds)
    }

    /// Resync interval as a [`Duration`].
    #[must_use]
    pub fn resync(&self) -> Duration {
        Duration::from_secs(self.resync_seconds)
    }

    /// Namespace to watch, treating an empty value like an unset one.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.watch_namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

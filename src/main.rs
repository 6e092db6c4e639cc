// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    runtime::{controller::Action, reflector::Store, watcher::Config, Controller},
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use service_binding_operator::{
    binding_errors::BindingError,
    config::OperatorArgs,
    constants::TOKIO_WORKER_THREADS,
    context::{Context, Stores},
    crd::ServiceBinding,
    labels::{K8S_MANAGED_BY, MANAGED_BY_SERVICE_BINDING},
    metrics,
    reconcilers::{
        find_bindings_for_workload, reconcile_servicebinding, retry::requeue_delay,
        ReconcileOutcome,
    },
    resources::KubeResourceClient,
};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] BindingError);

fn main() -> Result<()> {
    let args = OperatorArgs::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("service-binding-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(args: OperatorArgs) -> Result<()> {
    init_tracing();

    info!("Starting Service Binding Operator");
    debug!(?args, "Configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    tokio::spawn(metrics::serve(args.metrics_addr));

    run_servicebinding_controller(client, &args).await;

    error!("CRITICAL: ServiceBinding controller exited");
    Ok(())
}

fn api_for<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the `ServiceBinding` controller until shutdown
async fn run_servicebinding_controller(client: Client, args: &OperatorArgs) {
    let namespace = args.namespace();
    info!(namespace = ?namespace, "Starting ServiceBinding controller");

    let controller = Controller::new(
        api_for::<ServiceBinding>(&client, namespace),
        Config::default().any_semantic(),
    );
    let ctx = Arc::new(Context::new(
        Arc::new(KubeResourceClient::new(client.clone())),
        Stores {
            service_bindings: controller.store(),
        },
        args,
    ));
    let store = &ctx.stores.service_bindings;

    let managed =
        Config::default().labels(&format!("{K8S_MANAGED_BY}={MANAGED_BY_SERVICE_BINDING}"));
    let mut controller = controller
        .owns(api_for::<Secret>(&client, namespace), managed.clone())
        .owns(api_for::<ConfigMap>(&client, namespace), managed);

    if args.watch_workloads {
        debug!("Watching Deployments, StatefulSets and DaemonSets");
        controller = watch_workload::<Deployment>(controller, &client, namespace, store);
        controller = watch_workload::<StatefulSet>(controller, &client, namespace, store);
        controller = watch_workload::<DaemonSet>(controller, &client, namespace, store);
    }

    controller
        .shutdown_on_signal()
        .run(reconcile_servicebinding_wrapper, error_policy, ctx.clone())
        .for_each(|result| {
            if let Err(e) = result {
                debug!(error = %e, "Controller stream error");
            }
            futures::future::ready(())
        })
        .await;
}

/// Re-reconcile the bindings selecting a workload of kind `K` whenever it changes.
fn watch_workload<K>(
    controller: Controller<ServiceBinding>,
    client: &Client,
    namespace: Option<&str>,
    store: &Store<ServiceBinding>,
) -> Controller<ServiceBinding>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    let store = store.clone();
    controller.watches(
        api_for::<K>(client, namespace),
        Config::default(),
        move |workload: K| find_bindings_for_workload(&store, &workload),
    )
}

/// Reconcile wrapper for `ServiceBinding`
async fn reconcile_servicebinding_wrapper(
    binding: Arc<ServiceBinding>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let kind = ServiceBinding::kind(&()).to_string();
    let start = Instant::now();
    debug!(
        name = %binding.name_any(),
        namespace = ?binding.namespace(),
        "Reconcile wrapper called for ServiceBinding"
    );

    match reconcile_servicebinding(ctx.client.as_ref(), &binding, ctx.requeue).await {
        Ok(ReconcileOutcome::Done) => {
            metrics::record_reconciliation_success(&kind, start.elapsed());
            // Backing services are not watched; resync to pick up their changes
            Ok(Action::requeue(ctx.resync))
        }
        Ok(ReconcileOutcome::RequeueAfter(delay)) => {
            metrics::record_reconciliation_success(&kind, start.elapsed());
            Ok(Action::requeue(delay))
        }
        Err(e) => {
            metrics::record_reconciliation_error(&kind, start.elapsed());
            if e.is_conflict() {
                warn!(
                    name = %binding.name_any(),
                    error = %e,
                    "Conflict reconciling ServiceBinding"
                );
            } else {
                error!(
                    name = %binding.name_any(),
                    error = %e,
                    "Failed to reconcile ServiceBinding"
                );
            }
            Err(e.into())
        }
    }
}

/// Error policy for the controller: conflicts retry at once, everything else after the requeue delay
fn error_policy(
    _binding: Arc<ServiceBinding>,
    err: &ReconcileError,
    ctx: Arc<Context>,
) -> Action {
    let reason = if err.0.is_conflict() {
        "conflict"
    } else {
        err.0.status_reason()
    };
    metrics::record_reconciliation_requeue(&ServiceBinding::kind(&()), reason);
    Action::requeue(requeue_delay(&err.0, ctx.requeue))
}

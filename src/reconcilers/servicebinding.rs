// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ServiceBinding` reconciliation.
//!
//! One pass walks the binding through its states:
//!
//! 1. **Unbinding** - the binding is being deleted: undo everything and drop the finalizer
//! 2. **Resolving** - fetch the backing services with their CRDs and descriptors
//! 3. **Collecting** - build the binding data and write the intermediary object
//! 4. **Binding** - inject the intermediary object into the application workloads
//! 5. **Bound** - annotate the services, report status, add the finalizer
//!
//! Every pass is idempotent: re-running it against an unchanged cluster
//! writes nothing.

use crate::binding_errors::BindingError;
use crate::constants::SERVICE_BINDING_FINALIZER;
use crate::crd::ServiceBinding;
use crate::envvars::materialize;
use crate::intermediary;
use crate::labels::{BINDING_NAMESPACE_ANNOTATION, BINDING_NAME_ANNOTATION};
use crate::metrics;
use crate::planner::{self, Plan};
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, FinalizerCleanup};
use crate::reconcilers::status::ServiceBindingStatusUpdater;
use crate::resources::ResourceClient;
use crate::service_context::build_service_contexts;
use crate::status_reasons::{
    CONDITION_COLLECTION_READY, CONDITION_INJECTION_READY, REASON_BINDING_COLLECTED,
    REASON_BINDING_INJECTED, REASON_SERVICE_NOT_FOUND, STATUS_FALSE, STATUS_TRUE,
};
use crate::workload::{self, Injection};
use kube::{Resource, ResourceExt};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a successful reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing more to do until something changes.
    Done,
    /// Try again after the given delay.
    RequeueAfter(Duration),
}

/// Reconcile a single `ServiceBinding`.
///
/// # Errors
///
/// Returns an error when the pass failed and should be retried: API errors,
/// conflicts, resolution or injection failures, and a vanished application
/// for an already bound binding. Failures are also reported in status.
pub async fn reconcile_servicebinding(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
    requeue: Duration,
) -> Result<ReconcileOutcome, BindingError> {
    let namespace = binding.namespace().unwrap_or_default();
    let name = binding.name_any();

    if binding.metadata.deletion_timestamp.is_some() {
        info!(namespace = %namespace, name = %name, "ServiceBinding is being deleted");
        handle_deletion(client, binding, SERVICE_BINDING_FINALIZER).await?;
        metrics::forget_binding(&namespace, &name);
        return Ok(ReconcileOutcome::Done);
    }

    let mut status = ServiceBindingStatusUpdater::new(binding);

    // Resolving
    let plan = match planner::plan(client, binding).await {
        Ok(plan) => plan,
        Err(e @ BindingError::EmptyServices) => {
            info!(namespace = %namespace, name = %name, "No backing services selected");
            for condition in [CONDITION_COLLECTION_READY, CONDITION_INJECTION_READY] {
                status.set_condition(condition, STATUS_FALSE, e.status_reason(), &e.to_string());
            }
            status.apply(client).await?;
            return Ok(ReconcileOutcome::Done);
        }
        Err(e) if e.is_not_found() => {
            info!(
                namespace = %namespace,
                name = %name,
                error = %e,
                "Backing service not found, requeueing"
            );
            // A binding that was injected before is no longer backed by its service.
            for condition in [CONDITION_COLLECTION_READY, CONDITION_INJECTION_READY] {
                status.set_condition(
                    condition,
                    STATUS_FALSE,
                    REASON_SERVICE_NOT_FOUND,
                    &e.to_string(),
                );
            }
            status.apply(client).await?;
            metrics::record_reconciliation_requeue(
                &ServiceBinding::kind(&()),
                REASON_SERVICE_NOT_FOUND,
            );
            return Ok(ReconcileOutcome::RequeueAfter(requeue));
        }
        Err(e) => return fail(client, &mut status, e).await,
    };

    // Collecting
    let intermediary = match collect(client, binding, &plan).await {
        Ok(collected) => collected,
        Err(e) => return fail(client, &mut status, e).await,
    };
    status.set_condition(
        CONDITION_COLLECTION_READY,
        STATUS_TRUE,
        REASON_BINDING_COLLECTED,
        "",
    );
    status.set_secret(&name);

    // Binding
    let injection = Injection::new(
        binding,
        intermediary.volume_keys,
        intermediary.resource_version,
    );
    let applications = match workload::bind(client, binding, &injection).await {
        Ok(applications) => applications,
        Err(e @ BindingError::EmptyApplication) => {
            info!(namespace = %namespace, name = %name, "No application selected");
            status.set_condition(
                CONDITION_INJECTION_READY,
                STATUS_FALSE,
                e.status_reason(),
                &e.to_string(),
            );
            status.apply(client).await?;
            return Ok(ReconcileOutcome::Done);
        }
        Err(e @ BindingError::ApplicationNotFound) => {
            status.set_condition(
                CONDITION_INJECTION_READY,
                STATUS_FALSE,
                e.status_reason(),
                &e.to_string(),
            );
            status.apply(client).await?;
            if binding.has_finalizer(SERVICE_BINDING_FINALIZER) {
                warn!(namespace = %namespace, name = %name, "Bound application disappeared");
                return Err(e);
            }
            debug!(namespace = %namespace, name = %name, "Application not found yet");
            return Ok(ReconcileOutcome::Done);
        }
        Err(e) if e.is_conflict() => {
            status.apply(client).await?;
            return Err(e);
        }
        Err(e) => return fail(client, &mut status, e).await,
    };

    // Bound
    if let Err(e) = annotate_services(client, binding, &plan).await {
        return fail(client, &mut status, e).await;
    }
    status.set_condition(
        CONDITION_INJECTION_READY,
        STATUS_TRUE,
        REASON_BINDING_INJECTED,
        "",
    );
    metrics::record_bound_applications(&namespace, &name, applications.len());
    status.set_applications(applications);
    status.apply(client).await?;

    ensure_finalizer(client, binding, SERVICE_BINDING_FINALIZER).await?;

    info!(namespace = %namespace, name = %name, "ServiceBinding reconciled");
    Ok(ReconcileOutcome::Done)
}

/// What the collecting phase hands to the binding phase.
struct Collected {
    volume_keys: Vec<String>,
    resource_version: Option<String>,
}

async fn collect(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
    plan: &Plan,
) -> Result<Collected, BindingError> {
    let contexts =
        build_service_contexts(client, plan, binding.detect_binding_resources()).await?;
    let data = materialize(
        &contexts,
        binding.spec.env_var_prefix.as_deref(),
        &binding.spec.custom_env_var,
    )?;
    let stored = intermediary::commit(client, binding, &data).await?;

    Ok(Collected {
        volume_keys: data.volume_keys,
        resource_version: stored["metadata"]["resourceVersion"]
            .as_str()
            .map(ToString::to_string),
    })
}

/// Report a failed pass as `InjectionReady=False` and return the error.
async fn fail(
    client: &dyn ResourceClient,
    status: &mut ServiceBindingStatusUpdater,
    err: BindingError,
) -> Result<ReconcileOutcome, BindingError> {
    warn!(error = %err, "ServiceBinding reconciliation failed");
    status.set_condition(
        CONDITION_INJECTION_READY,
        STATUS_FALSE,
        err.status_reason(),
        &err.to_string(),
    );
    status.apply(client).await?;
    Err(err)
}

fn has_cross_reference(service: &Value, binding: &ServiceBinding) -> bool {
    let annotations = &service["metadata"]["annotations"];
    annotations[BINDING_NAMESPACE_ANNOTATION].as_str() == binding.namespace().as_deref()
        && annotations[BINDING_NAME_ANNOTATION].as_str() == Some(binding.name_any().as_str())
}

/// Set the cross-reference annotations on every resolved backing service.
async fn annotate_services(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
    plan: &Plan,
) -> Result<(), BindingError> {
    let patch = json!({
        "metadata": {
            "annotations": {
                BINDING_NAMESPACE_ANNOTATION: binding.namespace().unwrap_or_default(),
                BINDING_NAME_ANNOTATION: binding.name_any(),
            }
        }
    });

    for related in &plan.related_resources {
        if has_cross_reference(&related.service, binding) {
            continue;
        }
        client
            .patch(
                &related.resource,
                &related.namespace,
                &related.selector.resource_ref,
                &patch,
            )
            .await?;
        debug!(
            kind = %related.gvk.kind,
            namespace = %related.namespace,
            name = %related.selector.resource_ref,
            "Annotated backing service"
        );
    }
    Ok(())
}

/// Remove the cross-reference annotations from every backing service that still carries them.
///
/// Services that no longer exist are skipped.
async fn strip_service_annotations(
    client: &dyn ResourceClient,
    binding: &ServiceBinding,
) -> Result<(), BindingError> {
    let plan = match planner::plan(client, binding).await {
        Ok(plan) => plan,
        Err(e) if e.is_not_found() || matches!(e, BindingError::EmptyServices) => {
            debug!(error = %e, "Backing services unavailable, skipping annotation cleanup");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let patch = json!({
        "metadata": {
            "annotations": {
                BINDING_NAMESPACE_ANNOTATION: null,
                BINDING_NAME_ANNOTATION: null,
            }
        }
    });

    for related in plan
        .related_resources
        .iter()
        .filter(|r| has_cross_reference(&r.service, binding))
    {
        match client
            .patch(
                &related.resource,
                &related.namespace,
                &related.selector.resource_ref,
                &patch,
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl FinalizerCleanup for ServiceBinding {
    async fn cleanup(&self, client: &dyn ResourceClient) -> Result<(), BindingError> {
        strip_service_annotations(client, self).await?;

        let injection = Injection::new(self, Vec::new(), None);
        workload::unbind(client, self, &injection).await?;

        intermediary::delete_intermediary(client, self).await
    }
}

#[cfg(test)]
#[path = "servicebinding_tests.rs"]
mod servicebinding_tests;

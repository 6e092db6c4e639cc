// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic finalizer management for namespaced resources.
//!
//! A `ServiceBinding` only carries its finalizer once an application has been
//! bound; its presence is what tells a deletion pass that there is something
//! to undo.
//!
//! # Example
//!
//! ```rust,ignore
//! use service_binding_operator::reconcilers::finalizers::{ensure_finalizer, handle_deletion};
//!
//! if binding.metadata.deletion_timestamp.is_some() {
//!     return handle_deletion(client, &binding, FINALIZER).await;
//! }
//! // ... bind ...
//! ensure_finalizer(client, &binding, FINALIZER).await?;
//! ```

use crate::binding_errors::BindingError;
use crate::resources::ResourceClient;
use kube::api::ApiResource;
use kube::core::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::info;

/// Cleanup to run before a finalizer is removed.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone {
    /// Undo everything the resource caused.
    ///
    /// # Errors
    ///
    /// If this method returns an error the finalizer is NOT removed and
    /// deletion stays blocked until cleanup succeeds.
    async fn cleanup(&self, client: &dyn ResourceClient) -> Result<(), BindingError>;
}

fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Add a finalizer to a resource if not already present.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizer<T>(
    client: &dyn ResourceClient,
    resource: &T,
    finalizer: &str,
) -> Result<(), BindingError>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope> + ResourceExt,
{
    if has_finalizer(resource, finalizer) {
        return Ok(());
    }

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    client
        .patch(&ApiResource::erase::<T>(&()), &namespace, &name, &patch)
        .await?;

    info!(
        finalizer,
        kind = %T::kind(&()),
        namespace = %namespace,
        name = %name,
        "Added finalizer"
    );
    Ok(())
}

/// Remove a finalizer from a resource. No-op when absent.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizer<T>(
    client: &dyn ResourceClient,
    resource: &T,
    finalizer: &str,
) -> Result<(), BindingError>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope> + ResourceExt,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.retain(|f| f != finalizer);

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    client
        .patch(&ApiResource::erase::<T>(&()), &namespace, &name, &patch)
        .await?;

    info!(
        finalizer,
        kind = %T::kind(&()),
        namespace = %namespace,
        name = %name,
        "Removed finalizer"
    );
    Ok(())
}

/// Run cleanup and remove the finalizer of a resource being deleted.
///
/// Without the finalizer there is nothing to undo and nothing happens.
///
/// # Errors
///
/// Returns an error if cleanup or the finalizer removal fails; the finalizer
/// then stays in place and the next pass retries.
pub async fn handle_deletion<T>(
    client: &dyn ResourceClient,
    resource: &T,
    finalizer: &str,
) -> Result<(), BindingError>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + ResourceExt
        + FinalizerCleanup
        + Sync,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    if !has_finalizer(resource, finalizer) {
        info!(
            kind = %T::kind(&()),
            namespace = %namespace,
            name = %name,
            "Deleted without finalizer, nothing to clean up"
        );
        return Ok(());
    }

    info!(kind = %T::kind(&()), namespace = %namespace, name = %name, "Running cleanup");
    resource.cleanup(client).await?;
    remove_finalizer(client, resource, finalizer).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;

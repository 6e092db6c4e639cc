// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch mappers: which `ServiceBinding`s does a changed object affect?
//!
//! The controller keeps a reflector store of all bindings. When a workload
//! changes (a Deployment is created, relabelled, or its pod template is
//! rewritten by someone else) the mapper synchronously queries that cache for
//! the bindings selecting it, so a newly matching workload gets bound without
//! waiting for the next requeue.
//!
//! # Example
//!
//! ```rust,no_run
//! use service_binding_operator::crd::ServiceBinding;
//! use service_binding_operator::reconcilers::mapper::find_bindings_for_workload;
//! use k8s_openapi::api::apps::v1::Deployment;
//! use kube::runtime::reflector::Store;
//!
//! # fn example(store: Store<ServiceBinding>, deployment: Deployment) {
//! for binding in find_bindings_for_workload(&store, &deployment) {
//!     println!("binding {} selects this deployment", binding.name);
//! }
//! # }
//! ```

use crate::crd::{ApplicationSelector, ServiceBinding};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Find the bindings in `store` whose application selector matches `workload`.
///
/// Only bindings in the workload's namespace are considered. A selector
/// matches when its group and plural resource are those of `K` and either its
/// name equals the workload's or (without a name) its labels are all present.
pub fn find_bindings_for_workload<K>(
    store: &Store<ServiceBinding>,
    workload: &K,
) -> Vec<ObjectRef<ServiceBinding>>
where
    K: Resource<DynamicType = ()> + ResourceExt,
{
    let namespace = workload.namespace().unwrap_or_default();
    let name = workload.name_any();
    let group = K::group(&());
    let plural = K::plural(&());

    store
        .state()
        .iter()
        .filter(|binding| binding.namespace().unwrap_or_default() == namespace)
        .filter(|binding| {
            binding.spec.application.as_ref().is_some_and(|selector| {
                selector.group == group
                    && selector.resource == plural
                    && selects(selector, &name, workload.labels())
            })
        })
        .map(|binding| ObjectRef::from_obj(&**binding))
        .collect()
}

fn selects(selector: &ApplicationSelector, name: &str, labels: &BTreeMap<String, String>) -> bool {
    if let Some(wanted) = selector.name() {
        return wanted == name;
    }
    selector
        .label_selector
        .as_ref()
        .is_some_and(|s| !s.match_labels.is_empty() && s.matches(labels))
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod mapper_tests;

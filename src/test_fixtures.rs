// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests: a PostgreSQL-style backing service, its CRD
//! and CSV, an application Deployment and `ServiceBinding` builders.

use crate::crd::{ApplicationSelector, BackingServiceSelector, ServiceBinding, ServiceBindingSpec};
use crate::resources::{crd_resource, csv_resource, resource_for_gvr, secret_resource};
use crate::resources_fake::FakeResourceClient;
use kube::api::ApiResource;
use kube::core::GroupVersionKind;
use serde_json::{json, Value};

pub const NAMESPACE: &str = "demo";
pub const DB_GROUP: &str = "postgresql.example.dev";
pub const DB_VERSION: &str = "v1alpha1";
pub const DB_KIND: &str = "Database";
pub const DB_NAME: &str = "db-demo";
pub const APP_NAME: &str = "nodejs-app";
pub const BINDING_NAME: &str = "binding-request";

pub fn database_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(DB_GROUP, DB_VERSION, DB_KIND),
        "databases",
    )
}

pub fn deployment_resource() -> ApiResource {
    resource_for_gvr("apps", "v1", "deployments")
}

/// A `Database` whose status points at a credentials Secret.
pub fn database(name: &str) -> Value {
    json!({
        "apiVersion": format!("{DB_GROUP}/{DB_VERSION}"),
        "kind": DB_KIND,
        "metadata": {"name": name, "namespace": NAMESPACE, "uid": format!("uid-{name}")},
        "spec": {"image": "postgres:13"},
        "status": {
            "dbName": name,
            "dbCredentials": format!("{name}-credentials"),
            "dbConnectionIP": "10.0.0.5",
            "dbConnectionPort": 5432
        }
    })
}

/// Credentials Secret referenced by [`database`]: `user` / `password`.
pub fn credentials(name: &str) -> Value {
    json!({
        "metadata": {"name": format!("{name}-credentials"), "namespace": NAMESPACE},
        "data": {"user": "dXNlcg==", "password": "cGFzc3dvcmQ="}
    })
}

/// `Database` CRD annotated to bind the credentials Secret.
pub fn database_crd() -> Value {
    json!({
        "metadata": {
            "name": format!("databases.{DB_GROUP}"),
            "annotations": {
                "servicebindingoperator.redhat.io/status.dbCredentials": "binding:env:object:secret"
            }
        },
        "spec": {"group": DB_GROUP, "names": {"kind": DB_KIND, "plural": "databases"}}
    })
}

/// CSV owning the `Database` CRD, with a status descriptor for `dbName`.
pub fn database_csv() -> Value {
    json!({
        "metadata": {"name": "postgresql-operator.v0.0.1", "namespace": NAMESPACE},
        "spec": {
            "customresourcedefinitions": {
                "owned": [{
                    "name": format!("databases.{DB_GROUP}"),
                    "version": DB_VERSION,
                    "kind": DB_KIND,
                    "statusDescriptors": [{
                        "path": "dbName",
                        "x-descriptors": ["binding:env:attribute"]
                    }]
                }]
            }
        }
    })
}

/// A one-container Deployment.
pub fn deployment(name: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "labels": {"app": name}
        },
        "spec": {
            "template": {
                "spec": {
                    "containers": [{"name": "app", "image": "nodejs:latest"}]
                }
            }
        }
    })
}

pub fn database_selector(name: &str) -> BackingServiceSelector {
    BackingServiceSelector {
        group: DB_GROUP.to_string(),
        version: DB_VERSION.to_string(),
        kind: DB_KIND.to_string(),
        resource_ref: name.to_string(),
        ..Default::default()
    }
}

pub fn deployment_selector(name: &str) -> ApplicationSelector {
    ApplicationSelector {
        group: "apps".to_string(),
        version: "v1".to_string(),
        resource: "deployments".to_string(),
        resource_ref: Some(name.to_string()),
        ..Default::default()
    }
}

/// A `ServiceBinding` in [`NAMESPACE`] with a uid.
pub fn binding(spec: ServiceBindingSpec) -> ServiceBinding {
    let mut binding = ServiceBinding::new(BINDING_NAME, spec);
    binding.metadata.namespace = Some(NAMESPACE.to_string());
    binding.metadata.uid = Some("uid-binding".to_string());
    binding
}

/// Binding of [`DB_NAME`] into [`APP_NAME`].
pub fn default_binding() -> ServiceBinding {
    binding(ServiceBindingSpec {
        application: Some(deployment_selector(APP_NAME)),
        services: vec![database_selector(DB_NAME)],
        ..Default::default()
    })
}

/// A fake cluster holding the database, its Secret, CRD and CSV, and the app.
pub fn seeded_client() -> FakeResourceClient {
    let client = FakeResourceClient::new();
    client.insert(&database_resource(), database(DB_NAME));
    client.insert(&secret_resource(), credentials(DB_NAME));
    client.insert(&crd_resource(), database_crd());
    client.insert(&csv_resource(), database_csv());
    client.insert(&deployment_resource(), deployment(APP_NAME));
    client
}

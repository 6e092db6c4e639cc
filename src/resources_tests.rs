// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::binding_errors::BindingError;
    use crate::resources::*;
    use serde_json::json;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: "boom".to_string(),
            reason: reason.to_string(),
            code,
            metadata: None,
            details: None,
        }))
    }

    #[test]
    fn test_map_404_to_not_found() {
        let err = map_kube_error(api_error(404, "NotFound"), &secret_resource(), "demo", "db");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "secrets 'demo/db' not found");
    }

    #[test]
    fn test_map_409_already_exists() {
        let err = map_kube_error(
            api_error(409, "AlreadyExists"),
            &secret_resource(),
            "demo",
            "db",
        );
        assert!(matches!(err, BindingError::AlreadyExists { .. }));
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_map_409_conflict() {
        let err = map_kube_error(api_error(409, "Conflict"), &secret_resource(), "demo", "db");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_map_other_errors_pass_through() {
        let err = map_kube_error(api_error(500, "InternalError"), &secret_resource(), "demo", "db");
        assert!(matches!(err, BindingError::Kube(_)));
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(split_api_version("apps/v1"), ("apps", "v1"));
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }

    #[test]
    fn test_object_accessors() {
        let obj = json!({
            "apiVersion": "postgresql.example.dev/v1alpha1",
            "kind": "Database",
            "metadata": {"name": "db1", "namespace": "demo", "uid": "u-1"}
        });
        assert_eq!(object_name(&obj), "db1");
        assert_eq!(object_uid(&obj), "u-1");

        let gvk = object_gvk(&obj);
        assert_eq!(gvk.group, "postgresql.example.dev");
        assert_eq!(gvk.version, "v1alpha1");
        assert_eq!(gvk.kind, "Database");
    }

    #[test]
    fn test_well_known_resources() {
        assert_eq!(secret_resource().api_version, "v1");
        assert_eq!(config_map_resource().plural, "configmaps");
        assert_eq!(service_resource().plural, "services");
        assert_eq!(route_resource().api_version, "route.openshift.io/v1");
        assert_eq!(csv_resource().plural, "clusterserviceversions");
        assert_eq!(crd_resource().api_version, "apiextensions.k8s.io/v1");
    }

    #[test]
    fn test_resource_for_gvr() {
        let ar = resource_for_gvr("apps", "v1", "deployments");
        assert_eq!(ar.api_version, "apps/v1");
        assert_eq!(ar.plural, "deployments");
    }
}

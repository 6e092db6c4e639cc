// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `binding_errors.rs`

#[cfg(test)]
mod tests {
    use crate::binding_errors::{AnnotationError, BindingError, PathError};

    fn not_found() -> BindingError {
        BindingError::NotFound {
            kind: "Secret".to_string(),
            namespace: "demo".to_string(),
            name: "db-credentials".to_string(),
        }
    }

    fn conflict() -> BindingError {
        BindingError::Conflict {
            kind: "deployments".to_string(),
            namespace: "demo".to_string(),
            name: "app".to_string(),
            message: "the object has been modified".to_string(),
        }
    }

    #[test]
    fn test_not_found_classification() {
        assert!(not_found().is_not_found());
        assert!(!not_found().is_conflict());
        assert!(!not_found().is_soft());
    }

    #[test]
    fn test_conflict_classification() {
        assert!(conflict().is_conflict());
        assert!(!conflict().is_not_found());
    }

    #[test]
    fn test_soft_errors() {
        let invalid_prefix = BindingError::from(AnnotationError::InvalidPrefix {
            key: "app.kubernetes.io/name".to_string(),
        });
        let no_handler = BindingError::from(AnnotationError::HandlerNotFound {
            value: "binding:env:unknown".to_string(),
        });
        let empty_name = BindingError::from(AnnotationError::EmptyName {
            key: "servicebinding.dev/".to_string(),
        });

        assert!(invalid_prefix.is_soft());
        assert!(no_handler.is_soft());
        assert!(!empty_name.is_soft(), "empty names must fail explicitly");
    }

    #[test]
    fn test_path_errors_are_not_soft() {
        let err = BindingError::from(PathError::WrongType {
            path: "status.dbCredentials".to_string(),
            expected: "an object",
        });
        assert!(!err.is_soft());
        assert_eq!(err.to_string(), "field 'status.dbCredentials' is not an object");
    }

    #[test]
    fn test_status_reasons() {
        assert_eq!(
            BindingError::EmptyServices.status_reason(),
            "EmptyServiceSelectors"
        );
        assert_eq!(
            BindingError::EmptyApplication.status_reason(),
            "EmptyApplicationSelector"
        );
        assert_eq!(
            BindingError::ApplicationNotFound.status_reason(),
            "ApplicationNotFound"
        );
        assert_eq!(not_found().status_reason(), "BindingFail");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            not_found().to_string(),
            "Secret 'demo/db-credentials' not found"
        );
        let err = BindingError::ContainersNotFound {
            path: "spec.template.spec.containers".to_string(),
            kind: "CronJob".to_string(),
            name: "nightly".to_string(),
        };
        assert!(err.to_string().contains("is this definition supported?"));
    }
}

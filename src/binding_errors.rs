// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the binding resolution and injection pipeline.
//!
//! This module provides specialized error types for:
//! - Binding annotation parsing
//! - Nested document path traversal
//! - Cluster API lookups (not found, conflicts)
//! - Workload injection failures
//!
//! Each error maps onto one of four handling classes: soft errors are logged and
//! skipped, not-found and conflicts are retried, configuration errors are reported
//! in status only, and everything else fails the current reconciliation pass.

use thiserror::Error;

/// Errors produced while parsing a binding annotation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    /// The annotation key does not carry a binding prefix.
    ///
    /// Not an error condition for callers: the annotation simply isn't ours.
    #[error("invalid annotation prefix in '{key}'")]
    InvalidPrefix {
        /// The full annotation key
        key: String,
    },

    /// The annotation key carries a binding prefix with nothing after it.
    #[error("empty annotation name in '{key}'")]
    EmptyName {
        /// The full annotation key
        key: String,
    },

    /// The annotation value does not name a known binding handler.
    #[error("could not find handler for annotation value '{value}'")]
    HandlerNotFound {
        /// The annotation value
        value: String,
    },

    /// A structured annotation value is malformed.
    #[error("invalid binding annotation value '{value}': {reason}")]
    InvalidValue {
        /// The annotation value
        value: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Errors produced while walking a nested document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A segment of the path does not exist.
    #[error("field '{path}' not found")]
    NotFound {
        /// The path up to and including the missing segment
        path: String,
    },

    /// A segment exists but has the wrong type to continue the walk.
    #[error("field '{path}' is not {expected}")]
    WrongType {
        /// The path up to and including the offending segment
        path: String,
        /// Human-readable expected type (e.g. "an object")
        expected: &'static str,
    },
}

/// Composite error type for the binding pipeline.
///
/// This is the primary error type returned by the planner, the extractor,
/// the workload binder and the reconciler.
#[derive(Error, Debug)]
pub enum BindingError {
    /// Annotation parsing failed
    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    /// A nested document walk failed
    #[error(transparent)]
    Path(#[from] PathError),

    /// A cluster object does not exist (HTTP 404)
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        /// Kind or plural resource of the missing object
        kind: String,
        /// Namespace of the missing object (empty for cluster-scoped)
        namespace: String,
        /// Name of the missing object
        name: String,
    },

    /// Create failed because the object already exists (HTTP 409 `AlreadyExists`)
    #[error("{kind} '{namespace}/{name}' already exists")]
    AlreadyExists {
        /// Kind or plural resource of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// Update lost an optimistic-concurrency race (HTTP 409 `Conflict`)
    #[error("conflict updating {kind} '{namespace}/{name}': {message}")]
    Conflict {
        /// Kind or plural resource of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Message returned by the API server
        message: String,
    },

    /// The binding declares no backing services
    #[error("backing service selectors are empty")]
    EmptyServices,

    /// The binding declares neither an application name nor labels
    #[error("application selector is empty")]
    EmptyApplication,

    /// No workload matched the application selector
    #[error("application not found")]
    ApplicationNotFound,

    /// The workload has no container list at the configured path
    #[error("unable to find '{path}' in {kind} '{name}', is this definition supported?")]
    ContainersNotFound {
        /// Configured containers path
        path: String,
        /// Workload kind
        kind: String,
        /// Workload name
        name: String,
    },

    /// An explicitly requested key is absent from a Secret or ConfigMap
    #[error("key '{key}' not found in {kind} '{name}'")]
    KeyNotFound {
        /// The requested key
        key: String,
        /// Secret or ConfigMap
        kind: String,
        /// Name of the object
        name: String,
    },

    /// A Secret value is not valid base64
    #[error("failed to decode key '{key}' of Secret '{name}': {source}")]
    Decode {
        /// The offending key
        key: String,
        /// Name of the Secret
        name: String,
        /// Underlying decode error
        #[source]
        source: base64::DecodeError,
    },

    /// A custom variable template failed to render
    #[error("failed to render custom variable '{name}': {source}")]
    Template {
        /// Name of the custom variable
        name: String,
        /// Underlying template error
        #[source]
        source: minijinja::Error,
    },

    /// A document could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other Kubernetes API error
    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl BindingError {
    /// Returns true if this is a clean not-found from a cluster lookup.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if the API server refused access (HTTP 403).
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 403)
    }

    /// Returns true for errors that only invalidate a single directive.
    ///
    /// Soft errors are logged and skipped; processing of the remaining
    /// directives continues.
    #[must_use]
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Annotation(
                AnnotationError::InvalidPrefix { .. } | AnnotationError::HandlerNotFound { .. }
            )
        )
    }

    /// Returns the status condition reason for this error.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::EmptyServices => crate::status_reasons::REASON_EMPTY_SERVICE_SELECTORS,
            Self::EmptyApplication => crate::status_reasons::REASON_EMPTY_APPLICATION_SELECTOR,
            Self::ApplicationNotFound => crate::status_reasons::REASON_APPLICATION_NOT_FOUND,
            _ => crate::status_reasons::REASON_BINDING_FAIL,
        }
    }
}

#[cfg(test)]
#[path = "binding_errors_tests.rs"]
mod binding_errors_tests;

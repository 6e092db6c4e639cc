// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines the standard Kubernetes labels stamped on objects the
//! operator creates, and the annotations used to cross-reference a `ServiceBinding`
//! from the objects it touches.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/managed-by` on intermediary Secrets and ConfigMaps
pub const MANAGED_BY_SERVICE_BINDING: &str = "ServiceBinding";

/// Value for `app.kubernetes.io/part-of` on intermediary Secrets and ConfigMaps
pub const PART_OF_SERVICE_BINDING_OPERATOR: &str = "service-binding-operator";

// ============================================================================
// Cross-Reference Annotations
// ============================================================================

/// Namespace of the `ServiceBinding` that references this object
pub const BINDING_NAMESPACE_ANNOTATION: &str =
    "service-binding-operator.operators.coreos.com/binding-namespace";

/// Name of the `ServiceBinding` that references this object
pub const BINDING_NAME_ANNOTATION: &str =
    "service-binding-operator.operators.coreos.com/binding-name";

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition types and reasons for `ServiceBinding` resources.
//!
//! Condition type strings are part of the public status contract consumed by
//! dashboards and tooling. Reasons are programmatic identifiers in `CamelCase`
//! that explain why a condition has a particular status.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   secret: binding-request
//!   conditions:
//!     - type: CollectionReady
//!       status: "True"
//!       reason: BindingCollected
//!     - type: InjectionReady
//!       status: "False"
//!       reason: ApplicationNotFound
//!       message: "application not found"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Binding data was collected and persisted in the intermediary object.
pub const CONDITION_COLLECTION_READY: &str = "CollectionReady";

/// The intermediary object was injected into the application workloads.
pub const CONDITION_INJECTION_READY: &str = "InjectionReady";

// ============================================================================
// Condition Status Values
// ============================================================================

/// Condition holds.
pub const STATUS_TRUE: &str = "True";

/// Condition does not hold.
pub const STATUS_FALSE: &str = "False";

// ============================================================================
// Collection Reasons
// ============================================================================

/// The `ServiceBinding` declares no backing services.
pub const REASON_EMPTY_SERVICE_SELECTORS: &str = "EmptyServiceSelectors";

/// A selected backing service could not be found.
pub const REASON_SERVICE_NOT_FOUND: &str = "ServiceNotFound";

/// Binding data was collected into the intermediary object.
pub const REASON_BINDING_COLLECTED: &str = "BindingCollected";

// ============================================================================
// Injection Reasons
// ============================================================================

/// The `ServiceBinding` declares no application.
///
/// This is a "not yet configured" state, not an error.
pub const REASON_EMPTY_APPLICATION_SELECTOR: &str = "EmptyApplicationSelector";

/// No workload matched the application selector.
pub const REASON_APPLICATION_NOT_FOUND: &str = "ApplicationNotFound";

/// The intermediary object was injected into every matched workload.
pub const REASON_BINDING_INJECTED: &str = "BindingInjected";

/// Resolution, collection or injection failed.
pub const REASON_BINDING_FAIL: &str = "BindingFail";

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `ServiceBinding` resources.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (`CollectionReady`, `InjectionReady`)
//! - `status`: "True" or "False"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the condition changed
//!
//! # Example
//!
//! ```rust
//! use service_binding_operator::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "CollectionReady",
//!     "True",
//!     "BindingCollected",
//!     "",
//! );
//! assert_eq!(condition.status, "True");
//! ```

use crate::binding_errors::BindingError;
use crate::crd::{BoundApplication, Condition, ServiceBinding, ServiceBindingStatus};
use crate::resources::ResourceClient;
use chrono::Utc;
use kube::api::ApiResource;
use kube::ResourceExt;
use serde_json::json;
use tracing::debug;

/// Create a new Kubernetes condition with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// The `lastTransitionTime` is preserved when the status does not change.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr_cond| {
            curr_cond.status == new_cond.status
                && curr_cond.reason == new_cond.reason
                && curr_cond.message == new_cond.message
        })
    })
}

/// Collects status changes during a reconciliation pass and writes them in a
/// single merge patch of the status subresource.
///
/// The patch is skipped when the new status is semantically equal to the
/// current one, so status writes never retrigger the controller needlessly.
pub struct ServiceBindingStatusUpdater {
    namespace: String,
    name: String,
    current_status: Option<ServiceBindingStatus>,
    new_status: ServiceBindingStatus,
}

impl ServiceBindingStatusUpdater {
    #[must_use]
    pub fn new(binding: &ServiceBinding) -> Self {
        let current_status = binding.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: binding.namespace().unwrap_or_default(),
            name: binding.name_any(),
            current_status,
            new_status,
        }
    }

    /// Update or add a condition (in-memory only, no API call).
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
        );
    }

    /// Record the name of the intermediary object.
    pub fn set_secret(&mut self, name: &str) {
        name.clone_into(&mut self.new_status.secret);
    }

    /// Record the bound applications.
    pub fn set_applications(&mut self, applications: Vec<BoundApplication>) {
        self.new_status.applications = applications;
    }

    /// Whether the new status differs from the current one.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true,
            Some(current) => {
                current.secret != self.new_status.secret
                    || current.applications != self.new_status.applications
                    || !conditions_equal(&current.conditions, &self.new_status.conditions)
            }
        }
    }

    /// Write the collected status, if it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the status patch fails.
    pub async fn apply(&self, client: &dyn ResourceClient) -> Result<(), BindingError> {
        if !self.has_changes() {
            debug!(
                namespace = %self.namespace,
                name = %self.name,
                "ServiceBinding status unchanged, skipping update"
            );
            return Ok(());
        }

        let resource = ApiResource::erase::<ServiceBinding>(&());
        let patch = json!({ "status": self.new_status });
        client
            .patch_status(&resource, &self.namespace, &self.name, &patch)
            .await?;

        debug!(
            namespace = %self.namespace,
            name = %self.name,
            conditions = self.new_status.conditions.len(),
            applications = self.new_status.applications.len(),
            "Updated ServiceBinding status"
        );

        Ok(())
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Key materializer.
//!
//! Flattens the service contexts into the final binding keys, renders the
//! custom variables and merges everything into one [`BindingData`] set.
//!
//! Keys are built from an optional request-wide prefix, a per-service prefix
//! (the selector's `envVarPrefix`, defaulting to the kind) and the flattened
//! path of each value:
//!
//! ```rust
//! use service_binding_operator::envvars::env_key;
//!
//! assert_eq!(env_key(&["Database", "secret", "user"]), "DATABASE_SECRET_USER");
//! assert_eq!(env_key(&["app", "Route", "status.host"]), "APP_ROUTE_STATUS_HOST");
//! ```

use crate::binding_errors::BindingError;
use crate::crd::CustomEnvVar;
use crate::custom_env::render_custom_env_vars;
use crate::nested::{flatten, set_segments};
use crate::service_context::ServiceContext;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// The merged binding data written into the intermediary object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindingData {
    pub env_vars: BTreeMap<String, Vec<u8>>,
    /// Keys also projected as files into the application.
    pub volume_keys: Vec<String>,
}

/// Join non-empty segments with `_`, uppercase, and replace `.` and `:` with `_`.
#[must_use]
pub fn env_key<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
        .replace(['.', ':'], "_")
}

/// Key prefixes of a context: the request prefix (if any) and the service prefix.
///
/// The service prefix is the context's `env_var_prefix`; when unset it is the
/// kind, and an explicit empty string removes it.
#[must_use]
pub fn key_prefixes(global_prefix: Option<&str>, ctx: &ServiceContext) -> Vec<String> {
    let mut prefixes = Vec::with_capacity(2);
    if let Some(global) = global_prefix.filter(|p| !p.is_empty()) {
        prefixes.push(global.to_string());
    }
    match &ctx.env_var_prefix {
        Some(prefix) if !prefix.is_empty() => prefixes.push(prefix.clone()),
        Some(_) => {}
        None => prefixes.push(ctx.gvk.kind.clone()),
    }
    prefixes
}

fn prefixed_key(prefixes: &[String], path: &str) -> String {
    let mut segments = prefixes.to_vec();
    segments.push(path.to_string());
    env_key(&segments)
}

/// Flattened binding keys of a single context.
///
/// Secret values that are not valid UTF-8 keep their raw bytes.
#[must_use]
pub fn service_env_vars(
    global_prefix: Option<&str>,
    ctx: &ServiceContext,
) -> BTreeMap<String, Vec<u8>> {
    let prefixes = key_prefixes(global_prefix, ctx);
    flatten(&ctx.env_vars, &[] as &[&str])
        .into_iter()
        .map(|(path, text)| {
            let value = ctx
                .binary_data
                .get(&path)
                .cloned()
                .unwrap_or_else(|| text.into_bytes());
            (prefixed_key(&prefixes, &path), value)
        })
        .collect()
}

/// Template context shared by every custom variable.
///
/// Each context's object copy is reachable at `[version][group][kind][name]`,
/// at `[version][group_with_underscores][kind][name_with_underscores]` and at
/// `[id]` when the selector sets one.
#[must_use]
pub fn template_context(contexts: &[ServiceContext]) -> Value {
    let mut root = json!({});

    for ctx in contexts {
        let version = ctx.gvk.version.as_str();
        let kind = ctx.gvk.kind.as_str();
        set_segments(
            &mut root,
            &[version, ctx.gvk.group.as_str(), kind, ctx.name.as_str()],
            ctx.service.clone(),
        );

        let group = ctx.gvk.group.replace('.', "_");
        let name = ctx.name.replace('-', "_");
        set_segments(
            &mut root,
            &[version, group.as_str(), kind, name.as_str()],
            ctx.service.clone(),
        );

        if let Some(id) = ctx.id.as_deref().filter(|id| !id.is_empty()) {
            set_segments(&mut root, &[id], ctx.service.clone());
        }
    }

    root
}

/// Materialize contexts and custom variables into the final binding data.
///
/// Later contexts overwrite earlier keys; custom variables are applied last
/// and keep their names verbatim.
///
/// # Errors
///
/// Returns [`BindingError::Template`] when a custom variable fails to render.
pub fn materialize(
    contexts: &[ServiceContext],
    global_prefix: Option<&str>,
    custom_env_vars: &[CustomEnvVar],
) -> Result<BindingData, BindingError> {
    let mut data = BindingData::default();

    for ctx in contexts {
        data.env_vars.extend(service_env_vars(global_prefix, ctx));

        let prefixes = key_prefixes(global_prefix, ctx);
        for volume_key in &ctx.volume_keys {
            data.volume_keys.push(prefixed_key(&prefixes, volume_key));
        }
    }

    if !custom_env_vars.is_empty() {
        let ctx = template_context(contexts);
        for (key, value) in render_custom_env_vars(custom_env_vars, &ctx)? {
            data.env_vars.insert(key, value.into_bytes());
        }
    }

    data.volume_keys.sort();
    data.volume_keys.dedup();

    debug!(
        keys = data.env_vars.len(),
        volume_keys = data.volume_keys.len(),
        "Materialized binding data"
    );

    Ok(data)
}

#[cfg(test)]
#[path = "envvars_tests.rs"]
mod envvars_tests;

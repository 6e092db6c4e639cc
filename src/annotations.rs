// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Binding annotation parser.
//!
//! Operator authors mark bindable fields with annotations on their CRDs or
//! custom resources (or through OLM descriptors, which the planner converts into
//! the legacy form). Two key families are recognised:
//!
//! - **Legacy**: `servicebindingoperator.redhat.io/<field>[-<subfield>]` with a
//!   handler value such as `binding:env:object:secret`.
//! - **Structured**: `servicebinding.dev/<name>` with a value like
//!   `path={.status.dbCredentials},objectType=Secret,sourceKey=password`.
//!
//! # Example
//!
//! ```rust
//! use service_binding_operator::annotations::{parse, ObjectType};
//!
//! let info = parse(
//!     "servicebindingoperator.redhat.io/status.dbCredentials-password",
//!     "binding:env:object:secret",
//! )
//! .unwrap();
//!
//! assert_eq!(info.resource_reference_path, "status.dbCredentials");
//! assert_eq!(info.source_path, "password");
//! assert_eq!(info.object_type, ObjectType::Secret);
//! ```

use crate::binding_errors::AnnotationError;
use crate::constants::{
    BINDING_VALUE_PREFIX, LEGACY_ANNOTATION_PREFIX, STRUCTURED_ANNOTATION_PREFIX,
};
use crate::nested::split_path;

/// Which annotation family a directive came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationForm {
    Legacy,
    Structured,
}

/// Where a directive's value is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectType {
    /// The referenced field is the value itself.
    Attribute,
    /// The referenced field names a Secret in the same namespace.
    Secret,
    /// The referenced field names a ConfigMap in the same namespace.
    ConfigMap,
}

/// How a directive's value reaches the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindAs {
    Env,
    VolumeMount,
}

/// A parsed binding directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingInfo {
    /// Annotation key without its prefix.
    pub name: String,
    pub form: AnnotationForm,
    /// Field holding the value or the name of the referenced object.
    pub resource_reference_path: String,
    /// Nested path of the final value; differs from the reference path for
    /// `<field>-<subfield>` keys.
    pub source_path: String,
    pub object_type: ObjectType,
    /// Explicitly configured `sourceKey` (structured form only).
    pub source_key: Option<String>,
    pub bind_as: BindAs,
    /// Raw annotation value.
    pub value: String,
}

impl BindingInfo {
    /// Name under which the value is exposed: `sourceKey`, defaulting to `name`.
    #[must_use]
    pub fn exposed_key(&self) -> &str {
        self.source_key.as_deref().unwrap_or(&self.name)
    }

    /// Whether a legacy directive selects a single key of the referenced object.
    #[must_use]
    pub fn has_subfield(&self) -> bool {
        self.source_path != self.resource_reference_path
    }
}

/// Whether `key` carries one of the binding annotation prefixes.
#[must_use]
pub fn is_binding_annotation(key: &str) -> bool {
    strip_prefix(key).is_some()
}

fn strip_prefix(key: &str) -> Option<(AnnotationForm, &str)> {
    let (prefix, name) = key.split_once('/')?;
    match prefix {
        LEGACY_ANNOTATION_PREFIX => Some((AnnotationForm::Legacy, name)),
        STRUCTURED_ANNOTATION_PREFIX => Some((AnnotationForm::Structured, name)),
        _ => None,
    }
}

/// Parse an annotation key/value pair into a [`BindingInfo`].
///
/// # Errors
///
/// - [`AnnotationError::InvalidPrefix`] when the key is not a binding annotation
/// - [`AnnotationError::EmptyName`] when nothing follows the prefix
/// - [`AnnotationError::HandlerNotFound`] when a legacy value names no handler
/// - [`AnnotationError::InvalidValue`] when a structured value is malformed
pub fn parse(key: &str, value: &str) -> Result<BindingInfo, AnnotationError> {
    let (form, name) = strip_prefix(key).ok_or_else(|| AnnotationError::InvalidPrefix {
        key: key.to_string(),
    })?;

    if name.is_empty() {
        return Err(AnnotationError::EmptyName {
            key: key.to_string(),
        });
    }

    match form {
        AnnotationForm::Legacy => parse_legacy(name, value),
        AnnotationForm::Structured => parse_structured(name, value),
    }
}

/// Handler encoded in a legacy annotation value.
struct Handler {
    object_type: ObjectType,
    bind_as: BindAs,
    key: Option<String>,
}

fn parse_handler(value: &str) -> Result<Handler, AnnotationError> {
    let not_found = || AnnotationError::HandlerNotFound {
        value: value.to_string(),
    };
    let tokens: Vec<&str> = value.trim().split(':').collect();

    let (bind_as, rest) = match tokens.as_slice() {
        [BINDING_VALUE_PREFIX, "env", rest @ ..] => (BindAs::Env, rest),
        [BINDING_VALUE_PREFIX, "volumemount", rest @ ..] => (BindAs::VolumeMount, rest),
        _ => return Err(not_found()),
    };

    let (object_type, key) = match (bind_as, rest) {
        (BindAs::Env, ["attribute"]) => (ObjectType::Attribute, None),
        (BindAs::Env, ["object", kind, key @ ..]) | (BindAs::VolumeMount, [kind, key @ ..]) => {
            let object_type = match *kind {
                "secret" => ObjectType::Secret,
                "configmap" => ObjectType::ConfigMap,
                _ => return Err(not_found()),
            };
            let key = match key {
                [] => None,
                [k] if !k.is_empty() => Some((*k).to_string()),
                _ => return Err(not_found()),
            };
            (object_type, key)
        }
        _ => return Err(not_found()),
    };

    Ok(Handler {
        object_type,
        bind_as,
        key,
    })
}

fn parse_legacy(name: &str, value: &str) -> Result<BindingInfo, AnnotationError> {
    let handler = parse_handler(value)?;

    let (field, subfield) = match name.split_once('-') {
        Some((field, subfield)) => (field, Some(subfield.to_string())),
        None => (name, None),
    };
    let source_path = subfield
        .or(handler.key)
        .unwrap_or_else(|| field.to_string());

    Ok(BindingInfo {
        name: name.to_string(),
        form: AnnotationForm::Legacy,
        resource_reference_path: field.to_string(),
        source_path,
        object_type: handler.object_type,
        source_key: None,
        bind_as: handler.bind_as,
        value: value.to_string(),
    })
}

fn parse_structured(name: &str, value: &str) -> Result<BindingInfo, AnnotationError> {
    let invalid = |reason: &str| AnnotationError::InvalidValue {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut path = None;
    let mut object_type = ObjectType::Attribute;
    let mut source_key = None;
    let mut bind_as = BindAs::Env;

    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| invalid("expected key=value pairs"))?;
        match k.trim() {
            "path" => path = Some(split_path(v).join(".")),
            "objectType" => {
                object_type = match v.trim() {
                    "Secret" => ObjectType::Secret,
                    "ConfigMap" => ObjectType::ConfigMap,
                    _ => return Err(invalid("objectType must be Secret or ConfigMap")),
                }
            }
            "sourceKey" => source_key = Some(v.trim().to_string()).filter(|s| !s.is_empty()),
            "bindAs" => {
                bind_as = match v.trim() {
                    "env" => BindAs::Env,
                    "volumemount" => BindAs::VolumeMount,
                    _ => return Err(invalid("bindAs must be env or volumemount")),
                }
            }
            _ => {}
        }
    }

    let path = path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| invalid("missing path"))?;

    Ok(BindingInfo {
        name: name.to_string(),
        form: AnnotationForm::Structured,
        resource_reference_path: path.clone(),
        source_path: path,
        object_type,
        source_key,
        bind_as,
        value: value.to_string(),
    })
}

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod annotations_tests;

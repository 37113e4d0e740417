//! Module system traits and interfaces
//!
//! Defines the contract every discoverable module implements, the identity
//! token the registry hands to module factories, and the module error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::module::hooks::HookTable;

/// Module lifecycle state
///
/// Transitions are strictly forward: `Uninitialized -> Initialized -> Processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Module has been created but `initialize` has not completed
    Uninitialized,
    /// `initialize` has completed
    Initialized,
    /// `process` has completed
    Processed,
}

/// Normalized module identifier
///
/// Only the registry can mint identifiers, so a module value reachable through
/// a [`ModuleInstance`](crate::module::ModuleInstance) always went through the
/// identifier-bearing factory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Normalize a directory or lookup name into an identifier
    pub(crate) fn normalize(name: &str) -> Self {
        Self(normalize_identifier(name))
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lower-case a module name for lookup
#[inline]
pub fn normalize_identifier(name: &str) -> String {
    name.to_lowercase()
}

/// Descriptive module metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Human-readable module name
    pub name: String,
    /// Module version
    pub version: String,
    /// Human-readable description
    pub description: String,
    /// Module homepage
    pub url: String,
    /// Former (display) name, used in API responses
    pub former_name: String,
}

/// Module trait that all discoverable modules implement
///
/// Modules are never constructed directly by host code. The registry builds
/// them through [`Module::create`] with a registry-issued [`Identifier`], then
/// drives them through `initialize` and `process` exactly once each.
pub trait Module: Send + 'static {
    /// Build the module for the given identifier
    fn create(identifier: &Identifier) -> Self
    where
        Self: Sized;

    /// Lifecycle hooks declared by this module
    ///
    /// The default declares none, so both lifecycle phases are plain
    /// state transitions.
    fn hooks() -> HookTable<Self>
    where
        Self: Sized,
    {
        HookTable::new()
    }

    /// Module metadata
    ///
    /// The default derives a display name from the type name.
    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            name: display_name(std::any::type_name::<Self>()),
            ..ModuleMetadata::default()
        }
    }
}

/// Turn a (possibly path-qualified) type name into a spaced display name
///
/// `crate::rest::RestApi` becomes `Rest Api`.
pub(crate) fn display_name(type_name: &str) -> String {
    let base = type_name
        .split('<')
        .next()
        .unwrap_or(type_name)
        .rsplit("::")
        .next()
        .unwrap_or(type_name);

    let mut out = String::with_capacity(base.len() + 4);
    let mut prev_lower = false;
    for c in base.chars() {
        if c == '_' {
            if !out.ends_with(' ') && !out.is_empty() {
                out.push(' ');
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        out.push(c);
    }
    out
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module path {0} is not a directory")]
    InvalidPath(String),

    #[error("Module {0} has not been found")]
    ModuleNotFound(String),

    #[error("Module {identifier} hook {hook} failed: {message}")]
    HookFailed {
        identifier: String,
        hook: &'static str,
        message: String,
    },

    #[error("Module operation failed: {0}")]
    OperationError(String),
}

impl From<anyhow::Error> for ModuleError {
    fn from(e: anyhow::Error) -> Self {
        ModuleError::OperationError(e.to_string())
    }
}

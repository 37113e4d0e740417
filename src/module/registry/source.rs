//! Candidate source inspection
//!
//! Reads a candidate source unit, strips comments and whitespace, checks the
//! language marker and extracts the declared namespace and module type. None
//! of this loads anything; it only decides whether a file is worth loading.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::config::ScanConfig;
use crate::module::registry::discovery::IgnoreReason;

/// Separator between namespace segments and the type name
pub const NAMESPACE_SEPARATOR: &str = "::";

static COMMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)//[^\n]*|/\*.*?\*/").expect("valid regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static NAMESPACE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bnamespace\s+((?:::)?[A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*)\s*;")
        .expect("valid regex")
});

static MODULE_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bmodule\s+([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

/// Type declaration found in a source unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDeclaration {
    /// Declared namespace, without a leading separator
    pub namespace: Option<String>,
    /// Declared module type name
    pub type_name: String,
}

impl SourceDeclaration {
    /// Namespace-qualified type name
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}{}{}", ns, NAMESPACE_SEPARATOR, self.type_name),
            None => self.type_name.clone(),
        }
    }
}

/// Remove comments, collapse whitespace and trim leading whitespace
pub fn strip_non_significant(content: &str) -> String {
    let without_comments = COMMENTS.replace_all(content, " ");
    WHITESPACE
        .replace_all(&without_comments, " ")
        .trim_start()
        .to_string()
}

/// Extract the first namespace and first module declaration
pub fn extract_declaration(stripped: &str) -> Option<SourceDeclaration> {
    let type_name = MODULE_DECL.captures(stripped)?.get(1)?.as_str().to_string();
    let namespace = NAMESPACE_DECL
        .captures(stripped)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_start_matches(NAMESPACE_SEPARATOR).to_string())
        .filter(|ns| !ns.is_empty());

    Some(SourceDeclaration {
        namespace,
        type_name,
    })
}

/// Check that a source body is a plausible module unit and read its declaration
pub fn sniff(content: &str, marker: &str) -> Result<SourceDeclaration, IgnoreReason> {
    let stripped = strip_non_significant(content);
    if !stripped.starts_with(marker) {
        return Err(IgnoreReason::MissingMarker);
    }
    extract_declaration(&stripped).ok_or(IgnoreReason::NoDeclaration)
}

/// Inspect a candidate source file on disk
///
/// Files outside the configured size bounds are rejected before they are read.
pub fn inspect_source(path: &Path, config: &ScanConfig) -> Result<SourceDeclaration, IgnoreReason> {
    let metadata = fs::metadata(path).map_err(|e| IgnoreReason::Unreadable(e.to_string()))?;
    let size = metadata.len();
    if !config.accepts_size(size) {
        return Err(IgnoreReason::SizeOutOfBounds(size));
    }

    let content = fs::read_to_string(path).map_err(|e| IgnoreReason::Unreadable(e.to_string()))?;
    sniff(&content, &config.marker)
}

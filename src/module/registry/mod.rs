//! Module registry and discovery
//!
//! Handles candidate discovery, source inspection and the per-directory scan
//! cache.

pub mod discovery;
pub mod source;

pub use discovery::{
    list_candidates, Candidate, IgnoreReason, ModuleRecord, ModuleRegistry, ScanResult,
    ScanSummary,
};
pub use source::{inspect_source, SourceDeclaration};

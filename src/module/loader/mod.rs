//! Module loading system
//!
//! Resolves a candidate source unit to a loadable module type.

pub mod loader;

pub use loader::{CandidateLoader, LoadError, StaticLoader, TypeDescriptor};

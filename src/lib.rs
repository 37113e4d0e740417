//! modhost - module discovery and lifecycle orchestration
//!
//! Given a directory of candidate module units, this crate locates the ones
//! that declare a module type, builds exactly one instance per valid candidate
//! and drives each instance through `initialize` then `process` exactly once.
//!
//! ## Design Principles
//!
//! 1. **Fail-open discovery**: a broken module is ignored, never fatal to a scan
//! 2. **Scan once**: each module root is scanned once per registry and cached
//! 3. **Run once**: lifecycle hooks fire at most once, even under concurrent calls
//! 4. **Bounded injection**: hook arguments are resolved from a closed set of
//!    parameter shapes; anything ambiguous is skipped
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modhost::config::ScanConfig;
//! use modhost::module::{Container, Identifier, Module, ModuleReader, ModuleRegistry, StaticLoader};
//!
//! struct Greeter;
//!
//! impl Module for Greeter {
//!     fn create(_identifier: &Identifier) -> Self {
//!         Greeter
//!     }
//! }
//!
//! let loader = StaticLoader::new();
//! loader.register::<Greeter>("app::Greeter");
//!
//! let container = Arc::new(Container::new());
//! let registry = Arc::new(ModuleRegistry::new(Arc::new(loader), &container, ScanConfig::default()));
//! let reader = ModuleReader::new("modules/core", registry)?;
//! reader.scan().load_all_modules()?.process_all_modules()?;
//! # Ok::<(), modhost::module::ModuleError>(())
//! ```

pub mod config;
pub mod module;
pub mod utils;

pub use config::{HostConfig, LoggingConfig, ModuleRootsConfig, ScanConfig};
pub use module::{
    Container, Identifier, Module, ModuleError, ModuleInstance, ModulePipeline, ModuleReader,
    ModuleRegistry, StaticLoader,
};

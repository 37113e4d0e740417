//! Module system for modhost
//!
//! Discovers modules under a directory, builds exactly one instance per valid
//! candidate and drives each instance through `initialize` then `process`.
//!
//! ## Architecture
//!
//! - **Discovery**: a module is a directory `X` holding a source unit `X.<ext>`
//!   that declares one module type
//! - **Loading**: a [`CandidateLoader`] maps the declared type to something the
//!   host can build; failures are contained per candidate
//! - **Caching**: each root is scanned once per [`ModuleRegistry`]
//! - **Lifecycle**: `initialize` and `process` run their hooks at most once,
//!   with hook arguments resolved from declared parameter shapes

pub mod container;
pub mod hooks;
pub mod instance;
pub mod loader;
pub mod pipeline;
pub mod reader;
pub mod registry;
pub mod traits;

pub use container::{Container, MODULE_API, MODULE_CORE};
pub use hooks::{Arg, ArgumentResolver, Hook, HookSignature, HookTable, ParamSpec, TypeTag};
pub use instance::{ModuleFactory, ModuleInstance};
pub use loader::{CandidateLoader, LoadError, StaticLoader, TypeDescriptor};
pub use pipeline::ModulePipeline;
pub use reader::{ModuleReader, ModuleView};
pub use registry::{IgnoreReason, ModuleRecord, ModuleRegistry, ScanResult};
pub use traits::{Identifier, LifecycleState, Module, ModuleError, ModuleMetadata};

//! Module reader
//!
//! Public entry point for one module root: scans it through the shared
//! registry, looks modules up by name and drives the bulk lifecycle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::module::instance::ModuleInstance;
use crate::module::registry::{ModuleRegistry, ScanResult};
use crate::module::traits::{normalize_identifier, ModuleError};

/// Facade over one module root
///
/// Holds no module state of its own; everything lives in the registry's
/// cache, so any number of readers for the same root share one scan.
#[derive(Debug, Clone)]
pub struct ModuleReader {
    module_path: PathBuf,
    registry: Arc<ModuleRegistry>,
}

impl ModuleReader {
    /// Create a reader for an existing directory
    ///
    /// Fails with [`ModuleError::InvalidPath`] if `path` is not a directory.
    pub fn new<P: AsRef<Path>>(path: P, registry: Arc<ModuleRegistry>) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(ModuleError::InvalidPath(path.display().to_string()));
        }
        let module_path = path
            .canonicalize()
            .map_err(|_| ModuleError::InvalidPath(path.display().to_string()))?;

        Ok(Self {
            module_path,
            registry,
        })
    }

    /// Canonical module root
    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    /// Scan the module root (once per process)
    pub fn scan(&self) -> &Self {
        self.registry.scan(&self.module_path);
        self
    }

    /// Scan result for this root
    pub fn modules_data(&self) -> Arc<ScanResult> {
        self.registry.scan(&self.module_path)
    }

    /// Every cached scan in the shared registry, after scanning this root
    pub fn all_cached_modules_data(&self) -> BTreeMap<PathBuf, Arc<ScanResult>> {
        self.scan();
        self.registry.all_cached()
    }

    /// Read-only view of the registered modules
    pub fn modules(&self) -> ModuleView {
        ModuleView {
            result: self.modules_data(),
        }
    }

    /// Normalize a module name for lookup
    pub fn normalize_module_identifier(name: &str) -> String {
        normalize_identifier(name)
    }

    /// Whether a module with this name is registered
    pub fn has_module(&self, name: &str) -> bool {
        self.modules().contains(name)
    }

    /// Look up a module by name
    pub fn get_module(&self, name: &str) -> Result<Arc<ModuleInstance>, ModuleError> {
        self.modules()
            .get(name)
            .ok_or_else(|| ModuleError::ModuleNotFound(name.to_string()))
    }

    /// Initialize every module that is not initialized yet
    pub fn load_all_modules(&self) -> Result<&Self, ModuleError> {
        let modules = self.modules();
        debug!("Loading {} modules from {:?}", modules.len(), self.module_path);
        for (_, module) in modules.iter() {
            if !module.has_initialized() {
                module.initialize()?;
            }
        }
        Ok(self)
    }

    /// Process every module that is not processed yet
    pub fn process_all_modules(&self) -> Result<&Self, ModuleError> {
        let modules = self.modules();
        debug!("Processing {} modules from {:?}", modules.len(), self.module_path);
        for (_, module) in modules.iter() {
            if !module.has_processed() {
                module.process()?;
            }
        }
        info!("Processed modules in {:?}", self.module_path);
        Ok(self)
    }
}

/// Read-only, name-normalizing view of a scan's modules
///
/// Membership is owned by the registry; the view offers lookups only.
#[derive(Debug, Clone)]
pub struct ModuleView {
    result: Arc<ScanResult>,
}

impl ModuleView {
    /// Whether a module with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.result.module(&normalize_identifier(name)).is_some()
    }

    /// Module by name
    pub fn get(&self, name: &str) -> Option<Arc<ModuleInstance>> {
        self.result
            .module(&normalize_identifier(name))
            .map(|record| Arc::clone(&record.instance))
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.result.modules().len()
    }

    /// Whether no modules were registered
    pub fn is_empty(&self) -> bool {
        self.result.modules().is_empty()
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<String> {
        self.result.modules().keys().cloned().collect()
    }

    /// Iterate `(identifier, instance)` pairs in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ModuleInstance>)> {
        self.result
            .modules()
            .iter()
            .map(|(id, record)| (id.as_str(), &record.instance))
    }
}

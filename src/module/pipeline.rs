//! Module boot pipeline
//!
//! Wires the two well-known module roots into the service container and runs
//! the boot sequence a request-serving host performs: load core, load API,
//! then process core and API in that order.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::ModuleRootsConfig;
use crate::module::container::{Container, MODULE_API, MODULE_CORE};
use crate::module::reader::ModuleReader;
use crate::module::registry::ModuleRegistry;
use crate::module::traits::ModuleError;

/// Boot sequence over the core and API module roots
#[derive(Debug, Clone)]
pub struct ModulePipeline {
    container: Arc<Container>,
}

impl ModulePipeline {
    /// Register readers for both roots in `container`
    ///
    /// Relative roots are resolved against `base_dir`. Fails with
    /// [`ModuleError::InvalidPath`] if either root is not a directory.
    pub fn new(
        container: Arc<Container>,
        registry: Arc<ModuleRegistry>,
        roots: &ModuleRootsConfig,
        base_dir: &Path,
    ) -> Result<Self, ModuleError> {
        let core = ModuleReader::new(roots.core_path(base_dir), Arc::clone(&registry))?;
        let api = ModuleReader::new(roots.api_path(base_dir), registry)?;
        container.set(MODULE_CORE, core);
        container.set(MODULE_API, api);
        Ok(Self { container })
    }

    /// Use readers already registered in `container`
    pub fn from_container(container: Arc<Container>) -> Self {
        Self { container }
    }

    /// The service container
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Core module reader
    pub fn core(&self) -> Result<Arc<ModuleReader>, ModuleError> {
        self.reader(MODULE_CORE)
    }

    /// API module reader
    pub fn api(&self) -> Result<Arc<ModuleReader>, ModuleError> {
        self.reader(MODULE_API)
    }

    /// Scan and run both lifecycle phases, core before API
    ///
    /// Safe to call on every request: scans are cached and lifecycle phases
    /// run once per module.
    pub fn run(&self) -> Result<(), ModuleError> {
        let core = self.core()?;
        let api = self.api()?;

        core.scan().load_all_modules()?;
        api.scan().load_all_modules()?;

        core.process_all_modules()?;
        api.process_all_modules()?;

        info!(
            "Module pipeline complete ({} core, {} api)",
            core.modules().len(),
            api.modules().len()
        );
        Ok(())
    }

    /// Run the pipeline on tokio's blocking pool
    ///
    /// Scanning reads the filesystem and hooks are synchronous, so async
    /// request handlers should use this instead of [`ModulePipeline::run`].
    pub async fn run_async(&self) -> Result<(), ModuleError> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.run())
            .await
            .map_err(|e| ModuleError::OperationError(format!("Module pipeline task failed: {}", e)))?
    }

    fn reader(&self, key: &str) -> Result<Arc<ModuleReader>, ModuleError> {
        self.container
            .get::<ModuleReader>(key)
            .ok_or_else(|| ModuleError::OperationError(format!("No module reader registered under {}", key)))
    }
}

//! Module loader implementation
//!
//! The scanner only knows a candidate's path and the type it declares. A
//! [`CandidateLoader`] turns that into a [`TypeDescriptor`]: where the type was
//! loaded from, whether it satisfies the module contract, and how to build it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::module::instance::ModuleFactory;
use crate::module::traits::Module;

/// Errors raised while loading a candidate
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Type {0} is not known to the loader")]
    UnknownType(String),

    #[error("Loading panicked: {0}")]
    Panicked(String),
}

/// A loaded type as seen by the scanner
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Fully qualified type name
    pub qualified_name: String,
    /// Source unit the type was loaded from
    pub source: PathBuf,
    /// Whether the type implements the module contract
    pub implements_module: bool,
    /// Whether the type can be built without the identifier-bearing factory
    pub directly_instantiable: bool,
    /// Factory for module types
    pub factory: Option<ModuleFactory>,
}

/// Resolves candidate source units to types
pub trait CandidateLoader: Send + Sync {
    /// A type already loaded in this process, if any
    fn find_loaded(&self, qualified_name: &str) -> Option<TypeDescriptor>;

    /// Load the type declared by the source unit at `path`
    fn load_candidate(&self, path: &Path, qualified_name: &str) -> Result<TypeDescriptor, LoadError>;
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    implements_module: bool,
    directly_instantiable: bool,
    factory: Option<ModuleFactory>,
}

/// Loader backed by a catalog of types compiled into the host
///
/// Loading a type binds it to the candidate path it was first loaded from;
/// later lookups report that path as the type's source.
#[derive(Default)]
pub struct StaticLoader {
    catalog: RwLock<HashMap<String, CatalogEntry>>,
    loaded: RwLock<HashMap<String, TypeDescriptor>>,
}

impl StaticLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module type buildable only through its factory
    pub fn register<M: Module>(&self, qualified_name: impl Into<String>) -> &Self {
        self.insert(
            qualified_name.into(),
            CatalogEntry {
                implements_module: true,
                directly_instantiable: false,
                factory: Some(ModuleFactory::of::<M>()),
            },
        )
    }

    /// Register a module type that can also be built directly
    ///
    /// The scanner rejects such types.
    pub fn register_instantiable<M: Module>(&self, qualified_name: impl Into<String>) -> &Self {
        self.insert(
            qualified_name.into(),
            CatalogEntry {
                implements_module: true,
                directly_instantiable: true,
                factory: Some(ModuleFactory::of::<M>()),
            },
        )
    }

    /// Register a type that does not implement the module contract
    pub fn register_plain(&self, qualified_name: impl Into<String>) -> &Self {
        self.insert(
            qualified_name.into(),
            CatalogEntry {
                implements_module: false,
                directly_instantiable: true,
                factory: None,
            },
        )
    }

    /// Whether a type name is in the catalog
    pub fn is_registered(&self, qualified_name: &str) -> bool {
        let catalog = self.catalog.read().unwrap_or_else(|e| e.into_inner());
        catalog.contains_key(qualified_name)
    }

    /// Names of types loaded so far, sorted
    pub fn loaded_types(&self) -> Vec<String> {
        let loaded = self.loaded.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = loaded.keys().cloned().collect();
        names.sort();
        names
    }

    fn insert(&self, qualified_name: String, entry: CatalogEntry) -> &Self {
        debug!("Registering type {} in loader catalog", qualified_name);
        let mut catalog = self.catalog.write().unwrap_or_else(|e| e.into_inner());
        catalog.insert(qualified_name, entry);
        self
    }
}

impl CandidateLoader for StaticLoader {
    fn find_loaded(&self, qualified_name: &str) -> Option<TypeDescriptor> {
        let loaded = self.loaded.read().unwrap_or_else(|e| e.into_inner());
        loaded.get(qualified_name).cloned()
    }

    fn load_candidate(&self, path: &Path, qualified_name: &str) -> Result<TypeDescriptor, LoadError> {
        let entry = {
            let catalog = self.catalog.read().unwrap_or_else(|e| e.into_inner());
            catalog
                .get(qualified_name)
                .cloned()
                .ok_or_else(|| LoadError::UnknownType(qualified_name.to_string()))?
        };

        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        // First load wins; a racing loader sees the existing binding
        let descriptor = loaded
            .entry(qualified_name.to_string())
            .or_insert_with(|| {
                info!("Loaded type {} from {:?}", qualified_name, path);
                TypeDescriptor {
                    qualified_name: qualified_name.to_string(),
                    source: path.to_path_buf(),
                    implements_module: entry.implements_module,
                    directly_instantiable: entry.directly_instantiable,
                    factory: entry.factory,
                }
            })
            .clone();
        Ok(descriptor)
    }
}

impl std::fmt::Debug for StaticLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticLoader")
            .field("loaded", &self.loaded_types())
            .finish()
    }
}

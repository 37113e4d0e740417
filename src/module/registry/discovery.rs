//! Module discovery
//!
//! Scans a module root once per process, turns every valid candidate into a
//! [`ModuleInstance`] and caches the outcome keyed by the root's canonical
//! path. A broken candidate never fails a scan; it is recorded as ignored.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::module::container::Container;
use crate::module::instance::{ModuleFactory, ModuleInstance};
use crate::module::loader::{CandidateLoader, LoadError, TypeDescriptor};
use crate::module::registry::source::inspect_source;
use crate::module::traits::{Identifier, LifecycleState};
use crate::utils::{panic_message, result_to_option};

/// Why a candidate was not registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Another directory already claimed the same identifier
    Collision,
    /// The source unit could not be read
    Unreadable(String),
    /// The source unit is too small or too large
    SizeOutOfBounds(u64),
    /// The stripped source does not start with the language marker
    MissingMarker,
    /// No module declaration was found
    NoDeclaration,
    /// The declared type is already loaded from a different source
    SourceMismatch,
    /// Loading the declared type failed
    LoadFailed(String),
    /// The declared type does not implement the module contract
    NotAModule,
    /// The declared type can be built without the module factory
    DirectlyInstantiable,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Collision => write!(f, "identifier already registered"),
            IgnoreReason::Unreadable(e) => write!(f, "source unreadable: {}", e),
            IgnoreReason::SizeOutOfBounds(size) => write!(f, "source size {} out of bounds", size),
            IgnoreReason::MissingMarker => write!(f, "missing language marker"),
            IgnoreReason::NoDeclaration => write!(f, "no module declaration"),
            IgnoreReason::SourceMismatch => write!(f, "type already loaded from another source"),
            IgnoreReason::LoadFailed(e) => write!(f, "load failed: {}", e),
            IgnoreReason::NotAModule => write!(f, "type does not implement the module contract"),
            IgnoreReason::DirectlyInstantiable => write!(f, "type is directly instantiable"),
        }
    }
}

/// A module root entry that looks like a module
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Directory name, case preserved
    pub name: String,
    /// Candidate directory
    pub directory: PathBuf,
    /// `<directory>/<name>.<ext>`
    pub source_file: PathBuf,
}

/// List directories under `root` that contain a same-named source unit
///
/// Entries are returned in filesystem iteration order. Other entries are
/// skipped without being recorded.
pub fn list_candidates(root: &Path, config: &ScanConfig) -> Vec<Candidate> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read module directory {:?}: {}", root, e);
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for entry in entries {
        let Some(entry) = result_to_option(entry, "Failed to read directory entry") else {
            continue;
        };

        let directory = entry.path();
        if !directory.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            debug!("Skipping non UTF-8 entry {:?}", directory);
            continue;
        };

        let source_file = directory.join(config.source_file_name(&name));
        if !source_file.is_file() {
            debug!("No {:?} in {:?}, skipping", source_file.file_name(), directory);
            continue;
        }

        candidates.push(Candidate {
            name,
            directory,
            source_file,
        });
    }
    candidates
}

/// A registered module
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Normalized identifier
    pub identifier: Identifier,
    /// Original directory name
    pub source_name: String,
    /// Fully qualified type declared by the source unit
    pub qualified_type: String,
    /// Canonical path of the source unit
    pub source_path: PathBuf,
    /// The module instance
    pub instance: Arc<ModuleInstance>,
}

/// Outcome of scanning one module root
#[derive(Debug, Default)]
pub struct ScanResult {
    directory: PathBuf,
    modules: BTreeMap<String, ModuleRecord>,
    ignored: BTreeMap<String, String>,
    identifier_index: BTreeMap<String, String>,
    reasons: BTreeMap<String, IgnoreReason>,
}

impl ScanResult {
    fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            ..Self::default()
        }
    }

    /// Scanned directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Registered modules by identifier
    pub fn modules(&self) -> &BTreeMap<String, ModuleRecord> {
        &self.modules
    }

    /// Rejected candidates: original name -> identifier
    pub fn ignored(&self) -> &BTreeMap<String, String> {
        &self.ignored
    }

    /// Registered identifiers -> original directory name
    pub fn identifier_index(&self) -> &BTreeMap<String, String> {
        &self.identifier_index
    }

    /// Rejected candidates: original name -> reason
    pub fn reasons(&self) -> &BTreeMap<String, IgnoreReason> {
        &self.reasons
    }

    /// Look up a module by already-normalized identifier
    pub fn module(&self, identifier: &str) -> Option<&ModuleRecord> {
        self.modules.get(identifier)
    }

    /// Serializable summary
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            directory: self.directory.clone(),
            modules: self
                .modules
                .iter()
                .map(|(id, record)| {
                    (
                        id.clone(),
                        ModuleSummary {
                            source_name: record.source_name.clone(),
                            qualified_type: record.qualified_type.clone(),
                            state: record.instance.state(),
                        },
                    )
                })
                .collect(),
            ignored: self
                .ignored
                .iter()
                .map(|(name, id)| {
                    (
                        name.clone(),
                        IgnoredSummary {
                            identifier: id.clone(),
                            reason: self.reasons.get(name).cloned(),
                        },
                    )
                })
                .collect(),
        }
    }

    fn ignore(&mut self, name: &str, identifier: &Identifier, reason: IgnoreReason) {
        match reason {
            IgnoreReason::LoadFailed(_) => warn!("Ignoring module {}: {}", name, reason),
            _ => debug!("Ignoring module {}: {}", name, reason),
        }
        self.ignored.insert(name.to_string(), identifier.to_string());
        self.reasons.insert(name.to_string(), reason);
    }
}

/// Serializable view of a [`ScanResult`]
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub directory: PathBuf,
    pub modules: BTreeMap<String, ModuleSummary>,
    pub ignored: BTreeMap<String, IgnoredSummary>,
}

/// Serializable view of a registered module
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub source_name: String,
    pub qualified_type: String,
    pub state: LifecycleState,
}

/// Serializable view of a rejected candidate
#[derive(Debug, Clone, Serialize)]
pub struct IgnoredSummary {
    pub identifier: String,
    pub reason: Option<IgnoreReason>,
}

type CacheSlot = Arc<OnceLock<Arc<ScanResult>>>;

/// Process-lifetime scan cache
///
/// Each module root is scanned at most once. Concurrent first scans of the
/// same root are serialized on that root's slot; later calls return the cached
/// result even if the directory has changed on disk.
pub struct ModuleRegistry {
    loader: Arc<dyn CandidateLoader>,
    container: Weak<Container>,
    config: ScanConfig,
    cache: Mutex<HashMap<PathBuf, CacheSlot>>,
}

impl ModuleRegistry {
    /// Create a registry with the given loader, container and scanning policy
    pub fn new(loader: Arc<dyn CandidateLoader>, container: &Arc<Container>, config: ScanConfig) -> Self {
        Self {
            loader,
            container: Arc::downgrade(container),
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Scanning policy
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `directory`, or return the cached result
    pub fn scan(&self, directory: &Path) -> Arc<ScanResult> {
        let key = cache_key(directory);
        let slot = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(cache.entry(key.clone()).or_default())
        };

        Arc::clone(slot.get_or_init(|| Arc::new(self.scan_directory(&key))))
    }

    /// Cached result for `directory`, without scanning
    pub fn cached(&self, directory: &Path) -> Option<Arc<ScanResult>> {
        let key = cache_key(directory);
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(&key).and_then(|slot| slot.get().cloned())
    }

    /// All completed scans, by directory
    pub fn all_cached(&self) -> BTreeMap<PathBuf, Arc<ScanResult>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .iter()
            .filter_map(|(path, slot)| slot.get().map(|result| (path.clone(), Arc::clone(result))))
            .collect()
    }

    fn scan_directory(&self, directory: &Path) -> ScanResult {
        info!("Scanning modules in {:?}", directory);
        let mut result = ScanResult::new(directory.to_path_buf());

        for candidate in list_candidates(directory, &self.config) {
            let identifier = Identifier::normalize(&candidate.name);
            if result.modules.contains_key(identifier.as_str()) {
                result.ignore(&candidate.name, &identifier, IgnoreReason::Collision);
                continue;
            }

            match self.admit(&candidate, &identifier) {
                Ok(record) => {
                    debug!("Registered module {} ({})", identifier, record.qualified_type);
                    result
                        .identifier_index
                        .insert(identifier.to_string(), candidate.name.clone());
                    result.modules.insert(identifier.to_string(), record);
                }
                Err(reason) => result.ignore(&candidate.name, &identifier, reason),
            }
        }

        info!(
            "Discovered {} modules in {:?} ({} ignored)",
            result.modules.len(),
            directory,
            result.ignored.len()
        );
        result
    }

    fn admit(&self, candidate: &Candidate, identifier: &Identifier) -> Result<ModuleRecord, IgnoreReason> {
        let declaration = inspect_source(&candidate.source_file, &self.config)?;
        let source_path = candidate
            .source_file
            .canonicalize()
            .map_err(|e| IgnoreReason::Unreadable(e.to_string()))?;
        let qualified = declaration.qualified_name();

        let descriptor = match self.loader.find_loaded(&qualified) {
            Some(descriptor) => descriptor,
            None => self.load_contained(&source_path, &qualified)?,
        };
        let factory = check_descriptor(&descriptor, &source_path)?;

        let container = self.container.clone();
        let instance = panic::catch_unwind(AssertUnwindSafe(|| {
            ModuleInstance::create(identifier.clone(), qualified.clone(), factory, container)
        }))
        .map_err(|payload| IgnoreReason::LoadFailed(LoadError::Panicked(panic_message(&*payload)).to_string()))?;

        Ok(ModuleRecord {
            identifier: identifier.clone(),
            source_name: candidate.name.clone(),
            qualified_type: qualified,
            source_path,
            instance: Arc::new(instance),
        })
    }

    fn load_contained(&self, source_path: &Path, qualified: &str) -> Result<TypeDescriptor, IgnoreReason> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.loader.load_candidate(source_path, qualified)
        }));

        match outcome {
            Ok(Ok(descriptor)) => Ok(descriptor),
            Ok(Err(e)) => Err(IgnoreReason::LoadFailed(e.to_string())),
            Err(payload) => Err(IgnoreReason::LoadFailed(
                LoadError::Panicked(panic_message(&*payload)).to_string(),
            )),
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("config", &self.config)
            .field("cached", &self.all_cached().keys().collect::<Vec<_>>())
            .finish()
    }
}

fn check_descriptor(
    descriptor: &TypeDescriptor,
    source_path: &Path,
) -> Result<ModuleFactory, IgnoreReason> {
    if descriptor.source != source_path {
        return Err(IgnoreReason::SourceMismatch);
    }
    if !descriptor.implements_module {
        return Err(IgnoreReason::NotAModule);
    }
    if descriptor.directly_instantiable {
        return Err(IgnoreReason::DirectlyInstantiable);
    }
    descriptor.factory.ok_or(IgnoreReason::NotAModule)
}

fn cache_key(directory: &Path) -> PathBuf {
    directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf())
}

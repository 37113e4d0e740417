//! Service container
//!
//! A small thread-safe key/value lookup shared between the host and its
//! modules. Hooks can ask for it by declaring a `Container` parameter.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Container key under which the core module reader is registered
pub const MODULE_CORE: &str = "module.core";

/// Container key under which the API module reader is registered
pub const MODULE_API: &str = "module.api";

type Entry = Arc<dyn Any + Send + Sync>;

/// Thread-safe service container
#[derive(Default)]
pub struct Container {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Container {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a service under `key`
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.set_shared(key, Arc::new(value));
    }

    /// Register an already shared service under `key`
    pub fn set_shared<T: Any + Send + Sync>(&self, key: impl Into<String>, value: Arc<T>) {
        let key = key.into();
        debug!("Registering container entry: {}", key);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, value);
    }

    /// Look up a service by key and type
    ///
    /// Returns `None` if the key is absent or holds a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
    }

    /// Check whether a key is registered
    pub fn has(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(key)
    }

    /// Remove a service, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).is_some()
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("keys", &self.keys()).finish()
    }
}

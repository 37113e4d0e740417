//! Module instance lifecycle
//!
//! Wraps one module value and drives it through `initialize` and `process`,
//! each at most once. Hook arguments are resolved per call from the hook's
//! declared signature.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

use crate::module::container::Container;
use crate::module::hooks::{Arg, ArgumentResolver, Binding, Hook, HookSignature, HookTable};
use crate::module::traits::{Identifier, LifecycleState, Module, ModuleError, ModuleMetadata};
use crate::utils::panic_message;

/// Type-erased view of a module value and its hooks
pub(crate) trait ErasedModule: Send {
    fn signature(&self, hook: Hook) -> Option<&HookSignature>;
    fn invoke(&mut self, hook: Hook, args: &[Arg]) -> Result<(), ModuleError>;
    fn metadata(&self) -> ModuleMetadata;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Erased<M: Module> {
    module: M,
    hooks: HookTable<M>,
}

impl<M: Module> ErasedModule for Erased<M> {
    fn signature(&self, hook: Hook) -> Option<&HookSignature> {
        self.hooks.get(hook).map(|entry| &entry.signature)
    }

    fn invoke(&mut self, hook: Hook, args: &[Arg]) -> Result<(), ModuleError> {
        let Erased { module, hooks } = self;
        match hooks.get(hook) {
            Some(entry) => (entry.call)(module, args),
            None => Ok(()),
        }
    }

    fn metadata(&self) -> ModuleMetadata {
        self.module.metadata()
    }

    fn as_any(&self) -> &dyn Any {
        &self.module
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.module
    }
}

fn build_erased<M: Module>(identifier: &Identifier) -> Box<dyn ErasedModule> {
    Box::new(Erased {
        module: M::create(identifier),
        hooks: M::hooks(),
    })
}

/// Identifier-bearing factory for one module type
#[derive(Clone, Copy)]
pub struct ModuleFactory {
    build: fn(&Identifier) -> Box<dyn ErasedModule>,
    type_name: &'static str,
}

impl ModuleFactory {
    /// Factory for module type `M`
    pub fn of<M: Module>() -> Self {
        Self {
            build: build_erased::<M>,
            type_name: std::any::type_name::<M>(),
        }
    }

    /// Rust type name of the module this factory builds
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ModuleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactory")
            .field("type_name", &self.type_name)
            .finish()
    }
}

struct Slot {
    object: Box<dyn ErasedModule>,
    state: LifecycleState,
}

/// A discovered module and its lifecycle state
///
/// Lifecycle calls are serialized per instance, so concurrent callers of
/// `initialize`/`process` observe each hook firing exactly once. Identity,
/// state, metadata and declared hooks are readable without the lifecycle
/// lock, so a hook may inspect its own instance. A hook that drives its own
/// lifecycle gets an error; one that borrows its own module value gets `None`.
pub struct ModuleInstance {
    identifier: Identifier,
    qualified_type: String,
    resolver: ArgumentResolver,
    metadata: ModuleMetadata,
    declares_init: bool,
    declares_process: bool,
    slot: Mutex<Slot>,
    /// Thread currently running one of this instance's hooks
    hook_thread: Mutex<Option<ThreadId>>,
    initialized: AtomicBool,
    processed: AtomicBool,
}

impl ModuleInstance {
    /// Build a module through its factory
    pub(crate) fn create(
        identifier: Identifier,
        qualified_type: impl Into<String>,
        factory: ModuleFactory,
        container: Weak<Container>,
    ) -> Self {
        let qualified_type = qualified_type.into();
        let object = (factory.build)(&identifier);
        debug!("Created module {} ({})", identifier, qualified_type);

        Self {
            resolver: ArgumentResolver::new(container, identifier.clone(), qualified_type.clone()),
            identifier,
            qualified_type,
            metadata: object.metadata(),
            declares_init: object.signature(Hook::OnInit).is_some(),
            declares_process: object.signature(Hook::OnProcess).is_some(),
            slot: Mutex::new(Slot {
                object,
                state: LifecycleState::Uninitialized,
            }),
            hook_thread: Mutex::new(None),
            initialized: AtomicBool::new(false),
            processed: AtomicBool::new(false),
        }
    }

    /// Module identifier, fixed at creation
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Fully qualified type declared by the module source
    pub fn qualified_type(&self) -> &str {
        &self.qualified_type
    }

    /// Whether `initialize` has completed
    pub fn has_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Whether `process` has completed
    pub fn has_processed(&self) -> bool {
        self.processed.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        if self.has_processed() {
            LifecycleState::Processed
        } else if self.has_initialized() {
            LifecycleState::Initialized
        } else {
            LifecycleState::Uninitialized
        }
    }

    /// Whether the module declares `hook`
    pub fn declares(&self, hook: Hook) -> bool {
        match hook {
            Hook::OnInit => self.declares_init,
            Hook::OnProcess => self.declares_process,
        }
    }

    /// Module metadata, captured when the module was created
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    /// Run the `on_init` hook once
    ///
    /// No-op if already initialized. A failing or panicking hook leaves the
    /// module uninitialized.
    pub fn initialize(&self) -> Result<&Self, ModuleError> {
        if self.has_initialized() {
            return Ok(self);
        }
        self.check_reentry("initialize")?;
        let mut slot = self.lock();
        self.initialize_locked(&mut slot)?;
        Ok(self)
    }

    /// Run the `on_process` hook once, initializing first if needed
    pub fn process(&self) -> Result<&Self, ModuleError> {
        if self.has_processed() {
            return Ok(self);
        }
        self.check_reentry("process")?;
        let mut slot = self.lock();
        self.initialize_locked(&mut slot)?;
        if slot.state == LifecycleState::Processed {
            return Ok(self);
        }

        self.run_hook(&mut slot, Hook::OnProcess)?;
        slot.state = LifecycleState::Processed;
        self.processed.store(true, Ordering::Release);
        debug!("Module {} processed", self.identifier);
        Ok(self)
    }

    /// Borrow the module value as its concrete type
    ///
    /// Returns `None` if the module is not an `M`, or if called from one of
    /// this instance's own hooks.
    pub fn with_module<M: Module, R>(&self, f: impl FnOnce(&M) -> R) -> Option<R> {
        if self.in_own_hook() {
            return None;
        }
        let slot = self.lock();
        slot.object.as_any().downcast_ref::<M>().map(f)
    }

    /// Mutably borrow the module value as its concrete type
    ///
    /// Same conditions as [`ModuleInstance::with_module`].
    pub fn with_module_mut<M: Module, R>(&self, f: impl FnOnce(&mut M) -> R) -> Option<R> {
        if self.in_own_hook() {
            return None;
        }
        let mut slot = self.lock();
        slot.object.as_any_mut().downcast_mut::<M>().map(f)
    }

    fn initialize_locked(&self, slot: &mut Slot) -> Result<(), ModuleError> {
        if slot.state >= LifecycleState::Initialized {
            return Ok(());
        }

        self.run_hook(slot, Hook::OnInit)?;
        slot.state = LifecycleState::Initialized;
        self.initialized.store(true, Ordering::Release);
        debug!("Module {} initialized", self.identifier);
        Ok(())
    }

    fn run_hook(&self, slot: &mut Slot, hook: Hook) -> Result<(), ModuleError> {
        let binding = match slot.object.signature(hook) {
            Some(signature) => self.resolver.bind(signature),
            None => return Ok(()),
        };

        let args = match binding {
            Binding::Call(args) => args,
            Binding::Skip(reason) => {
                debug!("Skipping {} on module {}: {:?}", hook.name(), self.identifier, reason);
                return Ok(());
            }
        };

        debug!("Calling {} on module {} with {} argument(s)", hook.name(), self.identifier, args.len());
        self.set_hook_thread(Some(thread::current().id()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| slot.object.invoke(hook, &args)));
        self.set_hook_thread(None);

        let message = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("hook panicked: {}", panic_message(&*payload)),
        };
        warn!("Module {} hook {} failed: {}", self.identifier, hook.name(), message);
        Err(ModuleError::HookFailed {
            identifier: self.identifier.to_string(),
            hook: hook.name(),
            message,
        })
    }

    fn check_reentry(&self, operation: &str) -> Result<(), ModuleError> {
        if self.in_own_hook() {
            return Err(ModuleError::OperationError(format!(
                "Module {} cannot {} itself from its own hook",
                self.identifier, operation
            )));
        }
        Ok(())
    }

    fn in_own_hook(&self) -> bool {
        let owner = self.hook_thread.lock().unwrap_or_else(|e| e.into_inner());
        *owner == Some(thread::current().id())
    }

    fn set_hook_thread(&self, owner: Option<ThreadId>) {
        *self.hook_thread.lock().unwrap_or_else(|e| e.into_inner()) = owner;
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Hooks run under catch_unwind, so a poisoned guard still holds consistent state
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("identifier", &self.identifier)
            .field("qualified_type", &self.qualified_type)
            .field("initialized", &self.has_initialized())
            .field("processed", &self.has_processed())
            .finish()
    }
}

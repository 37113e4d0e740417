//! Lifecycle hooks
//!
//! Modules opt into lifecycle callbacks by declaring a [`HookTable`]. Each
//! entry carries a structural [`HookSignature`] that the
//! [`ArgumentResolver`](resolver::ArgumentResolver) inspects to decide what to
//! pass, or whether to call the hook at all.

pub mod resolver;

pub use resolver::{Arg, ArgumentResolver, Binding, Resolution, SkipReason};

use crate::module::traits::ModuleError;

/// Lifecycle hook names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Called once during `initialize`
    OnInit,
    /// Called once during `process`
    OnProcess,
}

impl Hook {
    /// Conventional hook name, used in logs and errors
    pub fn name(self) -> &'static str {
        match self {
            Hook::OnInit => "on_init",
            Hook::OnProcess => "on_process",
        }
    }
}

/// Declared type of a hook parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    /// The service container
    Container,
    /// The module abstraction, i.e. the module itself
    Module,
    /// Built-in string
    Str,
    /// Built-in integer
    Int,
    /// Built-in float
    Float,
    /// Built-in boolean
    Bool,
    /// Built-in list
    List,
    /// Any other named type
    Named(String),
}

/// Structural description of one hook parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Declared type, `None` for an untyped parameter
    pub tag: Option<TypeTag>,
    /// Whether the parameter accepts an explicit null
    pub nullable: bool,
    /// Whether the parameter may be omitted
    pub optional: bool,
}

impl ParamSpec {
    /// A required, non-nullable parameter of the given type
    pub fn typed(tag: TypeTag) -> Self {
        Self {
            tag: Some(tag),
            nullable: false,
            optional: false,
        }
    }

    /// An untyped parameter; untyped parameters always accept null
    pub fn untyped() -> Self {
        Self {
            tag: None,
            nullable: true,
            optional: false,
        }
    }

    /// Mark the parameter as accepting null
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the parameter as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Declared parameter list of a hook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookSignature {
    params: Vec<ParamSpec>,
}

impl HookSignature {
    /// A hook with no parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Declared parameters, in order
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Hook callback: receives the module and the resolved arguments
pub type HookFn<M> = Box<dyn Fn(&mut M, &[Arg]) -> Result<(), ModuleError> + Send + Sync>;

pub(crate) struct HookEntry<M> {
    pub(crate) signature: HookSignature,
    pub(crate) call: HookFn<M>,
}

/// Hooks declared by a module type
pub struct HookTable<M> {
    on_init: Option<HookEntry<M>>,
    on_process: Option<HookEntry<M>>,
}

impl<M> HookTable<M> {
    /// A table with no hooks
    pub fn new() -> Self {
        Self {
            on_init: None,
            on_process: None,
        }
    }

    /// Declare the `on_init` hook
    pub fn on_init<F>(mut self, signature: HookSignature, f: F) -> Self
    where
        F: Fn(&mut M, &[Arg]) -> Result<(), ModuleError> + Send + Sync + 'static,
    {
        self.on_init = Some(HookEntry {
            signature,
            call: Box::new(f),
        });
        self
    }

    /// Declare the `on_process` hook
    pub fn on_process<F>(mut self, signature: HookSignature, f: F) -> Self
    where
        F: Fn(&mut M, &[Arg]) -> Result<(), ModuleError> + Send + Sync + 'static,
    {
        self.on_process = Some(HookEntry {
            signature,
            call: Box::new(f),
        });
        self
    }

    /// Whether the module declares `hook`
    pub fn declares(&self, hook: Hook) -> bool {
        self.get(hook).is_some()
    }

    pub(crate) fn get(&self, hook: Hook) -> Option<&HookEntry<M>> {
        match hook {
            Hook::OnInit => self.on_init.as_ref(),
            Hook::OnProcess => self.on_process.as_ref(),
        }
    }
}

impl<M> Default for HookTable<M> {
    fn default() -> Self {
        Self::new()
    }
}

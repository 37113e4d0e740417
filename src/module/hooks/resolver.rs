//! Hook argument resolution
//!
//! A closed-set dispatcher that turns a [`HookSignature`] into either a
//! concrete argument list or a decision not to call the hook. Hooks may take
//! at most two parameters; anything the resolver cannot satisfy is skipped
//! rather than guessed.

use std::sync::{Arc, Weak};
use tracing::trace;

use crate::module::container::Container;
use crate::module::hooks::{HookSignature, ParamSpec, TypeTag};
use crate::module::traits::Identifier;

/// Value passed to a hook parameter
#[derive(Debug, Clone)]
pub enum Arg {
    /// The service container
    Container(Arc<Container>),
    /// The module itself, by identifier
    Module(Identifier),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Arg>),
    /// Explicit null for a nullable parameter
    Null,
}

impl Arg {
    /// The container, if this argument carries it
    pub fn as_container(&self) -> Option<&Arc<Container>> {
        match self {
            Arg::Container(c) => Some(c),
            _ => None,
        }
    }

    /// Whether this is an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }
}

/// Outcome of resolving one parameter
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A collaborator the host supplies (container, module)
    Concrete(Arg),
    /// The empty value of a built-in type
    EmptyDefault(Arg),
    /// Nothing can be supplied
    Unresolved,
}

impl Resolution {
    fn into_value(self) -> Option<Arg> {
        match self {
            Resolution::Concrete(arg) | Resolution::EmptyDefault(arg) => Some(arg),
            Resolution::Unresolved => None,
        }
    }
}

/// Why a hook was not called
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// More parameters than the resolver binds
    UnsupportedArity(usize),
    /// The parameter at this position can be neither resolved, nulled nor omitted
    Unsatisfiable(usize),
}

/// Decision for one hook invocation
#[derive(Debug, Clone)]
pub enum Binding {
    /// Call the hook with these arguments
    Call(Vec<Arg>),
    /// Do not call the hook
    Skip(SkipReason),
}

/// Resolves hook parameters for one module
#[derive(Debug, Clone)]
pub struct ArgumentResolver {
    /// Weak so that a container holding module readers does not keep itself alive
    container: Weak<Container>,
    identifier: Identifier,
    /// Qualified type of the module, resolved like [`TypeTag::Module`]
    self_type: String,
}

impl ArgumentResolver {
    /// Create a resolver for the module `identifier` of type `self_type`
    pub fn new(container: Weak<Container>, identifier: Identifier, self_type: impl Into<String>) -> Self {
        Self {
            container,
            identifier,
            self_type: self_type.into(),
        }
    }

    /// Resolve a single parameter by its declared type
    pub fn resolve(&self, spec: &ParamSpec) -> Resolution {
        let Some(tag) = spec.tag.as_ref() else {
            return Resolution::Unresolved;
        };

        match tag {
            TypeTag::Container => match self.container.upgrade() {
                Some(container) => Resolution::Concrete(Arg::Container(container)),
                None => Resolution::Unresolved,
            },
            TypeTag::Module => Resolution::Concrete(Arg::Module(self.identifier.clone())),
            TypeTag::Named(name) if *name == self.self_type => {
                Resolution::Concrete(Arg::Module(self.identifier.clone()))
            }
            TypeTag::Str => Resolution::EmptyDefault(Arg::Str(String::new())),
            TypeTag::Int => Resolution::EmptyDefault(Arg::Int(0)),
            TypeTag::Float => Resolution::EmptyDefault(Arg::Float(0.0)),
            TypeTag::Bool => Resolution::EmptyDefault(Arg::Bool(false)),
            TypeTag::List => Resolution::EmptyDefault(Arg::List(Vec::new())),
            TypeTag::Named(_) => Resolution::Unresolved,
        }
    }

    /// Decide how to call a hook with the given signature
    ///
    /// Zero-parameter hooks are called with no arguments; the module already
    /// receives itself as the hook's receiver.
    pub fn bind(&self, signature: &HookSignature) -> Binding {
        let binding = match signature.params() {
            [] => Binding::Call(Vec::new()),
            [only] => self.bind_one(only),
            [first, second] => self.bind_two(first, second),
            params => Binding::Skip(SkipReason::UnsupportedArity(params.len())),
        };
        trace!("Hook binding for {}: {:?}", self.identifier, binding);
        binding
    }

    fn bind_one(&self, spec: &ParamSpec) -> Binding {
        match self.resolve(spec).into_value() {
            Some(arg) => Binding::Call(vec![arg]),
            None if spec.nullable => Binding::Call(vec![Arg::Null]),
            None if spec.optional => Binding::Call(Vec::new()),
            None => Binding::Skip(SkipReason::Unsatisfiable(0)),
        }
    }

    fn bind_two(&self, first: &ParamSpec, second: &ParamSpec) -> Binding {
        let arg0 = self.resolve(first).into_value();
        let arg1 = self.resolve(second).into_value();

        if arg0.is_none() && !first.nullable {
            return Binding::Skip(SkipReason::Unsatisfiable(0));
        }
        if arg1.is_none() && !second.nullable && !second.optional {
            return Binding::Skip(SkipReason::Unsatisfiable(1));
        }

        let arg0 = arg0.unwrap_or(Arg::Null);
        match arg1 {
            Some(arg1) => Binding::Call(vec![arg0, arg1]),
            None if second.nullable => Binding::Call(vec![arg0, Arg::Null]),
            None => Binding::Call(vec![arg0]),
        }
    }
}

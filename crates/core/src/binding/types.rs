use std::any::TypeId;
use std::fmt;

/// Whether an operation returns its result directly or as a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Sync,
    Async,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("sync"),
            Self::Async => f.write_str("async"),
        }
    }
}

/// Identity of an interceptable operation on a capability trait.
///
/// Wrappers usually declare one constant per trait method:
///
/// ```
/// use interpose_core::binding::MethodIdentity;
///
/// const GET_QUOTE: MethodIdentity = MethodIdentity::asynchronous("get_quote");
/// assert_eq!(GET_QUOTE.name(), "get_quote");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodIdentity {
    name: &'static str,
    kind: OperationKind,
}

impl MethodIdentity {
    pub const fn new(name: &'static str, kind: OperationKind) -> Self {
        Self { name, kind }
    }

    pub const fn sync(name: &'static str) -> Self {
        Self::new(name, OperationKind::Sync)
    }

    pub const fn asynchronous(name: &'static str) -> Self {
        Self::new(name, OperationKind::Async)
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type name without its module path or generic arguments.
///
/// ```
/// use interpose_core::binding::short_type_name;
///
/// assert_eq!(short_type_name::<std::collections::HashMap<u8, u8>>(), "HashMap");
/// ```
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.split('<')
        .next()
        .and_then(|path| path.rsplit("::").next())
        .unwrap_or(full)
}

/// Type identity of a behavior, used by ignore rules.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorType {
    id: TypeId,
    name: &'static str,
}

impl BehaviorType {
    pub fn of<B: 'static>() -> Self {
        Self {
            id: TypeId::of::<B>(),
            name: short_type_name::<B>(),
        }
    }

    /// Short type name, for logs and error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for BehaviorType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BehaviorType {}

/// Where a binding applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingScope {
    /// Every method of the target.
    Class,
    /// Only the named method.
    Method(&'static str),
}

/// The declarative part of a behavior binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDescriptor {
    pub scope: BindingScope,
    /// Optional binding name, used by ignore rules.
    pub name: Option<String>,
    pub behavior: BehaviorType,
    /// The behavior only supports asynchronous operations.
    pub requires_async: bool,
}

impl BindingDescriptor {
    pub fn is_class_level(&self) -> bool {
        matches!(self.scope, BindingScope::Class)
    }
}

/// Declares, on one method, that a class-level binding must be skipped.
///
/// A rule matches a binding by name, by behavior type, or by either when
/// both are set. Method-level bindings are never ignorable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    name: Option<String>,
    behavior: Option<BehaviorType>,
}

impl IgnoreRule {
    /// Skips the class-level binding with this name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            behavior: None,
        }
    }

    /// Skips every class-level binding of behavior type `B`.
    pub fn behavior<B: 'static>() -> Self {
        Self {
            name: None,
            behavior: Some(BehaviorType::of::<B>()),
        }
    }

    /// Adds a name to a type-based rule.
    pub fn or_named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn matches(&self, binding: &BindingDescriptor) -> bool {
        let by_name = match (&self.name, &binding.name) {
            (Some(rule), Some(bound)) => !bound.is_empty() && rule == bound,
            _ => false,
        };
        let by_type = self.behavior.is_some_and(|b| b == binding.behavior);
        by_name || by_type
    }
}

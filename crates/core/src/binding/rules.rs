//! Pure rule evaluation: does a binding intercept a given call?

use std::collections::HashMap;

use super::{BindingDescriptor, BindingScope, IgnoreRule, MethodIdentity, OperationKind};
use crate::error::{BehaviorError, Result};

/// Outcome of evaluating one binding against one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// The behavior intercepts the call.
    Applies,
    /// Method-level binding for a different method.
    OtherMethod,
    /// Class-level binding skipped by an ignore rule on the called method.
    Ignored,
}

impl Applicability {
    pub fn applies(self) -> bool {
        matches!(self, Self::Applies)
    }
}

/// Evaluates `binding` for a call to `method`.
///
/// `ignores` are the ignore rules declared on `method`. They only affect
/// class-level bindings.
pub fn applies_to(
    binding: &BindingDescriptor,
    method: &str,
    ignores: &[IgnoreRule],
) -> Applicability {
    match binding.scope {
        BindingScope::Method(bound) if bound != method => Applicability::OtherMethod,
        BindingScope::Method(_) => Applicability::Applies,
        BindingScope::Class => {
            if ignores.iter().any(|rule| rule.matches(binding)) {
                Applicability::Ignored
            } else {
                Applicability::Applies
            }
        }
    }
}

/// Checks a set of bindings against the declared method table.
///
/// Rejects bindings and ignore rules that name undeclared methods, and any
/// async-only binding that would intercept a synchronous method.
pub fn validate_bindings(
    bindings: &[BindingDescriptor],
    methods: &[MethodIdentity],
    ignores: &HashMap<&'static str, Vec<IgnoreRule>>,
) -> Result<()> {
    let declared = |name: &str| methods.iter().find(|m| m.name() == name);

    for method in ignores.keys() {
        if declared(method).is_none() {
            return Err(BehaviorError::InvalidConfiguration(format!(
                "ignore rule declared on unknown method {method}"
            )));
        }
    }

    for binding in bindings {
        let targets: Vec<&MethodIdentity> = match binding.scope {
            BindingScope::Method(name) => {
                let method = declared(name).ok_or_else(|| {
                    BehaviorError::InvalidConfiguration(format!(
                        "{} bound to unknown method {name}",
                        binding.behavior.name()
                    ))
                })?;
                vec![method]
            }
            BindingScope::Class => methods.iter().collect(),
        };

        if !binding.requires_async {
            continue;
        }

        for method in targets {
            let rules = ignores.get(method.name()).map(Vec::as_slice).unwrap_or_default();
            if method.kind() == OperationKind::Sync
                && applies_to(binding, method.name(), rules).applies()
            {
                return Err(BehaviorError::UnsupportedOperationKind {
                    behavior: binding.behavior.name(),
                    method: method.name(),
                });
            }
        }
    }

    Ok(())
}

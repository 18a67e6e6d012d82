use std::collections::HashMap;
use std::sync::Arc;

use interpose_core::binding::{
    short_type_name, validate_bindings, BindingDescriptor, IgnoreRule, MethodIdentity,
};
use interpose_core::BehaviorError;

use super::{Binding, Pipeline};

/// Collects a target, its bindings and its ignore rules into a [`Pipeline`].
pub struct PipelineBuilder<T, E> {
    target: Arc<T>,
    target_type: &'static str,
    methods: Vec<MethodIdentity>,
    bindings: Vec<Binding<E>>,
    ignores: HashMap<&'static str, Vec<IgnoreRule>>,
}

impl<T, E> PipelineBuilder<T, E>
where
    T: Send + Sync + 'static,
{
    pub fn new(target: T) -> Self {
        Self::from_arc(Arc::new(target))
    }

    pub fn from_arc(target: Arc<T>) -> Self {
        Self {
            target,
            target_type: short_type_name::<T>(),
            methods: Vec::new(),
            bindings: Vec::new(),
            ignores: HashMap::new(),
        }
    }

    /// Overrides the type name used in lock keys and logs.
    pub fn target_type(mut self, name: &'static str) -> Self {
        self.target_type = name;
        self
    }

    /// Declares the target's interceptable methods.
    ///
    /// With a method table, [`build`](Self::build) rejects bindings on
    /// unknown methods and async-only behaviors over synchronous methods.
    /// Without one these mistakes only surface when the method is called.
    pub fn methods(mut self, methods: &[MethodIdentity]) -> Self {
        self.methods.extend_from_slice(methods);
        self
    }

    pub fn bind(mut self, binding: Binding<E>) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Skips a class-level binding on calls to `method`.
    pub fn ignore(mut self, method: MethodIdentity, rule: IgnoreRule) -> Self {
        self.ignores.entry(method.name()).or_default().push(rule);
        self
    }

    pub fn build(self) -> Result<Pipeline<T, E>, BehaviorError> {
        let (mut bindings, method_level): (Vec<_>, Vec<_>) = self
            .bindings
            .into_iter()
            .partition(|binding| binding.descriptor.is_class_level());
        bindings.extend(method_level);

        if let Some(binding) = bindings
            .iter()
            .find(|binding| binding.config.expiration.is_some() && !binding.uses_expiration)
        {
            return Err(BehaviorError::InvalidConfiguration(format!(
                "{} does not support an expiration",
                binding.descriptor.behavior.name()
            )));
        }

        if !self.methods.is_empty() {
            let descriptors: Vec<BindingDescriptor> = bindings
                .iter()
                .map(|binding| binding.descriptor.clone())
                .collect();
            validate_bindings(&descriptors, &self.methods, &self.ignores)?;
        }

        tracing::debug!(
            target_type = self.target_type,
            bindings = bindings.len(),
            ignore_rules = self.ignores.values().map(Vec::len).sum::<usize>(),
            "Built interception pipeline"
        );

        Ok(Pipeline::new(self.target, self.target_type, bindings, self.ignores))
    }
}

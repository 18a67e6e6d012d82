use std::sync::Arc;

use interpose_core::binding::{
    BehaviorType, BindingConfig, BindingDescriptor, BindingScope, ExpiringCacheSettings,
    MethodIdentity,
};
use interpose_core::expiration::ExpirationSpec;
use interpose_core::BehaviorError;

use crate::behavior::{Behavior, BehaviorHandle};

/// A behavior attached to a target, at class or method scope.
pub struct Binding<E> {
    pub(crate) descriptor: BindingDescriptor,
    pub(crate) config: BindingConfig,
    pub(crate) handle: BehaviorHandle<E>,
    pub(crate) uses_expiration: bool,
}

impl<E> Binding<E> {
    /// Binds `behavior` to every method of the target.
    pub fn class<B: Behavior<E>>(behavior: Arc<B>) -> Self {
        Self::new(BindingScope::Class, behavior)
    }

    /// Binds `behavior` to a single method.
    pub fn method<B: Behavior<E>>(method: MethodIdentity, behavior: Arc<B>) -> Self {
        Self::new(BindingScope::Method(method.name()), behavior)
    }

    fn new<B: Behavior<E>>(scope: BindingScope, behavior: Arc<B>) -> Self {
        let uses_expiration = behavior.uses_expiration();
        let handle = behavior.handle();
        Self {
            descriptor: BindingDescriptor {
                scope,
                name: None,
                behavior: BehaviorType::of::<B>(),
                requires_async: handle.requires_async(),
            },
            config: BindingConfig::default(),
            handle,
            uses_expiration,
        }
    }

    /// Names the binding so ignore rules can refer to it.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.descriptor.name = Some(name.clone());
        self.config.name = Some(name);
        self
    }

    /// Replaces the binding configuration.
    ///
    /// A configuration without a name keeps the name already given through
    /// [`named`](Self::named).
    pub fn with_config(mut self, mut config: BindingConfig) -> Self {
        if config.name.is_none() {
            config.name = self.config.name.take();
        }
        self.descriptor.name = config.name.clone();
        self.config = config;
        self
    }

    /// Sets the entry expiration. Only behaviors that read it, such as
    /// [`ExpiringCache`](crate::ExpiringCache), accept one at build time.
    pub fn with_expiration(mut self, expiration: ExpirationSpec) -> Self {
        self.config.expiration = Some(expiration);
        self
    }

    /// Applies expiring-cache settings read from configuration.
    ///
    /// Fails with [`BehaviorError::InvalidFormat`] on a malformed TTL.
    pub fn with_settings(self, settings: ExpiringCacheSettings) -> Result<Self, BehaviorError> {
        Ok(self.with_config(BindingConfig::try_from(settings)?))
    }

    pub fn descriptor(&self) -> &BindingDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }
}

impl<E> std::fmt::Debug for Binding<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("descriptor", &self.descriptor)
            .field("config", &self.config)
            .finish()
    }
}

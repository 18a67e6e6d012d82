//! The contract every behavior implements.
//!
//! A behavior receives a [`Context`] describing the intercepted call and a
//! continuation (`next`) that performs whatever would have happened without
//! it: the next behavior inward, or the real call. Behaviors either answer
//! from their own state or call `next` exactly once and hand back its result
//! or failure untouched.
//!
//! Synchronous and asynchronous operations go through two separate traits.
//! A behavior that only makes sense for asynchronous operations (such as
//! [`KeyedLock`](crate::KeyedLock)) implements [`AsyncBehavior`] alone, and
//! the pipeline refuses to route a synchronous call through it.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use interpose_core::binding::{BindingConfig, MethodIdentity};
use interpose_core::keys::{derive_key, lock_key, CallArguments};
use interpose_core::BehaviorError;

/// A type-erased call result, shared between the cache and its readers.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Continuation of a synchronous call.
pub type Next<'a, E> = Box<dyn FnOnce() -> Result<Value, E> + 'a>;

/// Continuation of an asynchronous call.
pub type AsyncNext<'a, E> = Box<dyn FnOnce() -> BoxFuture<'a, Result<Value, E>> + Send + 'a>;

/// Everything a behavior knows about the call it intercepts.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// The wrapped object.
    pub target: &'a (dyn Any + Send + Sync),
    /// Short type name of the wrapped object.
    pub target_type: &'static str,
    pub method: MethodIdentity,
    pub args: &'a CallArguments,
    /// Configuration of the binding being evaluated.
    pub config: &'a BindingConfig,
}

impl Context<'_> {
    /// Cache key for this call: method name plus argument digest.
    pub fn cache_key(&self) -> Result<String, BehaviorError> {
        derive_key(self.method.name(), self.args)
    }

    /// Lock key for this call; independent of the arguments.
    pub fn lock_key(&self) -> String {
        lock_key(self.target_type, self.method.name())
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("target_type", &self.target_type)
            .field("method", &self.method)
            .field("args", &self.args)
            .field("config", &self.config)
            .finish()
    }
}

/// Behavior over synchronous operations.
pub trait SyncBehavior<E>: Send + Sync {
    fn invoke(&self, ctx: &Context<'_>, next: Next<'_, E>) -> Result<Value, E>;
}

/// Behavior over asynchronous operations.
#[async_trait]
pub trait AsyncBehavior<E>: Send + Sync {
    async fn invoke_async(&self, ctx: &Context<'_>, next: AsyncNext<'_, E>) -> Result<Value, E>;
}

/// The capability set a behavior offers to the pipeline.
pub enum BehaviorHandle<E> {
    /// Usable on synchronous and asynchronous operations.
    Dual {
        sync: Arc<dyn SyncBehavior<E>>,
        asynchronous: Arc<dyn AsyncBehavior<E>>,
    },
    /// Usable on asynchronous operations only.
    AsyncOnly(Arc<dyn AsyncBehavior<E>>),
}

impl<E> BehaviorHandle<E> {
    pub fn requires_async(&self) -> bool {
        matches!(self, Self::AsyncOnly(_))
    }
}

impl<E> Clone for BehaviorHandle<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Dual { sync, asynchronous } => Self::Dual {
                sync: Arc::clone(sync),
                asynchronous: Arc::clone(asynchronous),
            },
            Self::AsyncOnly(behavior) => Self::AsyncOnly(Arc::clone(behavior)),
        }
    }
}

/// Implemented by every concrete behavior so it can be bound.
///
/// `E` is the wrapped capability's error type; behavior-originated failures
/// reach it through `From<BehaviorError>`.
pub trait Behavior<E>: Send + Sync + 'static {
    fn handle(self: Arc<Self>) -> BehaviorHandle<E>;

    /// Whether the behavior reads the binding's expiration.
    ///
    /// Building a pipeline rejects an expiration on behaviors returning
    /// `false`.
    fn uses_expiration(&self) -> bool {
        false
    }
}

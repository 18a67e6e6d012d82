//! Interception pipeline for capability traits.
//!
//! A service is wrapped in a [`Pipeline`] together with an ordered list of
//! behavior [`Binding`]s. Every call routed through the pipeline runs the
//! bindings that apply to it, outermost first, before reaching the real
//! method. Three behaviors ship with the crate:
//!
//! - [`Memoize`] caches every successful result for the life of the process.
//! - [`ExpiringCache`] caches with an absolute or sliding expiration.
//! - [`KeyedLock`] serializes concurrent asynchronous calls to one method.
//!
//! Custom behaviors implement [`SyncBehavior`] and/or [`AsyncBehavior`] plus
//! [`Behavior`].

mod behavior;
mod config;
mod expiring;
mod lock;
mod memoize;
mod pipeline;
mod slot;

pub use behavior::{
    AsyncBehavior, AsyncNext, Behavior, BehaviorHandle, Context, Next, SyncBehavior, Value,
};
pub use config::InterposeConfig;
pub use expiring::{CacheEntry, EntryStore, ExpiringCache, MemoryStore};
pub use lock::KeyedLock;
pub use memoize::Memoize;
pub use pipeline::{Binding, Pipeline, PipelineBuilder};

pub use interpose_core::binding::{
    BindingConfig, ExpiringCacheSettings, IgnoreRule, MethodIdentity, OperationKind,
};
pub use interpose_core::expiration::{ExpirationPolicy, ExpirationSpec};
pub use interpose_core::keys::CallArguments;
pub use interpose_core::{call_args, BehaviorError};

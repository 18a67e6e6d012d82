use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use interpose_core::expiration::ExpirationSpec;
use interpose_core::BehaviorError;

use super::store::{CacheEntry, EntryStore, MemoryStore};
use crate::behavior::{
    AsyncBehavior, AsyncNext, Behavior, BehaviorHandle, Context, Next, SyncBehavior, Value,
};
use crate::config::InterposeConfig;

/// Caches results with a per-entry absolute or sliding expiration.
///
/// The expiration comes from the binding's [`BindingConfig`] when it sets
/// one, otherwise from the cache's default. An unrecognized policy fails
/// with [`BehaviorError::InvalidConfiguration`] when the first entry is
/// created.
///
/// [`BindingConfig`]: interpose_core::binding::BindingConfig
pub struct ExpiringCache {
    store: Arc<dyn EntryStore>,
    default_expiration: ExpirationSpec,
}

impl ExpiringCache {
    /// Creates a cache backed by an LRU [`MemoryStore`].
    pub fn new(max_entries: NonZeroUsize) -> Self {
        Self::with_store(Arc::new(MemoryStore::new(max_entries)))
    }

    pub fn with_store(store: Arc<dyn EntryStore>) -> Self {
        Self {
            store,
            default_expiration: ExpirationSpec::default(),
        }
    }

    pub fn from_config(config: &InterposeConfig) -> Self {
        Self::new(config.cache_max_entries)
            .with_default_expiration(config.default_expiration.clone())
    }

    pub fn with_default_expiration(mut self, expiration: ExpirationSpec) -> Self {
        self.default_expiration = expiration;
        self
    }

    /// Number of stored entries, expired ones included until next access.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn entry(&self, ctx: &Context<'_>, key: &str) -> Result<Arc<CacheEntry>, BehaviorError> {
        let spec = ctx
            .config
            .expiration
            .as_ref()
            .unwrap_or(&self.default_expiration);
        self.store
            .get_or_create(key, Instant::now(), &|| spec.resolve().map(CacheEntry::new))
    }
}

impl<E> SyncBehavior<E> for ExpiringCache
where
    E: From<BehaviorError>,
{
    fn invoke(&self, ctx: &Context<'_>, next: Next<'_, E>) -> Result<Value, E> {
        let key = ctx.cache_key()?;
        let entry = self.entry(ctx, &key)?;
        let (value, computed) = match entry.slot.get_or_compute(next) {
            Ok(found) => found,
            Err(err) => {
                self.store.discard_unfilled(&key, &entry);
                return Err(err);
            }
        };
        entry.touch(Instant::now(), computed);
        tracing::trace!(key = %key, hit = !computed, "Expiring cache lookup");
        Ok(value)
    }
}

#[async_trait]
impl<E> AsyncBehavior<E> for ExpiringCache
where
    E: From<BehaviorError> + Send + 'static,
{
    async fn invoke_async(&self, ctx: &Context<'_>, next: AsyncNext<'_, E>) -> Result<Value, E> {
        let key = ctx.cache_key()?;
        let entry = self.entry(ctx, &key)?;
        let (value, computed) = match entry.slot.get_or_compute_async(next).await {
            Ok(found) => found,
            Err(err) => {
                self.store.discard_unfilled(&key, &entry);
                return Err(err);
            }
        };
        entry.touch(Instant::now(), computed);
        tracing::trace!(key = %key, hit = !computed, "Expiring cache lookup");
        Ok(value)
    }
}

impl<E> Behavior<E> for ExpiringCache
where
    E: From<BehaviorError> + Send + 'static,
{
    fn handle(self: Arc<Self>) -> BehaviorHandle<E> {
        BehaviorHandle::Dual {
            sync: self.clone(),
            asynchronous: self,
        }
    }

    fn uses_expiration(&self) -> bool {
        true
    }
}

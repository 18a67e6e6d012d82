//! Unbounded memoization.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use interpose_core::BehaviorError;

use crate::behavior::{
    AsyncBehavior, AsyncNext, Behavior, BehaviorHandle, Context, Next, SyncBehavior, Value,
};
use crate::slot::ComputeSlot;

/// Caches every successful result forever, keyed by method and arguments.
///
/// Failures are never stored: a failing call is retried on the next
/// invocation with the same key. Concurrent misses for one key run the
/// wrapped call once; misses for different keys do not wait on each other.
#[derive(Default)]
pub struct Memoize {
    slots: DashMap<String, Arc<ComputeSlot>>,
}

impl Memoize {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys holding a result.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every memoized result.
    pub fn clear(&self) {
        self.slots.clear();
    }

    fn slot(&self, key: &str) -> Arc<ComputeSlot> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ComputeSlot::new()));
        Arc::clone(slot.value())
    }

    /// Removes `slot` after a failed computation unless another caller is
    /// already waiting on it.
    fn discard_unfilled(&self, key: &str, slot: Arc<ComputeSlot>) {
        self.slots.remove_if(key, |_, stored| {
            Arc::ptr_eq(stored, &slot)
                && stored.get().is_none()
                && Arc::strong_count(stored) == 2
        });
    }
}

impl<E> SyncBehavior<E> for Memoize
where
    E: From<BehaviorError>,
{
    fn invoke(&self, ctx: &Context<'_>, next: Next<'_, E>) -> Result<Value, E> {
        let key = ctx.cache_key()?;
        let slot = self.slot(&key);
        let (value, computed) = match slot.get_or_compute(next) {
            Ok(found) => found,
            Err(err) => {
                self.discard_unfilled(&key, slot);
                return Err(err);
            }
        };
        tracing::trace!(key = %key, hit = !computed, "Memoize lookup");
        Ok(value)
    }
}

#[async_trait]
impl<E> AsyncBehavior<E> for Memoize
where
    E: From<BehaviorError> + Send + 'static,
{
    async fn invoke_async(&self, ctx: &Context<'_>, next: AsyncNext<'_, E>) -> Result<Value, E> {
        let key = ctx.cache_key()?;
        let slot = self.slot(&key);
        let outcome = slot.get_or_compute_async(next).await;
        let (value, computed) = match outcome {
            Ok(found) => found,
            Err(err) => {
                self.discard_unfilled(&key, slot);
                return Err(err);
            }
        };
        tracing::trace!(key = %key, hit = !computed, "Memoize lookup");
        Ok(value)
    }
}

impl<E> Behavior<E> for Memoize
where
    E: From<BehaviorError> + Send + 'static,
{
    fn handle(self: Arc<Self>) -> BehaviorHandle<E> {
        BehaviorHandle::Dual {
            sync: self.clone(),
            asynchronous: self,
        }
    }
}

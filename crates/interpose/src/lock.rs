//! Reference-counted per-key locking for asynchronous operations.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use interpose_core::BehaviorError;

use crate::behavior::{AsyncBehavior, AsyncNext, Behavior, BehaviorHandle, Context, Value};

struct LockSlot {
    gate: Arc<AsyncMutex<()>>,
    /// Callers holding or waiting on `gate`.
    refs: usize,
}

/// Serializes concurrent calls that share a lock key.
///
/// The key is derived from the target type and method name only, so every
/// call to a locked method waits for the previous one regardless of its
/// arguments. Calls to different methods never block each other. A slot
/// exists only while at least one caller holds or awaits it.
///
/// Synchronous operations are not supported; binding a `KeyedLock` where it
/// would intercept one is rejected when the pipeline is built.
#[derive(Default)]
pub struct KeyedLock {
    slots: Mutex<HashMap<String, LockSlot>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with at least one holder or waiter.
    pub fn active_slots(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn holds_slot(&self, key: &str) -> bool {
        self.slots.lock().contains_key(key)
    }

    /// Registers a caller on `key`'s slot, creating the slot if needed.
    fn lease(&self, key: String) -> SlotLease<'_> {
        let gate = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_insert_with(|| LockSlot {
                gate: Arc::new(AsyncMutex::new(())),
                refs: 0,
            });
            slot.refs += 1;
            Arc::clone(&slot.gate)
        };

        SlotLease {
            owner: self,
            key,
            gate,
            guard: None,
        }
    }
}

/// A caller's registration on a lock slot.
///
/// Dropping the lease releases the gate and the reference under the table
/// lock, removing the slot when the last reference goes. This runs on
/// success, failure and cancellation alike.
struct SlotLease<'a> {
    owner: &'a KeyedLock,
    key: String,
    gate: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SlotLease<'_> {
    async fn acquire(&mut self) {
        let guard = Arc::clone(&self.gate).lock_owned().await;
        self.guard = Some(guard);
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        let mut slots = self.owner.slots.lock();
        self.guard.take();

        if let Entry::Occupied(mut slot) = slots.entry(std::mem::take(&mut self.key)) {
            slot.get_mut().refs -= 1;
            if slot.get().refs == 0 {
                let (key, _) = slot.remove_entry();
                tracing::trace!(key = %key, "Lock slot released");
            }
        }
    }
}

#[async_trait]
impl<E> AsyncBehavior<E> for KeyedLock
where
    E: From<BehaviorError> + Send + 'static,
{
    async fn invoke_async(&self, ctx: &Context<'_>, next: AsyncNext<'_, E>) -> Result<Value, E> {
        let mut lease = self.lease(ctx.lock_key());
        lease.acquire().await;
        tracing::trace!(key = %lease.key, "Lock acquired");

        let result = next().await;
        drop(lease);
        result
    }
}

impl<E> Behavior<E> for KeyedLock
where
    E: From<BehaviorError> + Send + 'static,
{
    fn handle(self: Arc<Self>) -> BehaviorHandle<E> {
        BehaviorHandle::AsyncOnly(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::FutureExt;
    use interpose_core::binding::{BindingConfig, MethodIdentity};
    use interpose_core::keys::CallArguments;

    #[derive(Default)]
    struct Overlap {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    async fn run_locked(
        lock: Arc<KeyedLock>,
        method: &'static str,
        overlap: Arc<Overlap>,
        hold: Duration,
    ) -> Result<Value, BehaviorError> {
        let args = CallArguments::new();
        let config = BindingConfig::default();
        let ctx = Context {
            target: &(),
            target_type: "Ledger",
            method: MethodIdentity::asynchronous(method),
            args: &args,
            config: &config,
        };

        AsyncBehavior::<BehaviorError>::invoke_async(
            &*lock,
            &ctx,
            Box::new(move || {
                async move {
                    let now = overlap.active.fetch_add(1, Ordering::SeqCst) + 1;
                    overlap.peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(hold).await;
                    overlap.active.fetch_sub(1, Ordering::SeqCst);
                    Ok(Arc::new(()) as Value)
                }
                .boxed()
            }),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_calls_do_not_overlap() {
        let lock = Arc::new(KeyedLock::new());
        let overlap = Arc::new(Overlap::default());

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                tokio::spawn(run_locked(
                    Arc::clone(&lock),
                    "post",
                    Arc::clone(&overlap),
                    Duration::from_millis(10),
                ))
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(overlap.peak.load(Ordering::SeqCst), 1);
        assert_eq!(lock.active_slots(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_overlap() {
        let lock = Arc::new(KeyedLock::new());
        let overlap = Arc::new(Overlap::default());

        let first = tokio::spawn(run_locked(
            Arc::clone(&lock),
            "post",
            Arc::clone(&overlap),
            Duration::from_millis(10),
        ));
        let second = tokio::spawn(run_locked(
            Arc::clone(&lock),
            "refund",
            Arc::clone(&overlap),
            Duration::from_millis(10),
        ));
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(overlap.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_exists_only_while_held() {
        let lock = Arc::new(KeyedLock::new());
        let overlap = Arc::new(Overlap::default());

        let task = tokio::spawn(run_locked(
            Arc::clone(&lock),
            "post",
            Arc::clone(&overlap),
            Duration::from_secs(1),
        ));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(lock.holds_slot("Ledger_post"));

        task.await.unwrap().unwrap();
        assert!(!lock.holds_slot("Ledger_post"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_slot_leak_after_cancellation() {
        let lock = Arc::new(KeyedLock::new());
        let overlap = Arc::new(Overlap::default());

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let call = run_locked(
                    Arc::clone(&lock),
                    "post",
                    Arc::clone(&overlap),
                    Duration::from_millis(10),
                );
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        // Gives up while holding or waiting on the lock.
                        tokio::time::timeout(Duration::from_millis(15), call)
                            .await
                            .is_ok()
                    } else {
                        call.await.is_ok()
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(lock.active_slots(), 0);
        assert!(!lock.holds_slot("Ledger_post"));
    }

    #[tokio::test]
    async fn test_failure_releases_slot() {
        let lock = KeyedLock::new();
        let args = CallArguments::new();
        let config = BindingConfig::default();
        let ctx = Context {
            target: &(),
            target_type: "Ledger",
            method: MethodIdentity::asynchronous("post"),
            args: &args,
            config: &config,
        };

        let result = AsyncBehavior::<BehaviorError>::invoke_async(
            &lock,
            &ctx,
            Box::new(|| {
                async { Err::<Value, _>(BehaviorError::InvalidConfiguration("rejected".into())) }
                    .boxed()
            }),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(lock.active_slots(), 0);
    }

    #[test]
    fn test_handle_is_async_only() {
        let handle: BehaviorHandle<BehaviorError> = Arc::new(KeyedLock::new()).handle();
        assert!(handle.requires_async());
    }
}

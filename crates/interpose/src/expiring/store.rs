use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use interpose_core::expiration::Expiry;
use interpose_core::BehaviorError;

use crate::slot::ComputeSlot;

/// A single expiring cache entry.
///
/// The expiration clock starts when the value is installed, not when the
/// entry is created, so a slow computation does not eat into the TTL.
pub struct CacheEntry {
    pub(crate) slot: ComputeSlot,
    expiry: Expiry,
    /// Install time for absolute entries, last read for sliding ones.
    stamp: Mutex<Option<Instant>>,
}

impl CacheEntry {
    pub fn new(expiry: Expiry) -> Self {
        Self {
            slot: ComputeSlot::new(),
            expiry,
            stamp: Mutex::new(None),
        }
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Returns true once more than the TTL has elapsed since the stamp.
    ///
    /// An entry whose value is still being computed never expires.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.stamp
            .lock()
            .is_some_and(|at| now.saturating_duration_since(at) > self.expiry.ttl())
    }

    /// Records an access. `installed` is true for the call that computed
    /// the value.
    pub(crate) fn touch(&self, now: Instant, installed: bool) {
        let mut stamp = self.stamp.lock();
        if installed || self.expiry.is_sliding() || stamp.is_none() {
            *stamp = Some(now);
        }
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("expiry", &self.expiry)
            .field("stamp", &*self.stamp.lock())
            .field("filled", &self.slot.get().is_some())
            .finish()
    }
}

/// Storage substrate behind [`ExpiringCache`](super::ExpiringCache).
///
/// Implementations must hand every caller asking for the same live key the
/// same entry; the entry's slot then guarantees a single computation.
pub trait EntryStore: Send + Sync {
    /// Returns the live entry for `key`, replacing it through `create` when
    /// it is missing or expired at `now`.
    fn get_or_create(
        &self,
        key: &str,
        now: Instant,
        create: &dyn Fn() -> Result<CacheEntry, BehaviorError>,
    ) -> Result<Arc<CacheEntry>, BehaviorError>;

    fn remove(&self, key: &str);

    /// Drops `entry` if it is still stored under `key`, holds no value and
    /// no caller other than the one asking still references it.
    ///
    /// Called after a failed computation so failing keys do not pile up.
    fn discard_unfilled(&self, key: &str, entry: &Arc<CacheEntry>);

    /// Number of stored entries, expired ones included until next access.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory entry store with LRU eviction.
///
/// Bounded by `max_entries`: inserting into a full store evicts the least
/// recently used entry that already holds a value. Entries whose value is
/// still being computed are never evicted, so the store may briefly exceed
/// its bound while every entry is in flight.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Arc<CacheEntry>>>,
    max_entries: NonZeroUsize,
}

impl MemoryStore {
    pub fn new(max_entries: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_entries,
        }
    }

    fn evict_overflow(&self, entries: &mut LruCache<String, Arc<CacheEntry>>) {
        while entries.len() > self.max_entries.get() {
            let victim = entries
                .iter()
                .rev()
                .find(|(_, entry)| entry.slot.get().is_some())
                .map(|(key, _)| key.clone());

            match victim {
                Some(key) => {
                    entries.pop(&key);
                    tracing::trace!(key = %key, "Cache entry evicted");
                }
                None => {
                    tracing::trace!(
                        entries = entries.len(),
                        "Cache over capacity with every entry in flight"
                    );
                    break;
                }
            }
        }
    }
}

impl EntryStore for MemoryStore {
    fn get_or_create(
        &self,
        key: &str,
        now: Instant,
        create: &dyn Fn() -> Result<CacheEntry, BehaviorError>,
    ) -> Result<Arc<CacheEntry>, BehaviorError> {
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Arc::clone(entry)),
            Some(_) => {
                tracing::trace!(key = %key, "Cache entry expired");
                entries.pop(key);
            }
            None => {}
        }

        let entry = Arc::new(create()?);
        entries.put(key.to_string(), Arc::clone(&entry));
        self.evict_overflow(&mut entries);
        Ok(entry)
    }

    fn remove(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    fn discard_unfilled(&self, key: &str, entry: &Arc<CacheEntry>) {
        let mut entries = self.entries.lock();
        // Callers only obtain entries under this lock, so a count of two
        // (the store and `entry`) means nobody else is waiting on it.
        let unused = entries.peek(key).is_some_and(|stored| {
            Arc::ptr_eq(stored, entry)
                && stored.slot.get().is_none()
                && Arc::strong_count(stored) == 2
        });
        if unused {
            entries.pop(key);
        }
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

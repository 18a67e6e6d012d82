//! Expiring cache behavior and its entry store.
//!
//! Entries carry an [`Expiry`](interpose_core::expiration::Expiry) fixed at
//! creation. Expiration is lazy: an expired entry is dropped and recreated
//! the next time its key is requested.

mod cache;
mod store;

pub use cache::ExpiringCache;
pub use store::{CacheEntry, EntryStore, MemoryStore};

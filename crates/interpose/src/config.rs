use std::env;
use std::num::NonZeroUsize;

use interpose_core::expiration::{ExpirationPolicy, ExpirationSpec, DEFAULT_TTL};
use interpose_core::BehaviorError;

const DEFAULT_CACHE_MAX_ENTRIES: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Process-wide defaults for the caching behaviors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterposeConfig {
    /// Maximum entries per expiring cache before LRU eviction (default: 10,000)
    pub cache_max_entries: NonZeroUsize,
    /// Expiration for bindings that do not set one (default: 1m, absolute)
    pub default_expiration: ExpirationSpec,
}

impl InterposeConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `INTERPOSE_CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `INTERPOSE_DEFAULT_TTL` - Default TTL such as `30s` or `5m` (default: "1m")
    /// - `INTERPOSE_DEFAULT_POLICY` - `absolute` or `sliding` (default: "absolute")
    ///
    /// A malformed TTL is an error rather than a silent fallback.
    pub fn from_env() -> Result<Self, BehaviorError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, BehaviorError> {
        let cache_max_entries = var("INTERPOSE_CACHE_MAX_ENTRIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);
        let ttl = var("INTERPOSE_DEFAULT_TTL").unwrap_or_else(|| DEFAULT_TTL.to_string());
        let policy = var("INTERPOSE_DEFAULT_POLICY")
            .map(ExpirationPolicy::from)
            .unwrap_or_default();

        Ok(Self {
            cache_max_entries,
            default_expiration: ExpirationSpec::new(&ttl, policy)?,
        })
    }
}

impl Default for InterposeConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            default_expiration: ExpirationSpec::default(),
        }
    }
}

//! Per-binding behavior configuration.

use serde::{Deserialize, Serialize};

use crate::error::{BehaviorError, Result};
use crate::expiration::{ExpirationPolicy, ExpirationSpec, DEFAULT_TTL};

/// Static configuration handed to a behavior with every intercepted call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingConfig {
    /// Binding name, matched by [`IgnoreRule::named`](super::IgnoreRule::named).
    pub name: Option<String>,
    /// Expiration for caching behaviors that support it.
    pub expiration: Option<ExpirationSpec>,
}

impl BindingConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            expiration: None,
        }
    }

    pub fn with_expiration(mut self, expiration: ExpirationSpec) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

/// Raw expiring-cache configuration, as written in a settings file.
///
/// ```
/// use interpose_core::binding::{BindingConfig, ExpiringCacheSettings};
///
/// let settings: ExpiringCacheSettings =
///     serde_json::from_str(r#"{ "name": "quotes", "ttl": "30s", "policy": "sliding" }"#).unwrap();
/// let config = BindingConfig::try_from(settings).unwrap();
/// assert_eq!(config.name.as_deref(), Some("quotes"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringCacheSettings {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_ttl")]
    pub ttl: String,
    #[serde(default)]
    pub policy: ExpirationPolicy,
}

fn default_ttl() -> String {
    DEFAULT_TTL.to_string()
}

impl Default for ExpiringCacheSettings {
    fn default() -> Self {
        Self {
            name: None,
            ttl: default_ttl(),
            policy: ExpirationPolicy::default(),
        }
    }
}

impl TryFrom<ExpiringCacheSettings> for BindingConfig {
    type Error = BehaviorError;

    /// Parses the TTL; a malformed TTL fails here, at bind time.
    fn try_from(settings: ExpiringCacheSettings) -> Result<Self> {
        let expiration = ExpirationSpec::new(&settings.ttl, settings.policy)?;
        Ok(Self {
            name: settings.name,
            expiration: Some(expiration),
        })
    }
}

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::parse_duration;
use crate::error::{BehaviorError, Result};

/// TTL used when a binding does not configure one.
pub const DEFAULT_TTL: &str = "1m";

/// How an entry's time-to-live is measured.
///
/// Policies read from configuration are kept verbatim when they are not
/// recognized; the error surfaces when the policy is attached to a new cache
/// entry (see [`ExpirationSpec::resolve`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExpirationPolicy {
    /// Expires `ttl` after creation, regardless of reads.
    #[default]
    Absolute,
    /// Expires `ttl` after the most recent read.
    Sliding,
    /// A policy name that matched neither of the above.
    Unrecognized(String),
}

impl From<&str> for ExpirationPolicy {
    fn from(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("absolute") {
            Self::Absolute
        } else if raw.eq_ignore_ascii_case("sliding") {
            Self::Sliding
        } else {
            Self::Unrecognized(raw.to_string())
        }
    }
}

impl From<String> for ExpirationPolicy {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<ExpirationPolicy> for String {
    fn from(policy: ExpirationPolicy) -> Self {
        policy.to_string()
    }
}

impl fmt::Display for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => f.write_str("absolute"),
            Self::Sliding => f.write_str("sliding"),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// A resolved expiration, ready to be stamped on a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Absolute(Duration),
    Sliding(Duration),
}

impl Expiry {
    pub fn ttl(&self) -> Duration {
        match self {
            Self::Absolute(ttl) | Self::Sliding(ttl) => *ttl,
        }
    }

    pub fn is_sliding(&self) -> bool {
        matches!(self, Self::Sliding(_))
    }
}

/// Per-binding expiration configuration: a validated TTL and a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirationSpec {
    ttl: Duration,
    policy: ExpirationPolicy,
}

impl ExpirationSpec {
    /// Parses `ttl` and pairs it with `policy`.
    ///
    /// A malformed TTL fails here with [`BehaviorError::InvalidFormat`]; the
    /// policy is not checked until [`ExpirationSpec::resolve`].
    pub fn new(ttl: &str, policy: impl Into<ExpirationPolicy>) -> Result<Self> {
        Ok(Self {
            ttl: parse_duration(ttl)?,
            policy: policy.into(),
        })
    }

    pub fn absolute(ttl: Duration) -> Self {
        Self {
            ttl,
            policy: ExpirationPolicy::Absolute,
        }
    }

    pub fn sliding(ttl: Duration) -> Self {
        Self {
            ttl,
            policy: ExpirationPolicy::Sliding,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    /// Turns the configuration into an [`Expiry`] for a new entry.
    pub fn resolve(&self) -> Result<Expiry> {
        match &self.policy {
            ExpirationPolicy::Absolute => Ok(Expiry::Absolute(self.ttl)),
            ExpirationPolicy::Sliding => Ok(Expiry::Sliding(self.ttl)),
            ExpirationPolicy::Unrecognized(raw) => Err(BehaviorError::InvalidConfiguration(
                format!("unrecognized expiration policy {raw:?}"),
            )),
        }
    }
}

impl Default for ExpirationSpec {
    /// One minute, absolute.
    fn default() -> Self {
        Self::absolute(Duration::from_secs(60))
    }
}

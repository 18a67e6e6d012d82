//! Pure functions for deriving cache and lock keys.

use std::fmt::Write as _;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::CallArguments;
use crate::error::{BehaviorError, Result};

/// Encodes the arguments as canonical JSON bytes.
///
/// Object members are written in key order whatever the map type of the
/// original argument was, so equal argument values always encode to equal
/// bytes.
pub fn canonical_bytes(args: &CallArguments) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    out.push(b'[');
    for (i, value) in args.values()?.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_canonical(value, &mut out)?;
    }
    out.push(b']');
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(members) => {
            let mut sorted: Vec<_> = members.iter().collect();
            sorted.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (name, member)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, name)
                    .map_err(|e| BehaviorError::Serialization(e.to_string()))?;
                out.push(b':');
                write_canonical(member, out)?;
            }
            out.push(b'}');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)
            .map_err(|e| BehaviorError::Serialization(e.to_string()))?,
    }
    Ok(())
}

/// Derives the cache key for one invocation.
///
/// The key is `"{method}_{HEX}"` where `HEX` is the upper-case SHA-256 of the
/// canonical argument encoding.
///
/// # Examples
///
/// ```
/// use interpose_core::{call_args, keys::derive_key};
///
/// let key = derive_key("get_quote", &call_args!("AAPL")).unwrap();
/// assert!(key.starts_with("get_quote_"));
/// assert_eq!(key.len(), "get_quote_".len() + 64);
/// ```
pub fn derive_key(method: &str, args: &CallArguments) -> Result<String> {
    let bytes = canonical_bytes(args)?;
    let digest = Sha256::digest(&bytes);

    let mut key = String::with_capacity(method.len() + 1 + digest.len() * 2);
    key.push_str(method);
    key.push('_');
    for byte in digest.iter() {
        // Writing to a String cannot fail.
        let _ = write!(key, "{byte:02X}");
    }
    Ok(key)
}

/// Returns the lock key shared by every call to `method` on `target_type`.
pub fn lock_key(target_type: &str, method: &str) -> String {
    format!("{}_{}", target_type, method)
}

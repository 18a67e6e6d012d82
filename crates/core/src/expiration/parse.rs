use std::time::Duration;

use crate::error::{BehaviorError, Result};

/// Parses a compact duration such as `"30s"`, `"5m"`, `"2h"` or `"1d"`.
///
/// The accepted shape is exactly `<positive integer><unit>` with the unit one
/// of `s`, `m`, `h`, `d` in either case. Anything else fails with
/// [`BehaviorError::InvalidFormat`] carrying the input.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use interpose_core::expiration::parse_duration;
///
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert!(parse_duration("5").is_err());
/// ```
pub fn parse_duration(text: &str) -> Result<Duration> {
    let invalid = || BehaviorError::InvalidFormat(text.to_string());

    let mut chars = text.chars();
    let unit = chars.next_back().ok_or_else(invalid)?;
    let digits = chars.as_str();

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }

    let unit_secs: u64 = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

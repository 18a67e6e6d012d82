mod parse;
mod policy;

pub use parse::parse_duration;
pub use policy::{ExpirationPolicy, ExpirationSpec, Expiry, DEFAULT_TTL};

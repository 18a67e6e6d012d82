mod arguments;
mod derive;

pub use arguments::CallArguments;
pub use derive::{canonical_bytes, derive_key, lock_key};

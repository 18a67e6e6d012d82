//! Pure building blocks for the interpose interception pipeline.
//!
//! Nothing in this crate holds runtime state or performs I/O: it derives
//! keys, parses and resolves expiration settings, and evaluates which
//! bindings intercept which calls. The behaviors and the dispatch engine
//! live in the `interpose` crate.

pub mod binding;
pub mod error;
pub mod expiration;
pub mod keys;

pub use error::{BehaviorError, Result};

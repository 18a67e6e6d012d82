//! Composition of behavior bindings around a target object.
//!
//! A [`Pipeline`] owns the wrapped target and its ordered bindings. A
//! hand-written wrapper implements the capability trait by routing every
//! method through [`Pipeline::call`] or [`Pipeline::call_async`]:
//!
//! ```ignore
//! const GET_QUOTE: MethodIdentity = MethodIdentity::sync("get_quote");
//!
//! impl QuoteSource for Intercepted<Quotes> {
//!     fn get_quote(&self, symbol: &str) -> Result<Quote, QuoteError> {
//!         self.pipeline
//!             .call(GET_QUOTE, call_args!(symbol), |quotes| quotes.get_quote(symbol))
//!     }
//! }
//! ```
//!
//! Class-level bindings run before method-level ones; within each group the
//! first declared binding is the outermost wrapper.

mod binding;
mod builder;
mod dispatch;

pub use binding::Binding;
pub use builder::PipelineBuilder;
pub use dispatch::Pipeline;

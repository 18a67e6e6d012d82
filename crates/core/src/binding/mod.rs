mod config;
mod rules;
mod types;

pub use config::{BindingConfig, ExpiringCacheSettings};
pub use rules::{applies_to, validate_bindings, Applicability};
pub use types::{
    short_type_name, BehaviorType, BindingDescriptor, BindingScope, IgnoreRule, MethodIdentity,
    OperationKind,
};

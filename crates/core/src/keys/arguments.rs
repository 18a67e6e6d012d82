//! Ordered call arguments, encoded eagerly for key derivation.

use serde::Serialize;
use serde_json::Value;

use crate::error::{BehaviorError, Result};

/// The ordered argument list of one intercepted invocation.
///
/// Each argument is encoded to a JSON value when it is pushed. An argument
/// that cannot be encoded does not abort construction: the first failure is
/// remembered and reported by [`CallArguments::values`], so the error reaches
/// the caller through key derivation instead of being replaced by a
/// degraded key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArguments {
    values: Vec<Value>,
    failure: Option<String>,
}

impl CallArguments {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument, builder style.
    pub fn with<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.push(value);
        self
    }

    /// Appends an argument.
    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) {
        match serde_json::to_value(value) {
            Ok(encoded) => self.values.push(encoded),
            Err(err) => {
                let position = self.values.len();
                self.failure
                    .get_or_insert_with(|| format!("argument {position}: {err}"));
                // Keep positions stable for the arguments that follow.
                self.values.push(Value::Null);
            }
        }
    }

    /// Number of arguments pushed so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the encoded arguments, or the first encoding failure.
    pub fn values(&self) -> Result<&[Value]> {
        match &self.failure {
            Some(reason) => Err(BehaviorError::Serialization(reason.clone())),
            None => Ok(&self.values),
        }
    }
}

/// Builds a [`CallArguments`] from a list of expressions.
///
/// ```
/// use interpose_core::call_args;
///
/// let args = call_args!("AAPL", 3_u32);
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! call_args {
    () => {
        $crate::keys::CallArguments::new()
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::keys::CallArguments::new()$(.with(&$arg))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use std::collections::HashMap;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("socket handles cannot be encoded"))
        }
    }

    #[test]
    fn test_push_keeps_order() {
        let args = CallArguments::new().with(&1).with("two").with(&3.5);
        let values = args.values().unwrap();
        assert_eq!(values[0], serde_json::json!(1));
        assert_eq!(values[1], serde_json::json!("two"));
        assert_eq!(values[2], serde_json::json!(3.5));
    }

    #[test]
    fn test_empty_arguments() {
        let args = CallArguments::new();
        assert!(args.is_empty());
        assert!(args.values().unwrap().is_empty());
    }

    #[test]
    fn test_unencodable_argument_is_reported() {
        let args = CallArguments::new().with(&1).with(&Unencodable).with(&2);

        assert_eq!(args.len(), 3);
        let err = args.values().unwrap_err();
        match err {
            BehaviorError::Serialization(reason) => {
                assert!(reason.starts_with("argument 1:"));
                assert!(reason.contains("socket handles"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_string_map_keys_fail() {
        let mut map = HashMap::new();
        map.insert((1_u8, 2_u8), "pair");

        let args = CallArguments::new().with(&map);
        assert!(matches!(
            args.values(),
            Err(BehaviorError::Serialization(_))
        ));
    }

    #[test]
    fn test_call_args_macro() {
        let symbol = String::from("AAPL");
        let args = call_args!(symbol, 7_u64, true);
        assert_eq!(args, CallArguments::new().with(&symbol).with(&7_u64).with(&true));
        assert!(call_args!().is_empty());
    }
}

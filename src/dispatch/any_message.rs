use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Downcast failed: expected = {expected}, actual = {actual}")]
pub struct DowncastAnyMessageError {
  pub expected: &'static str,
  pub actual: &'static str,
}

/// Type-erased message payload.
///
/// Payloads are shared, never mutated, so the wrapper clones by bumping the
/// `Arc` and `take` hands out a clone of the inner value.
#[derive(Clone)]
pub struct AnyMessage {
  msg: Arc<dyn Any + Send + Sync>,
  type_name: &'static str,
}

impl AnyMessage {
  pub fn new<T>(value: T) -> Self
  where
    T: Any + Send + Sync, {
    Self {
      msg: Arc::new(value),
      type_name: std::any::type_name::<T>(),
    }
  }

  pub fn type_name(&self) -> &'static str {
    self.type_name
  }

  pub fn is<T>(&self) -> bool
  where
    T: Any, {
    self.msg.downcast_ref::<T>().is_some()
  }

  pub fn take<T>(&self) -> Result<T, DowncastAnyMessageError>
  where
    T: Any + Clone, {
    self.msg.downcast_ref::<T>().cloned().ok_or(DowncastAnyMessageError {
      expected: std::any::type_name::<T>(),
      actual: self.type_name,
    })
  }
}

impl Debug for AnyMessage {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "AnyMessage({})", self.type_name)
  }
}

impl PartialEq for AnyMessage {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.msg, &other.msg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_take_typed() {
    let msg = AnyMessage::new("hello".to_string());
    assert!(msg.is::<String>());
    assert!(!msg.is::<u32>());
    assert_eq!(msg.take::<String>().unwrap(), "hello".to_string());
  }

  #[test]
  fn test_take_wrong_type() {
    let msg = AnyMessage::new(42_u32);
    let err = msg.take::<String>().unwrap_err();
    assert_eq!(err.actual, std::any::type_name::<u32>());
  }

  #[test]
  fn test_clone_is_same_payload() {
    let msg = AnyMessage::new(7_i64);
    let cloned = msg.clone();
    assert_eq!(msg, cloned);
    assert_eq!(cloned.take::<i64>().unwrap(), 7);
  }
}

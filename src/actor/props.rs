use std::fmt::Debug;
use std::sync::Arc;

use crate::actor::{Actor, ActorResult};

/// Factory for actor instances; invoked at start and on every restart that
/// does not go through `fresh_instance`.
pub trait Props: Debug + Send + Sync {
  fn new_actor(&self) -> ActorResult<Box<dyn Actor>>;
}

pub struct FunctionProps {
  actor_f: Arc<dyn Fn() -> ActorResult<Box<dyn Actor>> + Send + Sync>,
}

impl Clone for FunctionProps {
  fn clone(&self) -> Self {
    Self {
      actor_f: self.actor_f.clone(),
    }
  }
}

impl Debug for FunctionProps {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FunctionProps").finish()
  }
}

impl FunctionProps {
  pub fn new<F>(actor_f: F) -> Self
  where
    F: Fn() -> ActorResult<Box<dyn Actor>> + Send + Sync + 'static, {
    Self {
      actor_f: Arc::new(actor_f),
    }
  }
}

impl Props for FunctionProps {
  fn new_actor(&self) -> ActorResult<Box<dyn Actor>> {
    (*self.actor_f)()
  }
}

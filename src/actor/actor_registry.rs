use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::actor::actor_ref::local_actor_ref::LocalActorRef;
use crate::actor::actor_ref::ActorRef;

static GLOBAL_REGISTRY: Lazy<ActorRegistry> = Lazy::new(ActorRegistry::new);

/// Process-wide directory of live references, addressable by display id and
/// by uuid. References register themselves on start and unregister on stop.
///
/// Tests construct their own instances; production code goes through
/// `ActorRegistry::global()`.
#[derive(Debug, Clone)]
pub struct ActorRegistry {
  actors_by_id: Arc<DashMap<String, LocalActorRef>>,
  actors_by_uuid: Arc<DashMap<String, LocalActorRef>>,
}

impl ActorRegistry {
  pub fn new() -> Self {
    Self {
      actors_by_id: Arc::new(DashMap::new()),
      actors_by_uuid: Arc::new(DashMap::new()),
    }
  }

  pub fn global() -> &'static ActorRegistry {
    &GLOBAL_REGISTRY
  }

  pub fn register(&self, actor_ref: &LocalActorRef) {
    self.actors_by_id.insert(actor_ref.id(), actor_ref.clone());
    self.actors_by_uuid.insert(actor_ref.uuid().to_string(), actor_ref.clone());
  }

  pub fn unregister(&self, actor_ref: &LocalActorRef) {
    let matches_uuid = self
      .actors_by_id
      .get(&actor_ref.id())
      .map(|entry| entry.uuid() == actor_ref.uuid())
      .unwrap_or(false);
    if matches_uuid {
      self.actors_by_id.remove(&actor_ref.id());
    }
    self.actors_by_uuid.remove(&actor_ref.uuid().to_string());
  }

  pub fn lookup(&self, id: &str) -> Option<ActorRef> {
    self
      .actors_by_id
      .get(id)
      .map(|entry| ActorRef::of_local(entry.value().clone()))
  }

  pub fn lookup_by_uuid(&self, uuid: &str) -> Option<ActorRef> {
    self
      .actors_by_uuid
      .get(uuid)
      .map(|entry| ActorRef::of_local(entry.value().clone()))
  }

  /// Diagnostic enumeration of every registered reference.
  pub fn actors(&self) -> Vec<ActorRef> {
    self
      .actors_by_uuid
      .iter()
      .map(|entry| ActorRef::of_local(entry.value().clone()))
      .collect()
  }

  pub fn len(&self) -> usize {
    self.actors_by_uuid.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actors_by_uuid.is_empty()
  }

  pub fn clear(&self) {
    self.actors_by_id.clear();
    self.actors_by_uuid.clear();
  }
}

impl Default for ActorRegistry {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::actor::actor_context::ActorContext;
  use crate::actor::props::FunctionProps;
  use crate::actor::{Actor, ActorResult};
  use crate::dispatch::any_message::AnyMessage;
  use std::sync::Arc;

  #[derive(Debug)]
  struct NullActor;

  impl Actor for NullActor {
    fn receive(&mut self, _ctx: ActorContext, _msg: AnyMessage) -> ActorResult<()> {
      Ok(())
    }
  }

  fn null_props() -> Arc<dyn crate::actor::props::Props> {
    Arc::new(FunctionProps::new(|| Ok(Box::new(NullActor))))
  }

  #[test]
  fn test_register_lookup_unregister() {
    let registry = ActorRegistry::new();
    let actor_ref = LocalActorRef::new("registry-test", null_props());
    registry.register(&actor_ref);
    assert_eq!(registry.len(), 1);
    let found = registry.lookup("registry-test").unwrap();
    assert_eq!(found.uuid(), Some(actor_ref.uuid()));
    let by_uuid = registry.lookup_by_uuid(&actor_ref.uuid().to_string()).unwrap();
    assert_eq!(by_uuid.uuid(), Some(actor_ref.uuid()));
    registry.unregister(&actor_ref);
    assert!(registry.lookup("registry-test").is_none());
    assert!(registry.is_empty());
  }

  #[test]
  fn test_reregistered_id_points_at_the_newcomer() {
    let registry = ActorRegistry::new();
    let first = LocalActorRef::new("same-id", null_props());
    let second = LocalActorRef::new("same-id", null_props());
    registry.register(&first);
    registry.register(&second);
    assert_eq!(registry.lookup("same-id").unwrap().uuid(), Some(second.uuid()));
    // The displaced reference no longer owns the id entry.
    registry.unregister(&first);
    assert_eq!(registry.lookup("same-id").unwrap().uuid(), Some(second.uuid()));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn test_enumeration() {
    let registry = ActorRegistry::new();
    let a = LocalActorRef::new("enum-a", null_props());
    let b = LocalActorRef::new("enum-b", null_props());
    registry.register(&a);
    registry.register(&b);
    let actors = registry.actors();
    assert_eq!(actors.len(), 2);
    registry.clear();
    assert!(registry.is_empty());
  }
}

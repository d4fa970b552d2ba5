use std::time::Duration;

use crate::actor::actor_ref::ActorRef;
use crate::actor::ActorError;

/// Control messages exchanged between a supervisor and its linked children.
///
/// System messages ride the ordinary mailbox as `MessagePayload::System`
/// envelopes, so they stay ordered with user messages. `ChildFailed` and
/// `ChildStopped` are consumed by the supervision engine of the receiving
/// reference; `MaxRestartsExceeded` and `ReceiveTimeout` surface to the
/// actor through `Actor::system_receive`.
#[derive(Debug, Clone)]
pub enum SystemMessage {
  ChildFailed {
    child: ActorRef,
    reason: ActorError,
  },
  ChildStopped {
    child: ActorRef,
  },
  MaxRestartsExceeded {
    child: ActorRef,
    max_retries: Option<u32>,
    within_time_range: Option<Duration>,
    reason: ActorError,
  },
  ReceiveTimeout,
}

impl SystemMessage {
  pub fn of_child_failed(child: ActorRef, reason: ActorError) -> Self {
    SystemMessage::ChildFailed { child, reason }
  }

  pub fn of_child_stopped(child: ActorRef) -> Self {
    SystemMessage::ChildStopped { child }
  }

  pub fn of_max_restarts_exceeded(
    child: ActorRef,
    max_retries: Option<u32>,
    within_time_range: Option<Duration>,
    reason: ActorError,
  ) -> Self {
    SystemMessage::MaxRestartsExceeded {
      child,
      max_retries,
      within_time_range,
      reason,
    }
  }

  pub fn of_receive_timeout() -> Self {
    SystemMessage::ReceiveTimeout
  }
}

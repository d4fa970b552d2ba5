pub mod local_actor_ref;

use std::time::Duration;

use num_enum::TryFromPrimitive;
use ulid_generator_rs::ULID;

use crate::actor::actor_ref::local_actor_ref::LocalActorRef;
use crate::actor::ActorResult;
use crate::dispatch::any_message::AnyMessage;
use crate::dispatch::envelope::ReplyChannel;
use crate::dispatch::future::ReplyFuture;

pub const NO_SENDER_ID: &str = "no-sender";

/// Lifecycle of a reference. Monotonic except for the
/// `Running`/`BeingRestarted` alternation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum ActorStatus {
  Unstarted = 0,
  Running = 1,
  BeingRestarted = 2,
  Shutdown = 3,
}

/// The reference contract. `LocalActorRef` is the in-process
/// implementation; a remote transport implements the same contract and
/// fails the operations it cannot carry with `NotSupportedRemotely`.
pub trait ActorRefBehavior {
  fn uuid(&self) -> ULID;
  fn id(&self) -> String;
  fn status(&self) -> ActorStatus;
  fn start(&self) -> ActorResult<()>;
  fn stop(&self);
  fn tell(&self, msg: AnyMessage) -> ActorResult<()>;
  fn tell_with_reply(&self, msg: AnyMessage, reply: ReplyChannel) -> ActorResult<()>;
  fn ask(&self, msg: AnyMessage) -> ActorResult<ReplyFuture>;
  fn ask_with_timeout(&self, msg: AnyMessage, timeout: Duration) -> ActorResult<ReplyFuture>;
  fn link(&self, child: &ActorRef) -> ActorResult<()>;
  fn unlink(&self, child: &ActorRef) -> ActorResult<()>;
  fn start_link(&self, child: &ActorRef) -> ActorResult<()>;
}

#[derive(Debug, Clone)]
pub enum ActorRef {
  NoSender,
  Local(LocalActorRef),
}

impl PartialEq for ActorRef {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (ActorRef::NoSender, ActorRef::NoSender) => true,
      (ActorRef::Local(l), ActorRef::Local(r)) => l == r,
      _ => false,
    }
  }
}

impl ActorRef {
  pub fn of_no_sender() -> Self {
    ActorRef::NoSender
  }

  pub fn of_local(local_ref: LocalActorRef) -> Self {
    ActorRef::Local(local_ref)
  }

  pub fn as_local(&self) -> Option<&LocalActorRef> {
    match self {
      ActorRef::Local(local_ref) => Some(local_ref),
      _ => None,
    }
  }

  pub fn uuid(&self) -> Option<ULID> {
    match self {
      ActorRef::NoSender => None,
      ActorRef::Local(local_ref) => Some(local_ref.uuid()),
    }
  }

  pub fn id(&self) -> String {
    match self {
      ActorRef::NoSender => NO_SENDER_ID.to_string(),
      ActorRef::Local(local_ref) => local_ref.id(),
    }
  }

  pub fn status(&self) -> ActorStatus {
    match self {
      ActorRef::NoSender => ActorStatus::Shutdown,
      ActorRef::Local(local_ref) => local_ref.status(),
    }
  }

  pub fn start(&self) -> ActorResult<()> {
    match self {
      ActorRef::NoSender => Err(crate::actor::ActorError::AlreadyShutdown {
        id: NO_SENDER_ID.to_string(),
      }),
      ActorRef::Local(local_ref) => local_ref.start(),
    }
  }

  pub fn stop(&self) {
    if let ActorRef::Local(local_ref) = self {
      local_ref.stop();
    }
  }

  pub fn tell(&self, msg: AnyMessage) -> ActorResult<()> {
    self.tell_with_reply(msg, ReplyChannel::None)
  }

  pub fn tell_with_reply(&self, msg: AnyMessage, reply: ReplyChannel) -> ActorResult<()> {
    match self {
      ActorRef::NoSender => {
        log::debug!("dropping {:?}: sent to NoSender", msg);
        Ok(())
      }
      ActorRef::Local(local_ref) => local_ref.tell_with_reply(msg, reply),
    }
  }

  pub fn ask(&self, msg: AnyMessage) -> ActorResult<ReplyFuture> {
    match self {
      ActorRef::NoSender => Err(crate::actor::ActorError::NotStarted {
        id: NO_SENDER_ID.to_string(),
      }),
      ActorRef::Local(local_ref) => local_ref.ask(msg),
    }
  }

  pub fn ask_with_timeout(&self, msg: AnyMessage, timeout: Duration) -> ActorResult<ReplyFuture> {
    match self {
      ActorRef::NoSender => Err(crate::actor::ActorError::NotStarted {
        id: NO_SENDER_ID.to_string(),
      }),
      ActorRef::Local(local_ref) => local_ref.ask_with_timeout(msg, timeout),
    }
  }

  pub fn link(&self, child: &ActorRef) -> ActorResult<()> {
    match self {
      ActorRef::NoSender => Err(crate::actor::ActorError::NotStarted {
        id: NO_SENDER_ID.to_string(),
      }),
      ActorRef::Local(local_ref) => local_ref.link(child),
    }
  }

  pub fn unlink(&self, child: &ActorRef) -> ActorResult<()> {
    match self {
      ActorRef::NoSender => Err(crate::actor::ActorError::NotStarted {
        id: NO_SENDER_ID.to_string(),
      }),
      ActorRef::Local(local_ref) => local_ref.unlink(child),
    }
  }

  pub fn start_link(&self, child: &ActorRef) -> ActorResult<()> {
    match self {
      ActorRef::NoSender => Err(crate::actor::ActorError::NotStarted {
        id: NO_SENDER_ID.to_string(),
      }),
      ActorRef::Local(local_ref) => local_ref.start_link(child),
    }
  }
}

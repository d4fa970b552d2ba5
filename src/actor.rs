pub mod actor_context;
pub mod actor_ref;
pub mod actor_registry;
pub mod props;
pub mod supervision;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::actor::actor_context::ActorContext;
use crate::dispatch::any_message::AnyMessage;
use crate::dispatch::system_message::SystemMessage;

pub type ActorResult<A> = Result<A, ActorError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActorError {
  #[error("Actor failed: {message}")]
  ActorFailed { message: String },
  #[error("Actor is not started: {id}")]
  NotStarted { id: String },
  #[error("Actor is already shut down: {id}")]
  AlreadyShutdown { id: String },
  #[error("Actor {child} already has a supervisor")]
  AlreadySupervised { child: String },
  #[error("Actor {child} is not linked to {parent}")]
  NotLinked { child: String, parent: String },
  #[error("Ask timed out after {timeout:?}")]
  TimedOut { timeout: Duration },
  #[error("Actor stopped while a reply was pending")]
  ActorStopped,
  #[error("Mailbox append failed: {reason}")]
  MailboxAppendFailed { reason: String },
  #[error("Actor initialization failed: {message}")]
  InitializationFailed { message: String },
  #[error("Maximum number of restarts ({max_retries:?}) within {within_time_range:?} exceeded")]
  MaxRestartsExceeded {
    max_retries: Option<u32>,
    within_time_range: Option<Duration>,
  },
  #[error("Operation {operation} is not supported on a remote reference")]
  NotSupportedRemotely { operation: String },
  #[error("No reply channel available for the current message")]
  NoReplyChannel,
}

/// The classification used by fault-handling strategies to decide whether a
/// failure is trapped. `Any` traps every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
  Any,
  ActorFailed,
  NotStarted,
  AlreadyShutdown,
  AlreadySupervised,
  NotLinked,
  TimedOut,
  ActorStopped,
  MailboxAppendFailed,
  InitializationFailed,
  MaxRestartsExceeded,
  NotSupportedRemotely,
  NoReplyChannel,
}

impl ActorError {
  pub fn kind(&self) -> FaultKind {
    match self {
      ActorError::ActorFailed { .. } => FaultKind::ActorFailed,
      ActorError::NotStarted { .. } => FaultKind::NotStarted,
      ActorError::AlreadyShutdown { .. } => FaultKind::AlreadyShutdown,
      ActorError::AlreadySupervised { .. } => FaultKind::AlreadySupervised,
      ActorError::NotLinked { .. } => FaultKind::NotLinked,
      ActorError::TimedOut { .. } => FaultKind::TimedOut,
      ActorError::ActorStopped => FaultKind::ActorStopped,
      ActorError::MailboxAppendFailed { .. } => FaultKind::MailboxAppendFailed,
      ActorError::InitializationFailed { .. } => FaultKind::InitializationFailed,
      ActorError::MaxRestartsExceeded { .. } => FaultKind::MaxRestartsExceeded,
      ActorError::NotSupportedRemotely { .. } => FaultKind::NotSupportedRemotely,
      ActorError::NoReplyChannel => FaultKind::NoReplyChannel,
    }
  }

  pub fn of_actor_failed(message: &str) -> Self {
    ActorError::ActorFailed {
      message: message.to_string(),
    }
  }
}

/// A hotswapped behavior. The stack holds immutable closures; the base
/// behavior at the bottom is the actor instance itself and is never popped.
pub type HotswapBehavior = Arc<dyn Fn(ActorContext, AnyMessage) -> ActorResult<()> + Send + Sync>;

/// User-provided behavior plus lifecycle hooks.
///
/// A failure is an `Err` return from `receive`; it suspends the mailbox and
/// hands the decision to the supervisor (or the lifecycle policy when the
/// actor is unsupervised).
pub trait Actor: Debug + Send {
  fn receive(&mut self, ctx: ActorContext, msg: AnyMessage) -> ActorResult<()>;

  /// Delivery point for the system messages user code may care about
  /// (`ReceiveTimeout`, `MaxRestartsExceeded`).
  fn system_receive(&mut self, _ctx: ActorContext, msg: &SystemMessage) -> ActorResult<()> {
    log::debug!("unhandled system message: {:?}", msg);
    Ok(())
  }

  fn pre_start(&mut self, _ctx: ActorContext) -> ActorResult<()> {
    Ok(())
  }

  fn post_stop(&mut self, _ctx: ActorContext) -> ActorResult<()> {
    Ok(())
  }

  fn pre_restart(
    &mut self,
    _ctx: ActorContext,
    _reason: &ActorError,
    _last_message: Option<&AnyMessage>,
  ) -> ActorResult<()> {
    Ok(())
  }

  fn post_restart(&mut self, _ctx: ActorContext, _reason: &ActorError) -> ActorResult<()> {
    Ok(())
  }

  /// Replacement instance for the restart protocol. `None` means "build a
  /// new one through the factory".
  fn fresh_instance(&mut self) -> Option<Box<dyn Actor>> {
    None
  }
}

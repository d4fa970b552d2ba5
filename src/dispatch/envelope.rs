use std::fmt::{Debug, Formatter};

use crate::actor::actor_ref::ActorRef;
use crate::actor::ActorError;
use crate::dispatch::any_message::AnyMessage;
use crate::dispatch::future::ReplySink;
use crate::dispatch::system_message::SystemMessage;

#[derive(Debug, Clone)]
pub enum MessagePayload {
  User(AnyMessage),
  System(SystemMessage),
}

/// Where a reply to the enclosed message should go.
#[derive(Clone)]
pub enum ReplyChannel {
  None,
  Ref(ActorRef),
  Future(ReplySink),
}

impl ReplyChannel {
  pub fn is_none(&self) -> bool {
    matches!(self, ReplyChannel::None)
  }
}

impl Debug for ReplyChannel {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ReplyChannel::None => write!(f, "ReplyChannel::None"),
      ReplyChannel::Ref(actor_ref) => write!(f, "ReplyChannel::Ref({:?})", actor_ref),
      ReplyChannel::Future(sink) => write!(f, "ReplyChannel::Future({:?})", sink),
    }
  }
}

/// One message in flight: destination, payload and reply channel.
/// Immutable once created.
#[derive(Debug, Clone)]
pub struct Envelope {
  receiver: ActorRef,
  message: MessagePayload,
  reply: ReplyChannel,
}

impl Envelope {
  pub fn of_user(receiver: ActorRef, message: AnyMessage, reply: ReplyChannel) -> Self {
    Self {
      receiver,
      message: MessagePayload::User(message),
      reply,
    }
  }

  pub fn of_system(receiver: ActorRef, message: SystemMessage) -> Self {
    Self {
      receiver,
      message: MessagePayload::System(message),
      reply: ReplyChannel::None,
    }
  }

  pub fn receiver(&self) -> &ActorRef {
    &self.receiver
  }

  pub fn message(&self) -> &MessagePayload {
    &self.message
  }

  pub fn user_message(&self) -> Option<&AnyMessage> {
    match &self.message {
      MessagePayload::User(msg) => Some(msg),
      MessagePayload::System(_) => None,
    }
  }

  pub fn reply_channel(&self) -> &ReplyChannel {
    &self.reply
  }

  /// Faults a pending ask so the asker does not wait out its deadline.
  /// No-op for the other reply channel kinds.
  pub(crate) fn fault_reply(&self, reason: ActorError) {
    if let ReplyChannel::Future(sink) = &self.reply {
      sink.fail(reason);
    }
  }
}

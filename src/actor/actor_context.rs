use crate::actor::actor_ref::local_actor_ref::LocalActorRef;
use crate::actor::actor_ref::ActorRef;
use crate::actor::{ActorError, ActorResult, HotswapBehavior};
use crate::dispatch::any_message::AnyMessage;
use crate::dispatch::envelope::ReplyChannel;

/// What a behavior sees while handling one message: its own reference and
/// the reply channel of the envelope being processed.
#[derive(Debug, Clone)]
pub struct ActorContext {
  self_ref: LocalActorRef,
  reply: ReplyChannel,
}

impl ActorContext {
  pub(crate) fn new(self_ref: LocalActorRef, reply: ReplyChannel) -> Self {
    Self { self_ref, reply }
  }

  pub fn self_ref(&self) -> ActorRef {
    ActorRef::of_local(self.self_ref.clone())
  }

  /// The sender reference, when the current message carried one.
  pub fn sender(&self) -> Option<ActorRef> {
    match &self.reply {
      ReplyChannel::Ref(actor_ref) => Some(actor_ref.clone()),
      _ => None,
    }
  }

  pub fn reply_channel(&self) -> &ReplyChannel {
    &self.reply
  }

  /// Answers the current message. Fails with `NoReplyChannel` when the
  /// message was fire-and-forget.
  pub fn reply(&self, msg: AnyMessage) -> ActorResult<()> {
    match &self.reply {
      ReplyChannel::Future(sink) => {
        sink.complete(msg);
        Ok(())
      }
      ReplyChannel::Ref(actor_ref) => actor_ref.tell_with_reply(msg, ReplyChannel::Ref(self.self_ref())),
      ReplyChannel::None => Err(ActorError::NoReplyChannel),
    }
  }

  pub fn try_reply(&self, msg: AnyMessage) -> bool {
    self.reply(msg).is_ok()
  }

  /// Sends to `target` keeping the current message's reply channel, so the
  /// eventual answer goes to the original asker.
  pub fn forward(&self, target: &ActorRef, msg: AnyMessage) -> ActorResult<()> {
    target.tell_with_reply(msg, self.reply.clone())
  }

  pub fn become_receive<F>(&self, f: F)
  where
    F: Fn(ActorContext, AnyMessage) -> ActorResult<()> + Send + Sync + 'static, {
    self.self_ref.become_receive(std::sync::Arc::new(f) as HotswapBehavior)
  }

  pub fn unbecome(&self) {
    self.self_ref.unbecome()
  }

  pub fn link(&self, child: &ActorRef) -> ActorResult<()> {
    self.self_ref.link(child)
  }

  pub fn unlink(&self, child: &ActorRef) -> ActorResult<()> {
    self.self_ref.unlink(child)
  }

  pub fn stop_self(&self) {
    self.self_ref.stop();
  }
}

use std::fmt::{Debug, Formatter};
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender, TryRecvError};

use crate::actor::ActorError;
use crate::dispatch::envelope::Envelope;

pub type MessageQueueSize = usize;

/// The queue behind a mailbox.
///
/// The two built-in implementations cover the in-memory cases; a durable
/// mailbox supplies its own implementation of this contract and the rest of
/// the runtime cannot tell the difference.
pub trait MessageQueueBehavior: Debug + Send + Sync {
  fn enqueue(&self, handle: Envelope) -> Result<(), ActorError>;
  fn dequeue(&self) -> Result<Option<Envelope>>;
  fn number_of_messages(&self) -> MessageQueueSize;

  fn has_messages(&self) -> bool {
    self.number_of_messages() > 0
  }
}

pub struct UnboundedMessageQueue {
  tx: Sender<Envelope>,
  rx: Receiver<Envelope>,
}

impl UnboundedMessageQueue {
  pub fn new() -> Self {
    let (tx, rx) = unbounded();
    Self { tx, rx }
  }
}

impl MessageQueueBehavior for UnboundedMessageQueue {
  fn enqueue(&self, handle: Envelope) -> Result<(), ActorError> {
    self.tx.send(handle).map_err(|e| ActorError::MailboxAppendFailed {
      reason: e.to_string(),
    })
  }

  fn dequeue(&self) -> Result<Option<Envelope>> {
    match self.rx.try_recv() {
      Ok(envelope) => Ok(Some(envelope)),
      Err(TryRecvError::Empty) => Ok(None),
      Err(TryRecvError::Disconnected) => Err(anyhow::anyhow!("message queue disconnected")),
    }
  }

  fn number_of_messages(&self) -> MessageQueueSize {
    self.rx.len()
  }
}

impl Debug for UnboundedMessageQueue {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "UnboundedMessageQueue(len = {})", self.rx.len())
  }
}

pub struct BoundedMessageQueue {
  tx: Sender<Envelope>,
  rx: Receiver<Envelope>,
  push_timeout: Duration,
}

impl BoundedMessageQueue {
  pub fn new(capacity: usize, push_timeout: Duration) -> Self {
    let (tx, rx) = bounded(capacity);
    Self { tx, rx, push_timeout }
  }

  pub fn push_timeout(&self) -> Duration {
    self.push_timeout
  }
}

impl MessageQueueBehavior for BoundedMessageQueue {
  fn enqueue(&self, handle: Envelope) -> Result<(), ActorError> {
    match self.tx.send_timeout(handle, self.push_timeout) {
      Ok(()) => Ok(()),
      Err(SendTimeoutError::Timeout(_)) => Err(ActorError::MailboxAppendFailed {
        reason: format!("push timed out after {:?}", self.push_timeout),
      }),
      Err(SendTimeoutError::Disconnected(_)) => Err(ActorError::MailboxAppendFailed {
        reason: "message queue disconnected".to_string(),
      }),
    }
  }

  fn dequeue(&self) -> Result<Option<Envelope>> {
    match self.rx.try_recv() {
      Ok(envelope) => Ok(Some(envelope)),
      Err(TryRecvError::Empty) => Ok(None),
      Err(TryRecvError::Disconnected) => Err(anyhow::anyhow!("message queue disconnected")),
    }
  }

  fn number_of_messages(&self) -> MessageQueueSize {
    self.rx.len()
  }
}

impl Debug for BoundedMessageQueue {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "BoundedMessageQueue(len = {}, capacity = {:?}, push_timeout = {:?})",
      self.rx.len(),
      self.tx.capacity(),
      self.push_timeout
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::actor::actor_ref::ActorRef;
  use crate::dispatch::any_message::AnyMessage;
  use crate::dispatch::envelope::ReplyChannel;
  use std::time::Instant;

  fn envelope_of(n: i64) -> Envelope {
    Envelope::of_user(ActorRef::of_no_sender(), AnyMessage::new(n), ReplyChannel::None)
  }

  #[test]
  fn test_unbounded_fifo() {
    let queue = UnboundedMessageQueue::new();
    for n in 0..10 {
      queue.enqueue(envelope_of(n)).unwrap();
    }
    assert_eq!(queue.number_of_messages(), 10);
    for n in 0..10 {
      let envelope = queue.dequeue().unwrap().unwrap();
      assert_eq!(envelope.user_message().unwrap().take::<i64>().unwrap(), n);
    }
    assert!(queue.dequeue().unwrap().is_none());
    assert!(!queue.has_messages());
  }

  #[test]
  fn test_bounded_push_timeout() {
    let push_timeout = Duration::from_millis(50);
    let queue = BoundedMessageQueue::new(2, push_timeout);
    queue.enqueue(envelope_of(1)).unwrap();
    queue.enqueue(envelope_of(2)).unwrap();
    let started = Instant::now();
    let err = queue.enqueue(envelope_of(3)).unwrap_err();
    assert!(started.elapsed() >= push_timeout);
    assert!(matches!(err, ActorError::MailboxAppendFailed { .. }));
    assert_eq!(queue.number_of_messages(), 2);
  }

  #[test]
  fn test_bounded_drains_in_order() {
    let queue = BoundedMessageQueue::new(3, Duration::from_millis(10));
    queue.enqueue(envelope_of(7)).unwrap();
    queue.enqueue(envelope_of(8)).unwrap();
    assert_eq!(
      queue.dequeue().unwrap().unwrap().user_message().unwrap().take::<i64>().unwrap(),
      7
    );
    assert_eq!(
      queue.dequeue().unwrap().unwrap().user_message().unwrap().take::<i64>().unwrap(),
      8
    );
  }
}

use std::time::Duration;

use crate::dispatch::message_queue::{BoundedMessageQueue, MessageQueueBehavior, UnboundedMessageQueue};

#[derive(Debug, Clone, PartialEq)]
pub enum MailboxType {
  Unbounded,
  Bounded { capacity: usize, push_timeout: Duration },
}

impl MailboxType {
  pub fn of_unbounded() -> Self {
    MailboxType::Unbounded
  }

  pub fn of_bounded(capacity: usize, push_timeout: Duration) -> Self {
    MailboxType::Bounded { capacity, push_timeout }
  }

  pub fn create_message_queue(&self) -> Box<dyn MessageQueueBehavior> {
    match self {
      MailboxType::Unbounded => Box::new(UnboundedMessageQueue::new()),
      MailboxType::Bounded { capacity, push_timeout } => {
        Box::new(BoundedMessageQueue::new(*capacity, *push_timeout))
      }
    }
  }
}

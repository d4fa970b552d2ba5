pub mod mailbox_status;
pub mod mailbox_type;

use std::cmp::max;
use std::convert::TryFrom;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::actor::actor_ref::local_actor_ref::LocalActorRef;
use crate::actor::ActorError;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::envelope::Envelope;
use crate::dispatch::mailbox::mailbox_status::MailboxStatus;
use crate::dispatch::mailbox::mailbox_type::MailboxType;
use crate::dispatch::message_queue::{MessageQueueBehavior, MessageQueueSize};

struct MailboxInner {
  mailbox_type: MailboxType,
  current_status: AtomicU32,
  message_queue: Box<dyn MessageQueueBehavior>,
}

/// A FIFO of envelopes bound to exactly one reference.
///
/// The status word carries the scheduling state: the `Scheduled` bit is the
/// mailbox lock, so at most one dispatcher worker drains this queue at a
/// time while producers enqueue concurrently through the message queue's
/// own synchronization.
#[derive(Clone)]
pub struct Mailbox {
  inner: Arc<MailboxInner>,
}

impl Debug for Mailbox {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "Mailbox(type = {:?}, status = {:?}, len = {})",
      self.inner.mailbox_type,
      self.get_status(),
      self.number_of_messages()
    )
  }
}

impl PartialEq for Mailbox {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Mailbox {
  pub fn new(mailbox_type: MailboxType) -> Self {
    let message_queue = mailbox_type.create_message_queue();
    Self::with_message_queue(mailbox_type, message_queue)
  }

  /// Entry point for alternative queue implementations (durable mailboxes).
  pub fn with_message_queue(mailbox_type: MailboxType, message_queue: Box<dyn MessageQueueBehavior>) -> Self {
    Self {
      inner: Arc::new(MailboxInner {
        mailbox_type,
        current_status: AtomicU32::new(MailboxStatus::Open as u32),
        message_queue,
      }),
    }
  }

  pub fn mailbox_type(&self) -> &MailboxType {
    &self.inner.mailbox_type
  }

  pub fn get_status(&self) -> MailboxStatus {
    let status = self.inner.current_status.load(Ordering::Acquire);
    MailboxStatus::try_from(status & MailboxStatus::ShouldScheduleMask as u32)
      .unwrap_or(MailboxStatus::Open)
  }

  fn update_status(&self, old: u32, new: u32) -> bool {
    self
      .inner
      .current_status
      .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  fn set_status(&self, value: u32) {
    self.inner.current_status.store(value, Ordering::Release);
  }

  pub fn should_process_message(&self) -> bool {
    let current_status = self.inner.current_status.load(Ordering::Acquire);
    (current_status & MailboxStatus::ShouldNotProcessMask as u32) == 0
  }

  pub fn is_suspended(&self) -> bool {
    let current_status = self.inner.current_status.load(Ordering::Acquire);
    (current_status & MailboxStatus::SuspendMask as u32) != 0
  }

  pub fn is_closed(&self) -> bool {
    let current_status = self.inner.current_status.load(Ordering::Acquire);
    current_status == MailboxStatus::Closed as u32
  }

  pub fn is_scheduled(&self) -> bool {
    let current_status = self.inner.current_status.load(Ordering::Acquire);
    (current_status & MailboxStatus::Scheduled as u32) != 0
  }

  pub fn suspend_count(&self) -> u32 {
    let current_status = self.inner.current_status.load(Ordering::Acquire);
    current_status / MailboxStatus::SuspendUnit as u32
  }

  pub fn can_be_scheduled(&self, has_message_hint: bool) -> bool {
    let current_status = self.inner.current_status.load(Ordering::Acquire);
    match current_status {
      cs if cs == MailboxStatus::Open as u32 || cs == MailboxStatus::Scheduled as u32 => {
        has_message_hint || self.has_messages()
      }
      _ => false,
    }
  }

  pub fn set_as_scheduled(&self) -> bool {
    loop {
      let s = self.inner.current_status.load(Ordering::Acquire);
      if (s & MailboxStatus::ShouldScheduleMask as u32) != MailboxStatus::Open as u32 {
        return false;
      }
      if self.update_status(s, s | MailboxStatus::Scheduled as u32) {
        return true;
      }
    }
  }

  pub fn set_as_idle(&self) -> bool {
    loop {
      let s = self.inner.current_status.load(Ordering::Acquire);
      if self.update_status(s, s & !(MailboxStatus::Scheduled as u32)) {
        return true;
      }
    }
  }

  /// Decrements the suspend counter. Returns true when the mailbox became
  /// runnable again.
  pub fn resume(&self) -> bool {
    loop {
      let s = self.inner.current_status.load(Ordering::Acquire);
      if s == MailboxStatus::Closed as u32 {
        self.set_status(MailboxStatus::Closed as u32);
        return false;
      }
      let next = if s < MailboxStatus::SuspendUnit as u32 {
        s
      } else {
        s - MailboxStatus::SuspendUnit as u32
      };
      if self.update_status(s, next) {
        return next < MailboxStatus::SuspendUnit as u32;
      }
    }
  }

  /// Increments the suspend counter. Returns true when this call was the
  /// transition from running to suspended.
  pub fn suspend(&self) -> bool {
    loop {
      let s = self.inner.current_status.load(Ordering::Acquire);
      if s == MailboxStatus::Closed as u32 {
        self.set_status(MailboxStatus::Closed as u32);
        return false;
      }
      if self.update_status(s, s + MailboxStatus::SuspendUnit as u32) {
        return s < MailboxStatus::SuspendUnit as u32;
      }
    }
  }

  pub fn become_closed(&self) -> bool {
    loop {
      let s = self.inner.current_status.load(Ordering::Acquire);
      if s == MailboxStatus::Closed as u32 {
        return false;
      }
      if self.update_status(s, MailboxStatus::Closed as u32) {
        return true;
      }
    }
  }

  pub fn enqueue(&self, envelope: Envelope) -> Result<(), ActorError> {
    if self.is_closed() {
      log::debug!("dropping {:?}: mailbox is closed", envelope);
      envelope.fault_reply(ActorError::ActorStopped);
      return Ok(());
    }
    self.inner.message_queue.enqueue(envelope)
  }

  pub fn dequeue(&self) -> anyhow::Result<Option<Envelope>> {
    self.inner.message_queue.dequeue()
  }

  pub fn number_of_messages(&self) -> MessageQueueSize {
    self.inner.message_queue.number_of_messages()
  }

  pub fn has_messages(&self) -> bool {
    self.inner.message_queue.has_messages()
  }

  /// Drains everything left in the queue, faulting pending asks so their
  /// callers do not wait out their deadlines.
  pub(crate) fn clean_up(&self, owner_id: &str) {
    let mut dropped = 0_usize;
    while let Ok(Some(envelope)) = self.dequeue() {
      envelope.fault_reply(ActorError::ActorStopped);
      dropped += 1;
    }
    if dropped > 0 {
      log::debug!("dropped {} messages from the mailbox of {}", dropped, owner_id);
    }
  }

  pub(crate) async fn execute(&self, actor_ref: LocalActorRef, dispatcher: Dispatcher) {
    if !self.is_closed() {
      self.process_mailbox(&actor_ref, dispatcher.throughput());
    }
    self.set_as_idle();
    dispatcher.register_for_execution(&actor_ref, false);
  }

  fn process_mailbox(&self, actor_ref: &LocalActorRef, throughput: usize) {
    let mut left = max(throughput, 1);
    while left > 0 {
      if !self.should_process_message() {
        break;
      }
      match self.dequeue() {
        Ok(Some(envelope)) => {
          actor_ref.invoke(envelope);
        }
        Ok(None) => break,
        Err(err) => {
          log::error!("dequeue failed for {}: {:?}", actor_ref.id(), err);
          break;
        }
      }
      left -= 1;
    }
  }
}

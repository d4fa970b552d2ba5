use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::actor::ActorError;
use crate::dispatch::any_message::AnyMessage;

pub type ReplyResult = Result<AnyMessage, ActorError>;

/// Creates the two ends of a single-use reply channel.
///
/// The sink travels inside an envelope; the future stays with the asker and
/// blocks on `await_result` with the given deadline.
pub fn reply_channel(timeout: Duration) -> (ReplySink, ReplyFuture) {
  let (tx, rx) = bounded(1);
  (
    ReplySink {
      tx,
      completed: Arc::new(AtomicBool::new(false)),
    },
    ReplyFuture { rx, timeout },
  )
}

/// The write end of a reply channel. Completion is one-shot: the first
/// `complete` or `fail` wins, later calls are discarded.
#[derive(Clone)]
pub struct ReplySink {
  tx: Sender<ReplyResult>,
  completed: Arc<AtomicBool>,
}

impl ReplySink {
  pub fn complete(&self, msg: AnyMessage) -> bool {
    self.complete_with(Ok(msg))
  }

  pub fn fail(&self, reason: ActorError) -> bool {
    self.complete_with(Err(reason))
  }

  pub fn is_completed(&self) -> bool {
    self.completed.load(Ordering::SeqCst)
  }

  fn complete_with(&self, result: ReplyResult) -> bool {
    if self.completed.swap(true, Ordering::SeqCst) {
      log::debug!("reply channel already completed, discarding {:?}", result);
      return false;
    }
    self.tx.try_send(result).is_ok()
  }
}

impl Debug for ReplySink {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "ReplySink(completed = {})", self.is_completed())
  }
}

/// The read end of a reply channel.
pub struct ReplyFuture {
  rx: Receiver<ReplyResult>,
  timeout: Duration,
}

impl ReplyFuture {
  /// Blocks until the reply arrives, the deadline expires (`TimedOut`) or
  /// every sink is gone without completing (`ActorStopped`).
  pub fn await_result(&self) -> ReplyResult {
    match self.rx.recv_timeout(self.timeout) {
      Ok(result) => result,
      Err(RecvTimeoutError::Timeout) => Err(ActorError::TimedOut { timeout: self.timeout }),
      Err(RecvTimeoutError::Disconnected) => Err(ActorError::ActorStopped),
    }
  }

  pub fn try_result(&self) -> Option<ReplyResult> {
    self.rx.try_recv().ok()
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }
}

impl Debug for ReplyFuture {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "ReplyFuture(timeout = {:?})", self.timeout)
  }
}

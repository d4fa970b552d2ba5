use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

use crate::actor::actor_ref::local_actor_ref::LocalActorRef;
use crate::actor::ActorError;
use crate::dispatch::envelope::Envelope;
use crate::dispatch::message_queue::MessageQueueSize;
use crate::settings::Settings;

static GLOBAL_DISPATCHER: Lazy<Dispatcher> = Lazy::new(|| Dispatcher::new("global"));

/// The scheduler contract: everything a reference needs from its
/// dispatcher. Implementations guarantee at most one concurrent execution
/// per attached reference.
pub trait DispatcherBehavior {
  fn attach(&self, actor_ref: &LocalActorRef);
  fn detach(&self, actor_ref: &LocalActorRef);
  fn dispatch(&self, envelope: Envelope) -> Result<(), ActorError>;
  fn suspend(&self, actor_ref: &LocalActorRef);
  fn resume(&self, actor_ref: &LocalActorRef);
  fn mailbox_is_empty(&self, actor_ref: &LocalActorRef) -> bool;
  fn mailbox_size(&self, actor_ref: &LocalActorRef) -> MessageQueueSize;
}

struct DispatcherInner {
  name: String,
  runtime: Runtime,
  throughput: usize,
  attached: AtomicUsize,
}

#[derive(Clone)]
pub struct Dispatcher {
  inner: Arc<DispatcherInner>,
}

impl Debug for Dispatcher {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "Dispatcher(name = {}, throughput = {}, attached = {})",
      self.inner.name,
      self.inner.throughput,
      self.attached_count()
    )
  }
}

impl PartialEq for Dispatcher {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Dispatcher {
  pub fn new(name: &str) -> Self {
    let settings = Settings::global();
    Self::new_with_throughput(name, settings.worker_threads, settings.throughput)
  }

  pub fn new_with_throughput(name: &str, worker_threads: usize, throughput: usize) -> Self {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .worker_threads(worker_threads.max(1))
      .thread_name(format!("arbiter-dispatcher-{}", name))
      .build()
      .unwrap();
    Self {
      inner: Arc::new(DispatcherInner {
        name: name.to_string(),
        runtime,
        throughput: throughput.max(1),
        attached: AtomicUsize::new(0),
      }),
    }
  }

  /// The process-wide default dispatcher. References use it unless
  /// `set_dispatcher` installed another one before start.
  pub fn global() -> Dispatcher {
    GLOBAL_DISPATCHER.clone()
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn throughput(&self) -> usize {
    self.inner.throughput
  }

  pub fn attached_count(&self) -> usize {
    self.inner.attached.load(Ordering::SeqCst)
  }

  pub fn is_idle(&self) -> bool {
    self.attached_count() == 0
  }

  /// Schedules a mailbox drain when the reference can run and this call won
  /// the `Scheduled` bit. Returns whether a worker was spawned.
  pub(crate) fn register_for_execution(&self, actor_ref: &LocalActorRef, has_message_hint: bool) -> bool {
    let mailbox = actor_ref.mailbox();
    if mailbox.can_be_scheduled(has_message_hint) && mailbox.set_as_scheduled() {
      let actor_ref = actor_ref.clone();
      let dispatcher = self.clone();
      self.inner.runtime.spawn(async move {
        let mailbox = actor_ref.mailbox();
        mailbox.execute(actor_ref, dispatcher).await;
      });
      true
    } else {
      false
    }
  }

  /// One-shot timer on the dispatcher's pool; used for receive timeouts.
  pub(crate) fn schedule_once<F>(&self, delay: Duration, f: F) -> JoinHandle<()>
  where
    F: FnOnce() + Send + 'static, {
    self.inner.runtime.spawn(async move {
      tokio::time::sleep(delay).await;
      f();
    })
  }
}

impl DispatcherBehavior for Dispatcher {
  fn attach(&self, actor_ref: &LocalActorRef) {
    self.inner.attached.fetch_add(1, Ordering::SeqCst);
    self.register_for_execution(actor_ref, false);
  }

  fn detach(&self, actor_ref: &LocalActorRef) {
    let remaining = self.inner.attached.fetch_sub(1, Ordering::SeqCst) - 1;
    log::debug!(
      "detached {} from {}, {} references remaining",
      actor_ref.id(),
      self.inner.name,
      remaining
    );
    if remaining == 0 {
      log::debug!("dispatcher {} is idle", self.inner.name);
    }
  }

  fn dispatch(&self, envelope: Envelope) -> Result<(), ActorError> {
    let receiver = envelope.receiver().clone();
    match receiver.as_local() {
      Some(local_ref) => {
        local_ref.mailbox().enqueue(envelope)?;
        self.register_for_execution(local_ref, true);
        Ok(())
      }
      None => {
        log::warn!("dropping {:?}: receiver is not a local reference", envelope);
        Ok(())
      }
    }
  }

  fn suspend(&self, actor_ref: &LocalActorRef) {
    actor_ref.mailbox().suspend();
  }

  fn resume(&self, actor_ref: &LocalActorRef) {
    actor_ref.mailbox().resume();
    self.register_for_execution(actor_ref, false);
  }

  fn mailbox_is_empty(&self, actor_ref: &LocalActorRef) -> bool {
    !actor_ref.mailbox().has_messages()
  }

  fn mailbox_size(&self, actor_ref: &LocalActorRef) -> MessageQueueSize {
    actor_ref.mailbox().number_of_messages()
  }
}

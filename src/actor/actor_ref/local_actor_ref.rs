use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use once_cell::sync::Lazy;
use std::convert::TryFrom;
use tokio::task::JoinHandle;
use ulid_generator_rs::{ULIDGenerator, ULID};

use crate::actor::actor_context::ActorContext;
use crate::actor::actor_ref::{ActorRef, ActorRefBehavior, ActorStatus};
use crate::actor::actor_registry::ActorRegistry;
use crate::actor::props::Props;
use crate::actor::supervision::{FaultHandlingStrategy, LifeCycle, RestartStats};
use crate::actor::{Actor, ActorError, ActorResult, HotswapBehavior};
use crate::dispatch::any_message::AnyMessage;
use crate::dispatch::dispatcher::{Dispatcher, DispatcherBehavior};
use crate::dispatch::envelope::{Envelope, MessagePayload, ReplyChannel};
use crate::dispatch::future::{reply_channel, ReplyFuture};
use crate::dispatch::mailbox::mailbox_type::MailboxType;
use crate::dispatch::mailbox::Mailbox;
use crate::dispatch::system_message::SystemMessage;
use crate::infrastructure::logging_mutex::LoggingMutex;
use crate::mutex_lock_with_log;
use crate::settings::Settings;

static ULID_GENERATOR: Lazy<Mutex<ULIDGenerator>> = Lazy::new(|| Mutex::new(ULIDGenerator::new()));

pub(crate) fn new_uuid() -> ULID {
  let mut generator = ULID_GENERATOR.lock().unwrap();
  generator.generate().unwrap()
}

struct RefState {
  dispatcher: Dispatcher,
  props: Arc<dyn Props>,
  actor: Option<Box<dyn Actor>>,
  hotswap: Vec<HotswapBehavior>,
  linked_children: HashMap<String, LocalActorRef>,
  supervisor: Option<WeakActorRef>,
  fault_handler: FaultHandlingStrategy,
  life_cycle: LifeCycle,
  restart_stats: RestartStats,
  current_message: Option<Envelope>,
  ask_timeout: Duration,
  receive_timeout: Option<Duration>,
  receive_timeout_handle: Option<JoinHandle<()>>,
}

impl Debug for RefState {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "RefState(life_cycle = {:?}, fault_handler = {:?}, linked_children = {}, hotswap_depth = {})",
      self.life_cycle,
      self.fault_handler,
      self.linked_children.len(),
      self.hotswap.len()
    )
  }
}

struct LocalActorRefInner {
  uuid: ULID,
  id: String,
  current_status: AtomicU32,
  mailbox: Mailbox,
  state: LoggingMutex<RefState>,
}

/// The in-process reference to one actor.
///
/// Clones share the same actor; equality is uuid equality. The reference
/// owns the mailbox and the actor-instance cell, and drives the restart
/// protocol when its supervisor asks for it.
#[derive(Clone)]
pub struct LocalActorRef {
  inner: Arc<LocalActorRefInner>,
}

impl Debug for LocalActorRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "LocalActorRef(id = {}, uuid = {}, status = {:?})",
      self.inner.id,
      self.inner.uuid,
      self.status()
    )
  }
}

impl PartialEq for LocalActorRef {
  fn eq(&self, other: &Self) -> bool {
    self.inner.uuid == other.inner.uuid
  }
}

impl Eq for LocalActorRef {}

impl Hash for LocalActorRef {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.inner.uuid.to_string().hash(state);
  }
}

/// Non-owning back-edge from a child to its supervisor. Children must not
/// keep their parent alive.
#[derive(Clone)]
pub struct WeakActorRef {
  inner: Weak<LocalActorRefInner>,
}

impl WeakActorRef {
  pub fn upgrade(&self) -> Option<LocalActorRef> {
    self.inner.upgrade().map(|inner| LocalActorRef { inner })
  }
}

impl Debug for WeakActorRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "WeakActorRef(alive = {})", self.inner.strong_count() > 0)
  }
}

impl LocalActorRef {
  pub fn new(id: &str, props: Arc<dyn Props>) -> Self {
    Self::new_with_mailbox_type(id, props, MailboxType::of_unbounded())
  }

  pub fn new_with_mailbox_type(id: &str, props: Arc<dyn Props>, mailbox_type: MailboxType) -> Self {
    let uuid = new_uuid();
    let mailbox = Mailbox::new(mailbox_type);
    // Held suspended until start() has installed the instance, so early
    // sends buffer instead of racing the startup.
    mailbox.suspend();
    Self {
      inner: Arc::new(LocalActorRefInner {
        uuid,
        id: id.to_string(),
        current_status: AtomicU32::new(ActorStatus::Unstarted as u32),
        mailbox,
        state: LoggingMutex::new(
          &format!("LocalActorRef#state: {}", id),
          RefState {
            dispatcher: Dispatcher::global(),
            props,
            actor: None,
            hotswap: Vec::new(),
            linked_children: HashMap::new(),
            supervisor: None,
            fault_handler: FaultHandlingStrategy::NoStrategy,
            life_cycle: LifeCycle::Undefined,
            restart_stats: RestartStats::new(),
            current_message: None,
            ask_timeout: Settings::global().default_ask_timeout,
            receive_timeout: None,
            receive_timeout_handle: None,
          },
        ),
      }),
    }
  }

  pub fn uuid(&self) -> ULID {
    self.inner.uuid.clone()
  }

  pub fn id(&self) -> String {
    self.inner.id.clone()
  }

  pub fn status(&self) -> ActorStatus {
    let status = self.inner.current_status.load(Ordering::SeqCst);
    ActorStatus::try_from(status).unwrap()
  }

  fn set_status(&self, status: ActorStatus) {
    self.inner.current_status.store(status as u32, Ordering::SeqCst);
  }

  fn compare_and_set_status(&self, old: ActorStatus, new: ActorStatus) -> bool {
    self
      .inner
      .current_status
      .compare_exchange(old as u32, new as u32, Ordering::SeqCst, Ordering::SeqCst)
      .is_ok()
  }

  pub fn is_running(&self) -> bool {
    matches!(self.status(), ActorStatus::Running | ActorStatus::BeingRestarted)
  }

  pub fn is_shutdown(&self) -> bool {
    self.status() == ActorStatus::Shutdown
  }

  pub fn mailbox(&self) -> Mailbox {
    self.inner.mailbox.clone()
  }

  pub fn dispatcher(&self) -> Dispatcher {
    let state = mutex_lock_with_log!(self.inner.state, "dispatcher");
    state.dispatcher.clone()
  }

  pub fn downgrade(&self) -> WeakActorRef {
    WeakActorRef {
      inner: Arc::downgrade(&self.inner),
    }
  }

  pub fn supervisor(&self) -> Option<ActorRef> {
    let state = mutex_lock_with_log!(self.inner.state, "supervisor");
    state
      .supervisor
      .as_ref()
      .and_then(|weak| weak.upgrade())
      .map(ActorRef::of_local)
  }

  pub fn linked_children(&self) -> Vec<ActorRef> {
    let state = mutex_lock_with_log!(self.inner.state, "linked_children");
    state.linked_children.values().cloned().map(ActorRef::of_local).collect()
  }

  fn linked_children_snapshot(&self) -> Vec<LocalActorRef> {
    let state = mutex_lock_with_log!(self.inner.state, "linked_children_snapshot");
    state.linked_children.values().cloned().collect()
  }

  fn supervisor_ref(&self) -> Option<LocalActorRef> {
    let state = mutex_lock_with_log!(self.inner.state, "supervisor_ref");
    state.supervisor.as_ref().and_then(|weak| weak.upgrade())
  }

  // --- configuration, effective before start ------------------------------

  /// Default deadline used by `ask`.
  pub fn set_timeout(&self, timeout: Duration) {
    let mut state = mutex_lock_with_log!(self.inner.state, "set_timeout");
    state.ask_timeout = timeout;
  }

  pub fn set_receive_timeout(&self, timeout: Duration) {
    {
      let mut state = mutex_lock_with_log!(self.inner.state, "set_receive_timeout");
      state.receive_timeout = Some(timeout);
    }
    if self.status() == ActorStatus::Running && !self.mailbox().has_messages() {
      self.schedule_receive_timeout();
    }
  }

  pub fn set_dispatcher(&self, dispatcher: Dispatcher) -> ActorResult<()> {
    if self.status() != ActorStatus::Unstarted {
      return Err(ActorError::ActorFailed {
        message: format!("the dispatcher of {} can only be set before start", self.id()),
      });
    }
    let mut state = mutex_lock_with_log!(self.inner.state, "set_dispatcher");
    state.dispatcher = dispatcher;
    Ok(())
  }

  pub fn set_fault_handler(&self, fault_handler: FaultHandlingStrategy) {
    let mut state = mutex_lock_with_log!(self.inner.state, "set_fault_handler");
    state.fault_handler = fault_handler;
  }

  pub fn set_life_cycle(&self, life_cycle: LifeCycle) {
    let mut state = mutex_lock_with_log!(self.inner.state, "set_life_cycle");
    state.life_cycle = life_cycle;
  }

  // --- lifecycle ----------------------------------------------------------

  pub fn start(&self) -> ActorResult<()> {
    match self.status() {
      ActorStatus::Shutdown => return Err(ActorError::AlreadyShutdown { id: self.id() }),
      ActorStatus::Running | ActorStatus::BeingRestarted => return Ok(()),
      ActorStatus::Unstarted => {}
    }
    if !self.compare_and_set_status(ActorStatus::Unstarted, ActorStatus::Running) {
      return match self.status() {
        ActorStatus::Shutdown => Err(ActorError::AlreadyShutdown { id: self.id() }),
        _ => Ok(()),
      };
    }
    let (dispatcher, props) = {
      let state = mutex_lock_with_log!(self.inner.state, "start");
      (state.dispatcher.clone(), state.props.clone())
    };
    let mut instance = match props.new_actor() {
      Ok(instance) => instance,
      Err(err) => {
        self.set_status(ActorStatus::Unstarted);
        return Err(ActorError::InitializationFailed {
          message: err.to_string(),
        });
      }
    };
    let ctx = ActorContext::new(self.clone(), ReplyChannel::None);
    if let Err(err) = instance.pre_start(ctx) {
      self.set_status(ActorStatus::Unstarted);
      return Err(ActorError::InitializationFailed {
        message: err.to_string(),
      });
    }
    {
      let mut state = mutex_lock_with_log!(self.inner.state, "start");
      state.actor = Some(instance);
    }
    ActorRegistry::global().register(self);
    dispatcher.attach(self);
    // Releases the construction-time suspension; buffered messages start
    // flowing only now that the instance is in place.
    dispatcher.resume(self);
    self.schedule_receive_timeout();
    Ok(())
  }

  pub fn stop(&self) {
    self.stop_internal(true)
  }

  fn stop_internal(&self, notify_supervisor: bool) {
    let previous = loop {
      let current = self.status();
      if current == ActorStatus::Shutdown {
        return;
      }
      if self.compare_and_set_status(current, ActorStatus::Shutdown) {
        break current;
      }
    };
    log::debug!("stopping {} (was {:?})", self.id(), previous);
    self.cancel_receive_timeout();
    let dispatcher = self.dispatcher();
    self.mailbox().become_closed();
    self.mailbox().clean_up(&self.inner.id);
    if previous != ActorStatus::Unstarted {
      let instance = {
        let mut state = mutex_lock_with_log!(self.inner.state, "stop_internal");
        state.actor.take()
      };
      match instance {
        Some(mut instance) => {
          let ctx = ActorContext::new(self.clone(), ReplyChannel::None);
          if let Err(err) = instance.post_stop(ctx) {
            log::warn!("post_stop of {} failed: {}", self.id(), err);
          }
        }
        None => log::warn!("stop: actor instance of {} is missing", self.id()),
      }
    }
    {
      let mut state = mutex_lock_with_log!(self.inner.state, "stop_internal");
      state.current_message = None;
      state.hotswap.clear();
    }
    let children: Vec<LocalActorRef> = {
      let mut state = mutex_lock_with_log!(self.inner.state, "stop_internal");
      state.linked_children.drain().map(|(_, child)| child).collect()
    };
    for child in children {
      child.clear_supervisor();
      child.stop();
    }
    let supervisor = {
      let mut state = mutex_lock_with_log!(self.inner.state, "stop_internal");
      state.supervisor.take()
    };
    if notify_supervisor {
      if let Some(supervisor) = supervisor.and_then(|weak| weak.upgrade()) {
        let notification = SystemMessage::of_child_stopped(ActorRef::of_local(self.clone()));
        if let Err(err) = supervisor.tell_system(notification) {
          log::warn!("failed to notify the supervisor of {}: {}", self.id(), err);
        }
      }
    }
    ActorRegistry::global().unregister(self);
    if previous != ActorStatus::Unstarted {
      dispatcher.detach(self);
    }
  }

  // --- sending ------------------------------------------------------------

  pub fn tell(&self, msg: AnyMessage) -> ActorResult<()> {
    self.tell_with_reply(msg, ReplyChannel::None)
  }

  pub fn tell_with_reply(&self, msg: AnyMessage, reply: ReplyChannel) -> ActorResult<()> {
    match self.status() {
      ActorStatus::Running | ActorStatus::BeingRestarted => {
        let envelope = Envelope::of_user(ActorRef::of_local(self.clone()), msg, reply);
        self.dispatcher().dispatch(envelope)
      }
      ActorStatus::Shutdown => {
        log::debug!("dropping {:?}: {} is shut down", msg, self.id());
        Ok(())
      }
      ActorStatus::Unstarted => Err(ActorError::NotStarted { id: self.id() }),
    }
  }

  pub(crate) fn tell_system(&self, msg: SystemMessage) -> ActorResult<()> {
    match self.status() {
      ActorStatus::Running | ActorStatus::BeingRestarted => {
        let envelope = Envelope::of_system(ActorRef::of_local(self.clone()), msg);
        self.dispatcher().dispatch(envelope)
      }
      ActorStatus::Shutdown => {
        log::debug!("dropping {:?}: {} is shut down", msg, self.id());
        Ok(())
      }
      ActorStatus::Unstarted => Err(ActorError::NotStarted { id: self.id() }),
    }
  }

  pub fn ask(&self, msg: AnyMessage) -> ActorResult<ReplyFuture> {
    let timeout = {
      let state = mutex_lock_with_log!(self.inner.state, "ask");
      state.ask_timeout
    };
    self.ask_with_timeout(msg, timeout)
  }

  pub fn ask_with_timeout(&self, msg: AnyMessage, timeout: Duration) -> ActorResult<ReplyFuture> {
    match self.status() {
      ActorStatus::Shutdown => Err(ActorError::ActorStopped),
      ActorStatus::Unstarted => Err(ActorError::NotStarted { id: self.id() }),
      ActorStatus::Running | ActorStatus::BeingRestarted => {
        let (sink, future) = reply_channel(timeout);
        let envelope = Envelope::of_user(ActorRef::of_local(self.clone()), msg, ReplyChannel::Future(sink));
        self.dispatcher().dispatch(envelope)?;
        Ok(future)
      }
    }
  }

  // --- linking ------------------------------------------------------------

  pub fn link(&self, child: &ActorRef) -> ActorResult<()> {
    let child_local = child.as_local().ok_or_else(|| ActorError::NotSupportedRemotely {
      operation: "link".to_string(),
    })?;
    child_local.install_supervisor(self.downgrade())?;
    let mut state = mutex_lock_with_log!(self.inner.state, "link");
    state
      .linked_children
      .insert(child_local.uuid().to_string(), child_local.clone());
    Ok(())
  }

  pub fn unlink(&self, child: &ActorRef) -> ActorResult<()> {
    let child_local = child.as_local().ok_or_else(|| ActorError::NotSupportedRemotely {
      operation: "unlink".to_string(),
    })?;
    let removed = {
      let mut state = mutex_lock_with_log!(self.inner.state, "unlink");
      state.linked_children.remove(&child_local.uuid().to_string())
    };
    match removed {
      None => Err(ActorError::NotLinked {
        child: child_local.id(),
        parent: self.id(),
      }),
      Some(removed_child) => {
        removed_child.clear_supervisor();
        Ok(())
      }
    }
  }

  pub fn start_link(&self, child: &ActorRef) -> ActorResult<()> {
    self.link(child)?;
    match child.start() {
      Ok(()) => Ok(()),
      Err(err) => {
        let _ = self.unlink(child);
        Err(err)
      }
    }
  }

  fn install_supervisor(&self, supervisor: WeakActorRef) -> ActorResult<()> {
    let mut state = mutex_lock_with_log!(self.inner.state, "install_supervisor");
    if state.supervisor.as_ref().and_then(|weak| weak.upgrade()).is_some() {
      return Err(ActorError::AlreadySupervised { child: self.id() });
    }
    state.supervisor = Some(supervisor);
    Ok(())
  }

  pub(crate) fn clear_supervisor(&self) {
    let mut state = mutex_lock_with_log!(self.inner.state, "clear_supervisor");
    state.supervisor = None;
  }

  // --- hotswap ------------------------------------------------------------

  pub fn become_receive(&self, behavior: HotswapBehavior) {
    let mut state = mutex_lock_with_log!(self.inner.state, "become_receive");
    state.hotswap.push(behavior);
  }

  /// No-op when only the base behavior remains.
  pub fn unbecome(&self) {
    let mut state = mutex_lock_with_log!(self.inner.state, "unbecome");
    state.hotswap.pop();
  }

  // --- invocation ---------------------------------------------------------

  pub(crate) fn invoke(&self, envelope: Envelope) {
    if self.status() == ActorStatus::Shutdown {
      log::debug!("dropping {:?}: {} is shut down", envelope, self.id());
      envelope.fault_reply(ActorError::ActorStopped);
      return;
    }
    self.cancel_receive_timeout();
    {
      let mut state = mutex_lock_with_log!(self.inner.state, "invoke");
      state.current_message = Some(envelope.clone());
    }
    let result = match envelope.message() {
      MessagePayload::System(sys_msg) => self.system_invoke(sys_msg),
      MessagePayload::User(msg) => {
        let ctx = ActorContext::new(self.clone(), envelope.reply_channel().clone());
        let hotswap_top = {
          let state = mutex_lock_with_log!(self.inner.state, "invoke");
          state.hotswap.last().cloned()
        };
        match hotswap_top {
          Some(behavior) => (*behavior)(ctx, msg.clone()),
          None => self.invoke_instance(ctx, msg.clone()),
        }
      }
    };
    match result {
      Ok(()) => {
        {
          let mut state = mutex_lock_with_log!(self.inner.state, "invoke");
          state.current_message = None;
        }
        if envelope.user_message().is_some() && !self.mailbox().has_messages() {
          self.schedule_receive_timeout();
        }
      }
      Err(reason) => self.handle_invoke_failure(&envelope, reason),
    }
  }

  fn invoke_instance(&self, ctx: ActorContext, msg: AnyMessage) -> ActorResult<()> {
    let instance = {
      let mut state = mutex_lock_with_log!(self.inner.state, "invoke_instance");
      state.actor.take()
    };
    match instance {
      None => {
        log::warn!("invoke: actor instance of {} is missing, dropping {:?}", self.id(), msg);
        Ok(())
      }
      Some(mut instance) => {
        let result = instance.receive(ctx, msg);
        self.put_back_instance(instance);
        result
      }
    }
  }

  fn system_invoke(&self, msg: &SystemMessage) -> ActorResult<()> {
    match msg {
      SystemMessage::ChildFailed { child, reason } => {
        self.handle_child_failure(child, reason);
        Ok(())
      }
      SystemMessage::ChildStopped { child } => {
        self.handle_child_stopped(child);
        Ok(())
      }
      SystemMessage::MaxRestartsExceeded { child, .. } => {
        // The escalated child stopped itself; forget it before telling the
        // actor about the escalation.
        {
          let mut state = mutex_lock_with_log!(self.inner.state, "system_invoke");
          if let Some(uuid) = child.uuid() {
            state.linked_children.remove(&uuid.to_string());
          }
        }
        self.deliver_to_instance(msg)
      }
      SystemMessage::ReceiveTimeout => self.deliver_to_instance(msg),
    }
  }

  fn deliver_to_instance(&self, msg: &SystemMessage) -> ActorResult<()> {
    let instance = {
      let mut state = mutex_lock_with_log!(self.inner.state, "deliver_to_instance");
      state.actor.take()
    };
    match instance {
      None => {
        log::warn!("system_invoke: actor instance of {} is missing", self.id());
        Ok(())
      }
      Some(mut instance) => {
        let ctx = ActorContext::new(self.clone(), ReplyChannel::None);
        let result = instance.system_receive(ctx, msg);
        self.put_back_instance(instance);
        result
      }
    }
  }

  fn put_back_instance(&self, instance: Box<dyn Actor>) {
    let mut state = mutex_lock_with_log!(self.inner.state, "put_back_instance");
    if self.status() != ActorStatus::Shutdown && state.actor.is_none() {
      state.actor = Some(instance);
    }
  }

  /// Suspends the mailbox, faults the asker, then leaves the decision to
  /// the supervisor (or, without one, to the lifecycle policy).
  fn handle_invoke_failure(&self, envelope: &Envelope, reason: ActorError) {
    log::error!("{} failed while processing {:?}: {}", self.id(), envelope, reason);
    let dispatcher = self.dispatcher();
    dispatcher.suspend(self);
    envelope.fault_reply(reason.clone());
    match self.supervisor_ref() {
      Some(supervisor) => {
        let notification = SystemMessage::of_child_failed(ActorRef::of_local(self.clone()), reason);
        if let Err(err) = supervisor.tell_system(notification) {
          log::warn!("failed to notify the supervisor of {}: {}", self.id(), err);
        }
      }
      None => {
        let life_cycle = {
          let state = mutex_lock_with_log!(self.inner.state, "handle_invoke_failure");
          state.life_cycle
        };
        if life_cycle.is_temporary() {
          self.stop();
        } else {
          {
            let mut state = mutex_lock_with_log!(self.inner.state, "handle_invoke_failure");
            state.current_message = None;
          }
          dispatcher.resume(self);
        }
      }
    }
  }

  // --- supervision engine -------------------------------------------------

  fn handle_child_failure(&self, child: &ActorRef, reason: &ActorError) {
    let strategy = {
      let state = mutex_lock_with_log!(self.inner.state, "handle_child_failure");
      state.fault_handler.clone()
    };
    match &strategy {
      FaultHandlingStrategy::NoStrategy => {
        log::info!(
          "{} traps no faults, stopping the failed child {}",
          self.id(),
          child.id()
        );
        child.stop();
      }
      FaultHandlingStrategy::OneForOne {
        max_retries,
        within_time_range,
        ..
      } => {
        if strategy.traps(reason) {
          if let Some(child_local) = child.as_local() {
            child_local.request_restart(reason, *max_retries, *within_time_range);
          }
        } else {
          child.stop();
        }
      }
      FaultHandlingStrategy::AllForOne {
        max_retries,
        within_time_range,
        ..
      } => {
        if strategy.traps(reason) {
          for linked in self.linked_children_snapshot() {
            linked.request_restart(reason, *max_retries, *within_time_range);
          }
        } else {
          child.stop();
        }
      }
    }
  }

  fn handle_child_stopped(&self, child: &ActorRef) {
    let strategy = {
      let mut state = mutex_lock_with_log!(self.inner.state, "handle_child_stopped");
      if let Some(uuid) = child.uuid() {
        state.linked_children.remove(&uuid.to_string());
      }
      state.fault_handler.clone()
    };
    // A clean stop of one group member takes the whole group down under
    // AllForOne; OneForOne only forgets the child.
    if matches!(strategy, FaultHandlingStrategy::AllForOne { .. }) {
      let remaining: Vec<LocalActorRef> = {
        let mut state = mutex_lock_with_log!(self.inner.state, "handle_child_stopped");
        state.linked_children.drain().map(|(_, linked)| linked).collect()
      };
      for linked in remaining {
        linked.clear_supervisor();
        linked.stop();
      }
    }
  }

  // --- restart protocol ---------------------------------------------------

  pub(crate) fn request_restart(
    &self,
    reason: &ActorError,
    max_retries: Option<u32>,
    within_time_range: Option<Duration>,
  ) {
    match self.status() {
      ActorStatus::Shutdown | ActorStatus::Unstarted => return,
      _ => {}
    }
    let allowed = {
      let mut state = mutex_lock_with_log!(self.inner.state, "request_restart");
      state.restart_stats.request_restart_permission(max_retries, within_time_range)
    };
    if !allowed {
      log::warn!(
        "{} exceeded its restart budget (max_retries = {:?}, within = {:?})",
        self.id(),
        max_retries,
        within_time_range
      );
      if let Some(supervisor) = self.supervisor_ref() {
        let notification = SystemMessage::of_max_restarts_exceeded(
          ActorRef::of_local(self.clone()),
          max_retries,
          within_time_range,
          reason.clone(),
        );
        if let Err(err) = supervisor.tell_system(notification) {
          log::warn!("failed to notify the supervisor of {}: {}", self.id(), err);
        }
      }
      self.stop_internal(false);
      return;
    }
    self.set_status(ActorStatus::BeingRestarted);
    let life_cycle = {
      let state = mutex_lock_with_log!(self.inner.state, "request_restart");
      state.life_cycle
    };
    if life_cycle.is_temporary() {
      self.stop();
    } else {
      self.perform_restart(reason);
      self.dispatcher().resume(self);
      for linked in self.linked_children_snapshot() {
        linked.request_restart(reason, max_retries, within_time_range);
      }
    }
  }

  fn perform_restart(&self, reason: &ActorError) {
    if let Err(err) = self.try_restart(reason) {
      log::warn!("restart of {} failed, retrying once: {}", self.id(), err);
      if let Err(err) = self.try_restart(reason) {
        log::error!("restart of {} failed twice, stopping: {}", self.id(), err);
        self.stop();
      }
    }
  }

  fn try_restart(&self, reason: &ActorError) -> ActorResult<()> {
    let (props, last_message) = {
      let state = mutex_lock_with_log!(self.inner.state, "try_restart");
      let last_message = state
        .current_message
        .as_ref()
        .and_then(|envelope| envelope.user_message().cloned());
      (state.props.clone(), last_message)
    };
    let failed = {
      let mut state = mutex_lock_with_log!(self.inner.state, "try_restart");
      state.actor.take()
    };
    let ctx = ActorContext::new(self.clone(), ReplyChannel::None);
    let mut fresh: Box<dyn Actor> = match failed {
      Some(mut failed_instance) => {
        failed_instance.pre_restart(ctx.clone(), reason, last_message.as_ref())?;
        match failed_instance.fresh_instance() {
          Some(fresh) => fresh,
          None => props.new_actor().map_err(|err| ActorError::InitializationFailed {
            message: err.to_string(),
          })?,
        }
      }
      None => {
        log::warn!("restarting {} without a failed instance", self.id());
        props.new_actor().map_err(|err| ActorError::InitializationFailed {
          message: err.to_string(),
        })?
      }
    };
    fresh.pre_start(ctx.clone())?;
    fresh.post_restart(ctx, reason)?;
    {
      let mut state = mutex_lock_with_log!(self.inner.state, "try_restart");
      if self.status() != ActorStatus::Shutdown {
        state.actor = Some(fresh);
      }
      state.current_message = None;
    }
    self.compare_and_set_status(ActorStatus::BeingRestarted, ActorStatus::Running);
    Ok(())
  }

  // --- receive timeout ----------------------------------------------------

  fn schedule_receive_timeout(&self) {
    let timeout = {
      let state = mutex_lock_with_log!(self.inner.state, "schedule_receive_timeout");
      state.receive_timeout
    };
    if let Some(timeout) = timeout {
      let weak = self.downgrade();
      let handle = self.dispatcher().schedule_once(timeout, move || {
        if let Some(actor_ref) = weak.upgrade() {
          if actor_ref.status() == ActorStatus::Running && !actor_ref.mailbox().has_messages() {
            let _ = actor_ref.tell_system(SystemMessage::of_receive_timeout());
          }
        }
      });
      let mut state = mutex_lock_with_log!(self.inner.state, "schedule_receive_timeout");
      if let Some(old) = state.receive_timeout_handle.replace(handle) {
        old.abort();
      }
    }
  }

  fn cancel_receive_timeout(&self) {
    let handle = {
      let mut state = mutex_lock_with_log!(self.inner.state, "cancel_receive_timeout");
      state.receive_timeout_handle.take()
    };
    if let Some(handle) = handle {
      handle.abort();
    }
  }
}

impl ActorRefBehavior for LocalActorRef {
  fn uuid(&self) -> ULID {
    LocalActorRef::uuid(self)
  }

  fn id(&self) -> String {
    LocalActorRef::id(self)
  }

  fn status(&self) -> ActorStatus {
    LocalActorRef::status(self)
  }

  fn start(&self) -> ActorResult<()> {
    LocalActorRef::start(self)
  }

  fn stop(&self) {
    LocalActorRef::stop(self)
  }

  fn tell(&self, msg: AnyMessage) -> ActorResult<()> {
    LocalActorRef::tell(self, msg)
  }

  fn tell_with_reply(&self, msg: AnyMessage, reply: ReplyChannel) -> ActorResult<()> {
    LocalActorRef::tell_with_reply(self, msg, reply)
  }

  fn ask(&self, msg: AnyMessage) -> ActorResult<ReplyFuture> {
    LocalActorRef::ask(self, msg)
  }

  fn ask_with_timeout(&self, msg: AnyMessage, timeout: Duration) -> ActorResult<ReplyFuture> {
    LocalActorRef::ask_with_timeout(self, msg, timeout)
  }

  fn link(&self, child: &ActorRef) -> ActorResult<()> {
    LocalActorRef::link(self, child)
  }

  fn unlink(&self, child: &ActorRef) -> ActorResult<()> {
    LocalActorRef::unlink(self, child)
  }

  fn start_link(&self, child: &ActorRef) -> ActorResult<()> {
    LocalActorRef::start_link(self, child)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::actor::props::FunctionProps;
  use crate::actor::FaultKind;
  use std::env;
  use std::sync::atomic::{AtomicBool, AtomicUsize};
  use std::thread;
  use std::time::Instant;

  fn init_logger() {
    env::set_var("RUST_LOG", "debug");
    let _ = env_logger::builder().is_test(true).try_init();
  }

  fn wait_until<F>(timeout: Duration, condition: F) -> bool
  where
    F: Fn() -> bool, {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
      if condition() {
        return true;
      }
      thread::sleep(Duration::from_millis(10));
    }
    condition()
  }

  #[derive(Debug, Clone)]
  struct Boom;

  #[derive(Debug, Default)]
  struct Counters {
    received: AtomicUsize,
    pre_start: AtomicUsize,
    pre_restart: AtomicUsize,
    post_restart: AtomicUsize,
    post_stop: AtomicUsize,
    receive_timeouts: AtomicUsize,
    max_restarts_exceeded: AtomicUsize,
  }

  #[derive(Debug)]
  struct ProbeActor {
    counters: Arc<Counters>,
  }

  impl Actor for ProbeActor {
    fn receive(&mut self, ctx: ActorContext, msg: AnyMessage) -> ActorResult<()> {
      if msg.is::<Boom>() {
        return Err(ActorError::of_actor_failed("boom"));
      }
      self.counters.received.fetch_add(1, Ordering::SeqCst);
      ctx.try_reply(msg);
      Ok(())
    }

    fn system_receive(&mut self, _ctx: ActorContext, msg: &SystemMessage) -> ActorResult<()> {
      match msg {
        SystemMessage::ReceiveTimeout => {
          self.counters.receive_timeouts.fetch_add(1, Ordering::SeqCst);
        }
        SystemMessage::MaxRestartsExceeded { .. } => {
          self.counters.max_restarts_exceeded.fetch_add(1, Ordering::SeqCst);
        }
        _ => {}
      }
      Ok(())
    }

    fn pre_start(&mut self, _ctx: ActorContext) -> ActorResult<()> {
      self.counters.pre_start.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }

    fn pre_restart(
      &mut self,
      _ctx: ActorContext,
      _reason: &ActorError,
      _last_message: Option<&AnyMessage>,
    ) -> ActorResult<()> {
      self.counters.pre_restart.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }

    fn post_restart(&mut self, _ctx: ActorContext, _reason: &ActorError) -> ActorResult<()> {
      self.counters.post_restart.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }

    fn post_stop(&mut self, _ctx: ActorContext) -> ActorResult<()> {
      self.counters.post_stop.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }

  fn probe_props(counters: Arc<Counters>) -> Arc<dyn Props> {
    Arc::new(FunctionProps::new(move || {
      Ok(Box::new(ProbeActor {
        counters: counters.clone(),
      }))
    }))
  }

  #[derive(Debug)]
  struct DoublerActor;

  impl Actor for DoublerActor {
    fn receive(&mut self, ctx: ActorContext, msg: AnyMessage) -> ActorResult<()> {
      let n = msg.take::<i64>().map_err(|err| ActorError::ActorFailed {
        message: err.to_string(),
      })?;
      ctx.try_reply(AnyMessage::new(n * 2));
      Ok(())
    }
  }

  fn doubler_props() -> Arc<dyn Props> {
    Arc::new(FunctionProps::new(|| Ok(Box::new(DoublerActor))))
  }

  #[test]
  fn test_ping_pong_ask() {
    init_logger();
    let actor_ref = LocalActorRef::new("ping-pong", doubler_props());
    actor_ref.start().unwrap();
    let future = actor_ref
      .ask_with_timeout(AnyMessage::new(21_i64), Duration::from_millis(1000))
      .unwrap();
    let reply = future.await_result().unwrap();
    assert_eq!(reply.take::<i64>().unwrap(), 42);
    actor_ref.stop();
  }

  #[test]
  fn test_tell_requires_start() {
    init_logger();
    let actor_ref = LocalActorRef::new("unstarted", doubler_props());
    let err = actor_ref.tell(AnyMessage::new(1_i64)).unwrap_err();
    assert!(matches!(err, ActorError::NotStarted { .. }));
  }

  #[test]
  fn test_one_for_one_restart() {
    init_logger();
    let parent_counters = Arc::new(Counters::default());
    let parent = LocalActorRef::new("ofo-parent", probe_props(parent_counters));
    parent.set_fault_handler(FaultHandlingStrategy::of_one_for_one(
      vec![FaultKind::Any],
      Some(3),
      Some(Duration::from_millis(1000)),
    ));
    parent.start().unwrap();

    let child_counters = Arc::new(Counters::default());
    let child = LocalActorRef::new("ofo-child", probe_props(child_counters.clone()));
    let child_ref = ActorRef::of_local(child.clone());
    parent.start_link(&child_ref).unwrap();
    let uuid_before = child.uuid();

    let sibling_counters = Arc::new(Counters::default());
    let sibling = LocalActorRef::new("ofo-sibling", probe_props(sibling_counters.clone()));
    parent.start_link(&ActorRef::of_local(sibling.clone())).unwrap();

    child.tell(AnyMessage::new(Boom)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      child_counters.post_restart.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(child_counters.pre_restart.load(Ordering::SeqCst), 1);
    // Only the failing child restarts; the sibling is untouched.
    assert_eq!(sibling_counters.pre_restart.load(Ordering::SeqCst), 0);
    assert_eq!(sibling.status(), ActorStatus::Running);

    child.tell(AnyMessage::new(7_i64)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      child_counters.received.load(Ordering::SeqCst) == 1
    }));

    assert_eq!(child.uuid(), uuid_before);
    assert_eq!(child.status(), ActorStatus::Running);
    let supervisor = child.supervisor().unwrap();
    assert_eq!(supervisor.uuid(), Some(parent.uuid()));
    assert!(parent
      .linked_children()
      .iter()
      .any(|linked| linked.uuid() == Some(uuid_before.clone())));
    parent.stop();
  }

  #[test]
  fn test_all_for_one_cascade() {
    init_logger();
    let parent_counters = Arc::new(Counters::default());
    let parent = LocalActorRef::new("afo-parent", probe_props(parent_counters));
    parent.set_fault_handler(FaultHandlingStrategy::of_all_for_one(
      vec![FaultKind::Any],
      Some(5),
      Some(Duration::from_millis(1000)),
    ));
    parent.start().unwrap();

    let mut children = Vec::new();
    for n in 1..=3 {
      let counters = Arc::new(Counters::default());
      let child = LocalActorRef::new(&format!("afo-child-{}", n), probe_props(counters.clone()));
      parent.start_link(&ActorRef::of_local(child.clone())).unwrap();
      children.push((child, counters));
    }

    children[1].0.tell(AnyMessage::new(Boom)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      children
        .iter()
        .all(|(_, counters)| counters.post_restart.load(Ordering::SeqCst) == 1)
    }));
    // Settle, then check nobody was restarted twice.
    thread::sleep(Duration::from_millis(200));
    for (child, counters) in &children {
      assert_eq!(counters.post_restart.load(Ordering::SeqCst), 1);
      assert_eq!(counters.pre_restart.load(Ordering::SeqCst), 1);
      assert_eq!(child.status(), ActorStatus::Running);
    }
    assert_eq!(children[0].1.received.load(Ordering::SeqCst), 0);
    assert_eq!(children[2].1.received.load(Ordering::SeqCst), 0);
    parent.stop();
  }

  #[test]
  fn test_restart_budget_exceeded() {
    init_logger();
    let parent_counters = Arc::new(Counters::default());
    let parent = LocalActorRef::new("budget-parent", probe_props(parent_counters.clone()));
    parent.set_fault_handler(FaultHandlingStrategy::of_one_for_one(
      vec![FaultKind::Any],
      Some(2),
      Some(Duration::from_millis(1000)),
    ));
    parent.start().unwrap();

    let child_counters = Arc::new(Counters::default());
    let child = LocalActorRef::new("budget-child", probe_props(child_counters.clone()));
    parent.start_link(&ActorRef::of_local(child.clone())).unwrap();

    child.tell(AnyMessage::new(Boom)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      child_counters.post_restart.load(Ordering::SeqCst) >= 1
    }));
    child.tell(AnyMessage::new(Boom)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      child_counters.post_restart.load(Ordering::SeqCst) >= 2
    }));
    child.tell(AnyMessage::new(Boom)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      child.status() == ActorStatus::Shutdown
    }));
    assert!(wait_until(Duration::from_secs(3), || {
      parent_counters.max_restarts_exceeded.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(child_counters.post_restart.load(Ordering::SeqCst), 2);
    parent.stop();
  }

  #[test]
  fn test_temporary_child_stops_on_failure() {
    init_logger();
    let parent_counters = Arc::new(Counters::default());
    let parent = LocalActorRef::new("temp-parent", probe_props(parent_counters));
    parent.set_fault_handler(FaultHandlingStrategy::of_one_for_one(
      vec![FaultKind::Any],
      Some(3),
      None,
    ));
    parent.start().unwrap();

    let child_counters = Arc::new(Counters::default());
    let child = LocalActorRef::new("temp-child", probe_props(child_counters.clone()));
    child.set_life_cycle(LifeCycle::Temporary);
    parent.start_link(&ActorRef::of_local(child.clone())).unwrap();

    child.tell(AnyMessage::new(Boom)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      child.status() == ActorStatus::Shutdown
    }));
    assert!(wait_until(Duration::from_secs(3), || parent.linked_children().is_empty()));
    assert_eq!(child_counters.post_restart.load(Ordering::SeqCst), 0);
    assert_eq!(child_counters.post_stop.load(Ordering::SeqCst), 1);
    parent.stop();
  }

  #[test]
  fn test_no_strategy_stops_failed_child() {
    init_logger();
    let parent_counters = Arc::new(Counters::default());
    let parent = LocalActorRef::new("nostrat-parent", probe_props(parent_counters));
    parent.start().unwrap();

    let child_counters = Arc::new(Counters::default());
    let child = LocalActorRef::new("nostrat-child", probe_props(child_counters.clone()));
    parent.start_link(&ActorRef::of_local(child.clone())).unwrap();

    child.tell(AnyMessage::new(Boom)).unwrap();
    assert!(wait_until(Duration::from_secs(3), || {
      child.status() == ActorStatus::Shutdown
    }));
    assert_eq!(child_counters.post_restart.load(Ordering::SeqCst), 0);
    parent.stop();
  }

  #[test]
  fn test_receive_timeout_fires_once_per_empty_transition() {
    init_logger();
    let counters = Arc::new(Counters::default());
    let actor_ref = LocalActorRef::new("receive-timeout", probe_props(counters.clone()));
    actor_ref.set_receive_timeout(Duration::from_millis(100));
    actor_ref.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
      counters.receive_timeouts.load(Ordering::SeqCst) == 1
    }));
    // The timer must not re-arm off the ReceiveTimeout delivery itself.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(counters.receive_timeouts.load(Ordering::SeqCst), 1);

    // The next user message that empties the mailbox re-arms it.
    actor_ref.tell(AnyMessage::new(1_i64)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
      counters.receive_timeouts.load(Ordering::SeqCst) == 2
    }));
    actor_ref.stop();
  }

  #[derive(Debug)]
  struct OrderActor {
    seen: Arc<Mutex<Vec<i64>>>,
  }

  impl Actor for OrderActor {
    fn receive(&mut self, _ctx: ActorContext, msg: AnyMessage) -> ActorResult<()> {
      let n = msg.take::<i64>().map_err(|err| ActorError::ActorFailed {
        message: err.to_string(),
      })?;
      self.seen.lock().unwrap().push(n);
      Ok(())
    }
  }

  #[test]
  fn test_per_producer_fifo() {
    init_logger();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_cloned = seen.clone();
    let actor_ref = LocalActorRef::new(
      "fifo",
      Arc::new(FunctionProps::new(move || {
        Ok(Box::new(OrderActor {
          seen: seen_cloned.clone(),
        }))
      })),
    );
    actor_ref.start().unwrap();
    for n in 0..200_i64 {
      actor_ref.tell(AnyMessage::new(n)).unwrap();
    }
    assert!(wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 200));
    let seen = seen.lock().unwrap();
    assert_eq!(*seen, (0..200).collect::<Vec<i64>>());
    actor_ref.stop();
  }

  #[derive(Debug)]
  struct GuardActor {
    inside: Arc<AtomicBool>,
    violations: Arc<AtomicUsize>,
    handled: Arc<AtomicUsize>,
  }

  impl Actor for GuardActor {
    fn receive(&mut self, _ctx: ActorContext, _msg: AnyMessage) -> ActorResult<()> {
      if self.inside.swap(true, Ordering::SeqCst) {
        self.violations.fetch_add(1, Ordering::SeqCst);
      }
      thread::sleep(Duration::from_millis(1));
      self.inside.store(false, Ordering::SeqCst);
      self.handled.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }

  #[test]
  fn test_single_threaded_invocation() {
    init_logger();
    let inside = Arc::new(AtomicBool::new(false));
    let violations = Arc::new(AtomicUsize::new(0));
    let handled = Arc::new(AtomicUsize::new(0));
    let (inside_c, violations_c, handled_c) = (inside.clone(), violations.clone(), handled.clone());
    let actor_ref = LocalActorRef::new(
      "guard",
      Arc::new(FunctionProps::new(move || {
        Ok(Box::new(GuardActor {
          inside: inside_c.clone(),
          violations: violations_c.clone(),
          handled: handled_c.clone(),
        }))
      })),
    );
    actor_ref.start().unwrap();
    let mut producers = Vec::new();
    for _ in 0..4 {
      let actor_ref = actor_ref.clone();
      producers.push(thread::spawn(move || {
        for n in 0..50_i64 {
          actor_ref.tell(AnyMessage::new(n)).unwrap();
        }
      }));
    }
    for producer in producers {
      producer.join().unwrap();
    }
    assert!(wait_until(Duration::from_secs(10), || {
      handled.load(Ordering::SeqCst) == 200
    }));
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    actor_ref.stop();
  }

  #[test]
  fn test_link_unlink_bookkeeping() {
    init_logger();
    let parent = LocalActorRef::new("link-parent", probe_props(Arc::new(Counters::default())));
    let other = LocalActorRef::new("link-other", probe_props(Arc::new(Counters::default())));
    let child = LocalActorRef::new("link-child", probe_props(Arc::new(Counters::default())));
    let child_ref = ActorRef::of_local(child.clone());

    parent.link(&child_ref).unwrap();
    assert_eq!(child.supervisor().unwrap().uuid(), Some(parent.uuid()));
    assert!(parent
      .linked_children()
      .iter()
      .any(|linked| linked.uuid() == Some(child.uuid())));

    let err = other.link(&child_ref).unwrap_err();
    assert!(matches!(err, ActorError::AlreadySupervised { .. }));

    parent.unlink(&child_ref).unwrap();
    assert!(child.supervisor().is_none());
    assert!(parent.linked_children().is_empty());

    let err = parent.unlink(&child_ref).unwrap_err();
    assert!(matches!(err, ActorError::NotLinked { .. }));
  }

  #[test]
  fn test_stop_is_idempotent_and_terminal() {
    init_logger();
    let actor_ref = LocalActorRef::new("stop-twice", doubler_props());
    actor_ref.start().unwrap();
    actor_ref.stop();
    assert_eq!(actor_ref.status(), ActorStatus::Shutdown);
    actor_ref.stop();
    assert_eq!(actor_ref.status(), ActorStatus::Shutdown);
    let err = actor_ref.start().unwrap_err();
    assert!(matches!(err, ActorError::AlreadyShutdown { .. }));
    // Sends to a shut down reference are dropped, not failed.
    actor_ref.tell(AnyMessage::new(1_i64)).unwrap();
    let err = actor_ref.ask(AnyMessage::new(1_i64)).unwrap_err();
    assert_eq!(err, ActorError::ActorStopped);
  }

  #[derive(Debug)]
  struct SilentActor;

  impl Actor for SilentActor {
    fn receive(&mut self, _ctx: ActorContext, _msg: AnyMessage) -> ActorResult<()> {
      Ok(())
    }
  }

  #[test]
  fn test_ask_timeout() {
    init_logger();
    let actor_ref = LocalActorRef::new(
      "silent",
      Arc::new(FunctionProps::new(|| Ok(Box::new(SilentActor)))),
    );
    actor_ref.start().unwrap();
    let timeout = Duration::from_millis(100);
    let future = actor_ref.ask_with_timeout(AnyMessage::new(1_i64), timeout).unwrap();
    let started = Instant::now();
    assert_eq!(future.await_result().unwrap_err(), ActorError::TimedOut { timeout });
    assert!(started.elapsed() >= timeout);
    assert!(started.elapsed() < Duration::from_millis(1000));
    actor_ref.stop();
  }

  #[test]
  fn test_ask_faulted_by_behavior_failure() {
    init_logger();
    let counters = Arc::new(Counters::default());
    let actor_ref = LocalActorRef::new("faulty-ask", probe_props(counters));
    actor_ref.start().unwrap();
    let future = actor_ref
      .ask_with_timeout(AnyMessage::new(Boom), Duration::from_millis(1000))
      .unwrap();
    let err = future.await_result().unwrap_err();
    assert_eq!(err, ActorError::of_actor_failed("boom"));
    // Unsupervised and permanent: the actor keeps going.
    let future = actor_ref
      .ask_with_timeout(AnyMessage::new(5_i64), Duration::from_millis(1000))
      .unwrap();
    assert_eq!(future.await_result().unwrap().take::<i64>().unwrap(), 5);
    actor_ref.stop();
  }

  #[derive(Debug)]
  struct BlockerActor {
    entered: Arc<AtomicBool>,
  }

  impl Actor for BlockerActor {
    fn receive(&mut self, _ctx: ActorContext, _msg: AnyMessage) -> ActorResult<()> {
      self.entered.store(true, Ordering::SeqCst);
      thread::sleep(Duration::from_millis(300));
      Ok(())
    }
  }

  #[test]
  fn test_bounded_mailbox_push_timeout() {
    init_logger();
    let entered = Arc::new(AtomicBool::new(false));
    let entered_cloned = entered.clone();
    let actor_ref = LocalActorRef::new_with_mailbox_type(
      "bounded",
      Arc::new(FunctionProps::new(move || {
        Ok(Box::new(BlockerActor {
          entered: entered_cloned.clone(),
        }))
      })),
      MailboxType::of_bounded(1, Duration::from_millis(50)),
    );
    actor_ref.start().unwrap();
    actor_ref.tell(AnyMessage::new(1_i64)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || entered.load(Ordering::SeqCst)));
    actor_ref.tell(AnyMessage::new(2_i64)).unwrap();
    let err = actor_ref.tell(AnyMessage::new(3_i64)).unwrap_err();
    assert!(matches!(err, ActorError::MailboxAppendFailed { .. }));
    actor_ref.stop();
  }

  #[derive(Debug, Clone)]
  struct BecomeSwapped;

  #[derive(Debug, Clone)]
  struct UnbecomeNow;

  #[derive(Debug)]
  struct ModeActor;

  impl Actor for ModeActor {
    fn receive(&mut self, ctx: ActorContext, msg: AnyMessage) -> ActorResult<()> {
      if msg.is::<BecomeSwapped>() {
        ctx.become_receive(|ctx, msg| {
          if msg.is::<UnbecomeNow>() {
            ctx.unbecome();
          } else {
            ctx.try_reply(AnyMessage::new("swapped".to_string()));
          }
          Ok(())
        });
      } else {
        ctx.try_reply(AnyMessage::new("base".to_string()));
      }
      Ok(())
    }
  }

  #[test]
  fn test_hotswap_become_unbecome() {
    init_logger();
    let actor_ref = LocalActorRef::new("modes", Arc::new(FunctionProps::new(|| Ok(Box::new(ModeActor)))));
    actor_ref.start().unwrap();
    let ask = |msg: &str| {
      actor_ref
        .ask_with_timeout(AnyMessage::new(msg.to_string()), Duration::from_millis(1000))
        .unwrap()
        .await_result()
        .unwrap()
        .take::<String>()
        .unwrap()
    };
    assert_eq!(ask("hello"), "base");
    actor_ref.tell(AnyMessage::new(BecomeSwapped)).unwrap();
    assert_eq!(ask("hello"), "swapped");
    actor_ref.tell(AnyMessage::new(UnbecomeNow)).unwrap();
    assert_eq!(ask("hello"), "base");
    actor_ref.stop();
  }

  #[derive(Debug)]
  struct ForwardActor {
    target: ActorRef,
  }

  impl Actor for ForwardActor {
    fn receive(&mut self, ctx: ActorContext, msg: AnyMessage) -> ActorResult<()> {
      ctx.forward(&self.target, msg)
    }
  }

  #[test]
  fn test_forward_keeps_the_reply_channel() {
    init_logger();
    let target = LocalActorRef::new("forward-target", doubler_props());
    target.start().unwrap();
    let target_ref = ActorRef::of_local(target.clone());
    let forwarder = LocalActorRef::new(
      "forwarder",
      Arc::new(FunctionProps::new(move || {
        Ok(Box::new(ForwardActor {
          target: target_ref.clone(),
        }))
      })),
    );
    forwarder.start().unwrap();
    let future = forwarder
      .ask_with_timeout(AnyMessage::new(21_i64), Duration::from_millis(1000))
      .unwrap();
    assert_eq!(future.await_result().unwrap().take::<i64>().unwrap(), 42);
    forwarder.stop();
    target.stop();
  }

  #[test]
  fn test_set_dispatcher_only_before_start() {
    init_logger();
    let actor_ref = LocalActorRef::new("late-dispatcher", doubler_props());
    actor_ref.set_dispatcher(Dispatcher::global()).unwrap();
    actor_ref.start().unwrap();
    assert!(actor_ref.set_dispatcher(Dispatcher::global()).is_err());
    actor_ref.stop();
  }

  #[test]
  fn test_reference_equality_is_uuid_equality() {
    init_logger();
    let a = LocalActorRef::new("eq-a", doubler_props());
    let b = LocalActorRef::new("eq-b", doubler_props());
    assert_eq!(a, a.clone());
    assert_ne!(a, b);
    assert_eq!(ActorRef::of_local(a.clone()), ActorRef::of_local(a.clone()));
  }

  #[test]
  fn test_stop_cascades_to_linked_children() {
    init_logger();
    let parent = LocalActorRef::new("cascade-parent", probe_props(Arc::new(Counters::default())));
    parent.start().unwrap();
    let child_counters = Arc::new(Counters::default());
    let child = LocalActorRef::new("cascade-child", probe_props(child_counters.clone()));
    parent.start_link(&ActorRef::of_local(child.clone())).unwrap();
    parent.stop();
    assert!(wait_until(Duration::from_secs(2), || {
      child.status() == ActorStatus::Shutdown
    }));
    assert_eq!(child_counters.post_stop.load(Ordering::SeqCst), 1);
    assert!(parent.linked_children().is_empty());
  }
}

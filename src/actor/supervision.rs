use std::time::{Duration, Instant};

use crate::actor::{ActorError, FaultKind};

/// What happens to an actor after one of its own failures.
/// `Undefined` behaves as `Permanent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeCycle {
  Permanent,
  Temporary,
  Undefined,
}

impl LifeCycle {
  pub fn is_temporary(&self) -> bool {
    matches!(self, LifeCycle::Temporary)
  }
}

/// How a supervisor reacts to a `ChildFailed` notification.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultHandlingStrategy {
  AllForOne {
    trapped: Vec<FaultKind>,
    max_retries: Option<u32>,
    within_time_range: Option<Duration>,
  },
  OneForOne {
    trapped: Vec<FaultKind>,
    max_retries: Option<u32>,
    within_time_range: Option<Duration>,
  },
  NoStrategy,
}

impl FaultHandlingStrategy {
  pub fn of_all_for_one(trapped: Vec<FaultKind>, max_retries: Option<u32>, within_time_range: Option<Duration>) -> Self {
    FaultHandlingStrategy::AllForOne {
      trapped,
      max_retries,
      within_time_range,
    }
  }

  pub fn of_one_for_one(trapped: Vec<FaultKind>, max_retries: Option<u32>, within_time_range: Option<Duration>) -> Self {
    FaultHandlingStrategy::OneForOne {
      trapped,
      max_retries,
      within_time_range,
    }
  }

  pub fn traps(&self, reason: &ActorError) -> bool {
    match self {
      FaultHandlingStrategy::AllForOne { trapped, .. } | FaultHandlingStrategy::OneForOne { trapped, .. } => trapped
        .iter()
        .any(|kind| *kind == FaultKind::Any || *kind == reason.kind()),
      FaultHandlingStrategy::NoStrategy => false,
    }
  }
}

/// Restart budget accounting for one reference.
///
/// The counter increments per restart request; with a window configured, an
/// expired window resets the count before charging the new incident.
#[derive(Debug, Clone, Default)]
pub struct RestartStats {
  restart_count: u32,
  window_start: Option<Instant>,
}

impl RestartStats {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn restart_count(&self) -> u32 {
    self.restart_count
  }

  /// Charges one restart against the budget and reports whether the
  /// restart may proceed. With neither a retry cap nor a window the actor
  /// is immortal.
  pub fn request_restart_permission(&mut self, max_retries: Option<u32>, within_time_range: Option<Duration>) -> bool {
    let denied = match (max_retries, within_time_range) {
      (None, None) => false,
      (Some(max), None) => {
        self.restart_count += 1;
        self.restart_count > max
      }
      (max, Some(window)) => {
        let now = Instant::now();
        match self.window_start {
          Some(start) if now.duration_since(start) <= window => {
            self.restart_count += 1;
          }
          _ => {
            self.restart_count = 1;
            self.window_start = Some(now);
          }
        }
        match max {
          Some(max) => self.restart_count > max,
          None => false,
        }
      }
    };
    !denied
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;

  #[test]
  fn test_immortal_without_budget() {
    let mut stats = RestartStats::new();
    for _ in 0..100 {
      assert!(stats.request_restart_permission(None, None));
    }
  }

  #[test]
  fn test_max_retries_without_window() {
    let mut stats = RestartStats::new();
    assert!(stats.request_restart_permission(Some(2), None));
    assert!(stats.request_restart_permission(Some(2), None));
    assert!(!stats.request_restart_permission(Some(2), None));
  }

  #[test]
  fn test_window_resets_the_count() {
    let window = Duration::from_millis(50);
    let mut stats = RestartStats::new();
    assert!(stats.request_restart_permission(Some(1), Some(window)));
    assert!(!stats.request_restart_permission(Some(1), Some(window)));
    thread::sleep(window + Duration::from_millis(20));
    assert!(stats.request_restart_permission(Some(1), Some(window)));
    assert_eq!(stats.restart_count(), 1);
  }

  #[test]
  fn test_window_without_max_never_denies() {
    let window = Duration::from_millis(50);
    let mut stats = RestartStats::new();
    for _ in 0..10 {
      assert!(stats.request_restart_permission(None, Some(window)));
    }
  }

  #[test]
  fn test_traps_any() {
    let strategy = FaultHandlingStrategy::of_one_for_one(vec![crate::actor::FaultKind::Any], Some(3), None);
    assert!(strategy.traps(&ActorError::of_actor_failed("boom")));
    assert!(strategy.traps(&ActorError::ActorStopped));
  }

  #[test]
  fn test_traps_specific_kind() {
    let strategy =
      FaultHandlingStrategy::of_one_for_one(vec![crate::actor::FaultKind::InitializationFailed], Some(3), None);
    assert!(strategy.traps(&ActorError::InitializationFailed {
      message: "boom".to_string()
    }));
    assert!(!strategy.traps(&ActorError::of_actor_failed("boom")));
  }

  #[test]
  fn test_no_strategy_traps_nothing() {
    assert!(!FaultHandlingStrategy::NoStrategy.traps(&ActorError::of_actor_failed("boom")));
  }
}

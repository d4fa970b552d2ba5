use std::fmt::Debug;

use std::sync::{Mutex, MutexGuard};

/// A mutex that can report who is waiting on it and from where.
///
/// Lock diagnostics are compiled in but off by default; flipping
/// `log_output` during a deadlock hunt prints the acquisition site of every
/// contended lock.
#[derive(Debug)]
pub struct LoggingMutex<T: Debug> {
  pub(crate) inner: Mutex<T>,
  name: String,
  log_output: bool,
}

impl<T: Debug> LoggingMutex<T> {
  pub fn new(name: &str, data: T) -> Self {
    LoggingMutex {
      inner: Mutex::new(data),
      name: name.to_string(),
      log_output: false,
    }
  }

  pub fn lock_with_info(
    &self,
    function_name: &'static str,
    module_path: &'static str,
    file: &'static str,
    line: u32,
  ) -> std::sync::LockResult<MutexGuard<T>> {
    if self.log_output {
      log::debug!(
        "Attempting to lock: {} by {}:{} at {}:{}",
        self.name,
        function_name,
        module_path,
        file,
        line,
      );
    }
    let guard = self.inner.lock()?;
    if self.log_output {
      log::debug!(
        "Lock acquired: {} by {}:{} at {}:{}",
        self.name,
        function_name,
        module_path,
        file,
        line,
      );
    }
    Ok(guard)
  }
}

#[macro_export]
macro_rules! mutex_lock_with_log {
  ($mutex:expr, $fname:expr) => {
    $mutex.lock_with_info($fname, module_path!(), file!(), line!()).unwrap()
  };
}

use std::time::Duration;

use config::{Config, Environment, File};
use once_cell::sync::Lazy;

const DEFAULT_THROUGHPUT: i64 = 5;
const DEFAULT_WORKER_THREADS: i64 = 4;
const DEFAULT_ASK_TIMEOUT_MS: i64 = 5000;

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::load);

/// Runtime tuning knobs, merged from `arbiter.toml` (optional) and
/// `ARBITER_*` environment variables on top of code defaults.
#[derive(Debug, Clone)]
pub struct Settings {
  pub throughput: usize,
  pub worker_threads: usize,
  pub default_ask_timeout: Duration,
}

impl Settings {
  pub fn global() -> &'static Settings {
    &SETTINGS
  }

  pub fn load() -> Self {
    let mut config = Config::new();
    let _ = config.set_default("dispatcher.throughput", DEFAULT_THROUGHPUT);
    let _ = config.set_default("dispatcher.worker-threads", DEFAULT_WORKER_THREADS);
    let _ = config.set_default("actor.ask-timeout-ms", DEFAULT_ASK_TIMEOUT_MS);
    if let Err(err) = config.merge(File::with_name("arbiter").required(false)) {
      log::warn!("failed to read arbiter config file: {}", err);
    }
    if let Err(err) = config.merge(Environment::with_prefix("ARBITER").separator("_")) {
      log::warn!("failed to read ARBITER environment: {}", err);
    }
    let throughput = config.get_int("dispatcher.throughput").unwrap_or(DEFAULT_THROUGHPUT);
    let worker_threads = config
      .get_int("dispatcher.worker-threads")
      .unwrap_or(DEFAULT_WORKER_THREADS);
    let ask_timeout_ms = config.get_int("actor.ask-timeout-ms").unwrap_or(DEFAULT_ASK_TIMEOUT_MS);
    Self {
      throughput: throughput.max(1) as usize,
      worker_threads: worker_threads.max(1) as usize,
      default_ask_timeout: Duration::from_millis(ask_timeout_ms.max(1) as u64),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let settings = Settings::load();
    assert!(settings.throughput >= 1);
    assert!(settings.worker_threads >= 1);
    assert!(settings.default_ask_timeout >= Duration::from_millis(1));
  }
}

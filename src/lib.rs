pub mod actor;
pub mod dispatch;
pub mod infrastructure;
pub mod settings;

#[cfg(test)]
extern crate env_logger as logger;

pub mod logging_mutex;

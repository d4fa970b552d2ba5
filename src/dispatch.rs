pub mod any_message;
pub mod dispatcher;
pub mod envelope;
pub mod future;
pub mod mailbox;
pub mod message_queue;
pub mod system_message;
